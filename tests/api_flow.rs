mod common;

use axum::http::{Method, StatusCode};
use common::{app, create_food, send, TestResult};
use serde_json::json;

const DONOR: &str = "a@x.com";
const REQUESTER: &str = "b@x.com";
const OTHER: &str = "c@x.com";

async fn open_request(
    app: &axum::Router,
    food_id: &str,
    email: &str,
) -> TestResult<(StatusCode, serde_json::Value)> {
    send(
        app,
        Method::POST,
        "/food-requests",
        Some(email),
        Some(json!({
            "foodId": food_id,
            "requesterEmail": email,
            "notes": "pick up after 6pm",
        })),
    )
    .await
}

async fn food_status(app: &axum::Router, food_id: &str) -> TestResult<String> {
    let (status, body) = send(app, Method::GET, &format!("/foods/{food_id}"), None, None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    Ok(body["foodStatus"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn listing_owner_lifecycle() -> TestResult {
    let app = app()?;
    let id = create_food(&app, DONOR, "Rice").await?;

    let (status, body) = send(&app, Method::GET, &format!("/foods/{id}"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["foodName"], "Rice");
    assert_eq!(body["foodStatus"], "available");
    assert_eq!(body["donator"]["email"], DONOR);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/foods/{id}"),
        Some(OTHER),
        Some(json!({ "foodName": "Stolen" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "forbidden access");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/foods/{id}"),
        Some(DONOR),
        Some(json!({ "foodQuantity": 5, "foodStatus": "delivered" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["foodQuantity"], 5);
    assert_eq!(body["foodStatus"], "delivered");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/foods/{id}"),
        Some(DONOR),
        Some(json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::DELETE, &format!("/foods/{id}"), Some(DONOR), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": true }));

    let (status, body) = send(&app, Method::GET, &format!("/foods/{id}"), None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "food not found" }));
    Ok(())
}

#[tokio::test]
async fn create_food_requires_matching_donator() -> TestResult {
    let app = app()?;
    let payload = json!({
        "donator": { "email": DONOR },
        "foodName": "Bread",
        "foodQuantity": 1,
        "pickupLocation": "Chittagong",
        "expireDate": "2026-11-01",
    });

    let (status, _) = send(&app, Method::POST, "/foods", None, Some(payload.clone())).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, "/foods", Some(OTHER), Some(payload)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        "/foods",
        Some(DONOR),
        Some(json!({ "donator": { "email": DONOR }, "foodName": "  " })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "foodName is required");

    let (status, _) = send(
        &app,
        Method::POST,
        "/foods",
        Some(DONOR),
        Some(json!({ "donator": { "email": DONOR }, "foodName": "Bread", "foodQuantity": "lots" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn minimal_listing_end_to_end() -> TestResult {
    let app = app()?;

    let (status, created) = send(
        &app,
        Method::POST,
        "/foods",
        Some(DONOR),
        Some(json!({
            "foodName": "Rice",
            "donator": { "email": DONOR },
            "foodStatus": "available",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let id = created["id"].as_str().unwrap_or_default().to_string();
    let uri = format!("/foods/{id}");

    let (status, body) = send(&app, Method::GET, &uri, None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["foodName"], "Rice");
    assert_eq!(body["foodStatus"], "available");
    assert!(body.get("foodQuantity").is_none());

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(OTHER),
        Some(json!({ "foodStatus": "delivered" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(DONOR),
        Some(json!({ "foodStatus": "delivered", "foodQuantity": "5", "pickupLocation": "Dhaka" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["foodStatus"], "delivered");
    assert_eq!(body["foodQuantity"], 5);
    assert_eq!(body["pickupLocation"], "Dhaka");

    let (status, _) = send(&app, Method::DELETE, &uri, Some(DONOR), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &uri, None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "food not found" }));
    Ok(())
}

#[tokio::test]
async fn numeric_string_quantity_is_stored_as_number() -> TestResult {
    let app = app()?;
    let (status, created) = send(
        &app,
        Method::POST,
        "/foods",
        Some(DONOR),
        Some(json!({
            "donator": { "email": DONOR },
            "foodName": "Dal",
            "foodQuantity": "5",
            "pickupLocation": "Sylhet",
            "expireDate": "2026-12-01",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{created}");

    let uri = format!("/foods/{}", created["id"].as_str().unwrap_or_default());
    let (_, body) = send(&app, Method::GET, &uri, None, None).await?;
    assert_eq!(body["foodQuantity"], 5);
    Ok(())
}

#[tokio::test]
async fn owner_cannot_mark_listing_requested() -> TestResult {
    let app = app()?;
    let food = create_food(&app, DONOR, "Rice").await?;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/foods/{food}"),
        Some(DONOR),
        Some(json!({ "foodStatus": "requested" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "foodStatus cannot be set to requested");
    assert_eq!(food_status(&app, &food).await?, "available");

    let (status, _) = open_request(&app, &food, REQUESTER).await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn listing_queries() -> TestResult {
    let app = app()?;
    let rice = create_food(&app, DONOR, "Rice").await?;
    create_food(&app, OTHER, "Lentils").await?;
    open_request(&app, &rice, REQUESTER).await?;

    let (_, all) = send(&app, Method::GET, "/foods", None, None).await?;
    assert_eq!(all.as_array().map(Vec::len), Some(2));

    let (_, available) = send(&app, Method::GET, "/foods?status=available", None, None).await?;
    assert_eq!(available.as_array().map(Vec::len), Some(1));
    assert_eq!(available[0]["foodName"], "Lentils");

    let (status, _) = send(&app, Method::GET, "/foods?status=eaten", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, mine) = send(
        &app,
        Method::GET,
        &format!("/foods-by-email?email={DONOR}"),
        Some(DONOR),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().map(Vec::len), Some(1));

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/foods-by-email?email={DONOR}"),
        Some(OTHER),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/foods-by-email", Some(DONOR), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn request_then_deliver() -> TestResult {
    let app = app()?;
    let food = create_food(&app, DONOR, "Rice").await?;

    let (status, request) = open_request(&app, &food, REQUESTER).await?;
    assert_eq!(status, StatusCode::CREATED, "{request}");
    assert_eq!(request["status"], "pending");
    assert_eq!(request["donatorEmail"], DONOR);
    assert_eq!(food_status(&app, &food).await?, "requested");

    let request_id = request["id"].as_str().unwrap_or_default().to_string();

    let (status, listed) = send(
        &app,
        Method::GET,
        &format!("/food-requests?userEmail={REQUESTER}"),
        Some(REQUESTER),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["id"], request_id.as_str());

    let (status, incoming) = send(
        &app,
        Method::GET,
        &format!("/food-requests-by-donator?email={DONOR}"),
        Some(DONOR),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(incoming.as_array().map(Vec::len), Some(1));

    for (email, expected) in [
        (REQUESTER, StatusCode::OK),
        (DONOR, StatusCode::OK),
        (OTHER, StatusCode::FORBIDDEN),
    ] {
        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/food-requests/{request_id}"),
            Some(email),
            None,
        )
        .await?;
        assert_eq!(status, expected, "{email}");
    }

    let uri = format!("/food-requests/{request_id}/status");
    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(REQUESTER),
        Some(json!({ "status": "delivered" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(DONOR),
        Some(json!({ "status": "pending" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(DONOR),
        Some(json!({ "status": "delivered" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "delivered");
    assert_eq!(food_status(&app, &food).await?, "delivered");

    let (status, _) = open_request(&app, &food, OTHER).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn cancel_makes_listing_available_again() -> TestResult {
    let app = app()?;
    let food = create_food(&app, DONOR, "Soup").await?;

    let (status, _) = open_request(&app, &food, DONOR).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, request) = open_request(&app, &food, REQUESTER).await?;
    let uri = format!(
        "/food-requests/{}/status",
        request["id"].as_str().unwrap_or_default()
    );

    let (status, _) = send(&app, Method::DELETE, &format!("/foods/{food}"), Some(DONOR), None)
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(DONOR),
        Some(json!({ "status": "cancelled" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(food_status(&app, &food).await?, "available");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(DONOR),
        Some(json!({ "status": "cancelled" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "food request is already cancelled");

    let (status, _) = open_request(&app, &food, OTHER).await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn concurrent_claims_have_one_winner() -> TestResult {
    let app = app()?;
    let food = create_food(&app, DONOR, "Biryani").await?;

    let (first, second) = tokio::join!(
        open_request(&app, &food, REQUESTER),
        open_request(&app, &food, OTHER),
    );
    let mut statuses = [first?.0.as_u16(), second?.0.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [201, 409]);

    let (_, incoming) = send(
        &app,
        Method::GET,
        &format!("/food-requests-by-donator?email={DONOR}"),
        Some(DONOR),
        None,
    )
    .await?;
    assert_eq!(incoming.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn unknown_ids_are_not_found() -> TestResult {
    let app = app()?;

    let (status, body) = send(
        &app,
        Method::GET,
        "/foods/00000000-0000-0000-0000-000000000000",
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "food not found");

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/food-requests/nope/status",
        Some(DONOR),
        Some(json!({ "status": "delivered" })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "food request not found");

    let (status, _) = open_request(&app, "nope", REQUESTER).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
