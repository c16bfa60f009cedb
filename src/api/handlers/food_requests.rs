use super::{json_body, query_params, require_principal, EmailQuery, Verifier};
use crate::{
    error::{Error, ErrorBody},
    lifecycle::Coordinator,
    model::{FoodRequest, NewFoodRequest, StatusUpdate},
};
use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequesterQuery {
    /// Requester email; must be the caller's.
    #[serde(rename = "userEmail")]
    pub user_email: Option<String>,
}

#[utoipa::path(
    post,
    path = "/food-requests",
    request_body = NewFoodRequest,
    responses(
        (status = 201, description = "Request opened; the listing is now requested.", body = FoodRequest),
        (status = 400, description = "Invalid payload or own listing.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Requester email is not the caller's.", body = ErrorBody),
        (status = 404, description = "No such listing.", body = ErrorBody),
        (status = 409, description = "Listing is not available.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "food-requests"
)]
/// Claims an available listing for the caller.
pub async fn create_request(
    headers: HeaderMap,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
    payload: Option<Json<NewFoodRequest>>,
) -> Result<(StatusCode, Json<FoodRequest>), Error> {
    let principal = require_principal(&headers, &verifier).await?;
    let payload = json_body(payload)?;
    let request = coordinator.create_request(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/food-requests",
    params(RequesterQuery),
    responses(
        (status = 200, description = "Requests made by the caller.", body = [FoodRequest]),
        (status = 400, description = "Missing userEmail.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "userEmail is not the caller's.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "food-requests"
)]
pub async fn requests_by_requester(
    headers: HeaderMap,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
    query: Result<Query<RequesterQuery>, QueryRejection>,
) -> Result<Json<Vec<FoodRequest>>, Error> {
    let principal = require_principal(&headers, &verifier).await?;
    let query = query_params(query)?;
    let requests = coordinator
        .requests_by_requester(&principal, query.user_email.as_deref())
        .await?;
    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/food-requests-by-donator",
    params(EmailQuery),
    responses(
        (status = 200, description = "Requests against the caller's listings.", body = [FoodRequest]),
        (status = 400, description = "Missing email.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Email is not the caller's.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "food-requests"
)]
pub async fn requests_by_donator(
    headers: HeaderMap,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<Vec<FoodRequest>>, Error> {
    let principal = require_principal(&headers, &verifier).await?;
    let query = query_params(query)?;
    let requests = coordinator
        .requests_by_donator(&principal, query.email.as_deref())
        .await?;
    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/food-requests/{id}",
    params(("id" = String, Path, description = "Food request id")),
    responses(
        (status = 200, description = "The request.", body = FoodRequest),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Caller is neither requester nor donator.", body = ErrorBody),
        (status = 404, description = "No such request.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "food-requests"
)]
pub async fn get_request(
    headers: HeaderMap,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
    Path(id): Path<String>,
) -> Result<Json<FoodRequest>, Error> {
    let principal = require_principal(&headers, &verifier).await?;
    Ok(Json(coordinator.get_request(&principal, &id).await?))
}

#[utoipa::path(
    patch,
    path = "/food-requests/{id}/status",
    request_body = StatusUpdate,
    params(("id" = String, Path, description = "Food request id")),
    responses(
        (status = 200, description = "Request closed; the listing follows.", body = FoodRequest),
        (status = 400, description = "Status must be delivered or cancelled.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Caller is not the donator.", body = ErrorBody),
        (status = 404, description = "No such request.", body = ErrorBody),
        (status = 409, description = "Request is no longer pending.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "food-requests"
)]
/// Donator marks a pending request delivered (listing delivered) or cancelled
/// (listing available again).
pub async fn update_request_status(
    headers: HeaderMap,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
    Path(id): Path<String>,
    payload: Option<Json<StatusUpdate>>,
) -> Result<Json<FoodRequest>, Error> {
    let principal = require_principal(&headers, &verifier).await?;
    let update = json_body(payload)?;
    Ok(Json(
        coordinator
            .update_request_status(&principal, &id, update)
            .await?,
    ))
}
