//! Food listing handlers.
//!
//! Reads are public. Creating, changing and deleting a listing require a
//! bearer token whose email is the listing's donator.

use super::{json_body, query_params, require_principal, EmailQuery, Verifier};
use crate::{
    error::{Error, ErrorBody},
    lifecycle::Coordinator,
    model::{FoodListing, FoodPatch, NewFood},
};
use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FoodsQuery {
    /// Only listings donated by this email.
    pub email: Option<String>,
    /// Only listings in this status (`available`, `requested`, `delivered`).
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedFood {
    #[schema(value_type = String)]
    pub id: uuid::Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Deleted {
    pub deleted: bool,
}

#[utoipa::path(
    get,
    path = "/foods",
    params(FoodsQuery),
    responses(
        (status = 200, description = "Food listings, newest first.", body = [FoodListing]),
        (status = 400, description = "Unknown status filter.", body = ErrorBody),
    ),
    tag = "foods"
)]
pub async fn list_foods(
    coordinator: Extension<Coordinator>,
    query: Result<Query<FoodsQuery>, QueryRejection>,
) -> Result<Json<Vec<FoodListing>>, Error> {
    let query = query_params(query)?;
    let foods = coordinator
        .list_foods(query.email.as_deref(), query.status.as_deref())
        .await?;
    Ok(Json(foods))
}

#[utoipa::path(
    get,
    path = "/foods/{id}",
    params(("id" = String, Path, description = "Food listing id")),
    responses(
        (status = 200, description = "Food listing.", body = FoodListing),
        (status = 404, description = "No such listing.", body = ErrorBody),
    ),
    tag = "foods"
)]
pub async fn get_food(
    coordinator: Extension<Coordinator>,
    Path(id): Path<String>,
) -> Result<Json<FoodListing>, Error> {
    Ok(Json(coordinator.get_food(&id).await?))
}

#[utoipa::path(
    get,
    path = "/foods-by-email",
    params(EmailQuery),
    responses(
        (status = 200, description = "Listings donated by the caller.", body = [FoodListing]),
        (status = 400, description = "Missing email.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Email is not the caller's.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "foods"
)]
pub async fn foods_by_email(
    headers: HeaderMap,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<Vec<FoodListing>>, Error> {
    let principal = require_principal(&headers, &verifier).await?;
    let query = query_params(query)?;
    let foods = coordinator
        .foods_owned_by(&principal, query.email.as_deref())
        .await?;
    Ok(Json(foods))
}

#[utoipa::path(
    post,
    path = "/foods",
    request_body = NewFood,
    responses(
        (status = 201, description = "Listing created.", body = CreatedFood),
        (status = 400, description = "Invalid payload.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Donator email is not the caller's.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "foods"
)]
/// Creates a listing in the `available` state on behalf of the caller.
pub async fn create_food(
    headers: HeaderMap,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
    payload: Option<Json<NewFood>>,
) -> Result<(StatusCode, Json<CreatedFood>), Error> {
    let principal = require_principal(&headers, &verifier).await?;
    let food = json_body(payload)?;
    let id = coordinator.create_food(&principal, food).await?;
    Ok((StatusCode::CREATED, Json(CreatedFood { id })))
}

#[utoipa::path(
    patch,
    path = "/foods/{id}",
    request_body = FoodPatch,
    params(("id" = String, Path, description = "Food listing id")),
    responses(
        (status = 200, description = "Updated listing.", body = FoodListing),
        (status = 400, description = "Invalid or empty patch.", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Caller does not own the listing.", body = ErrorBody),
        (status = 404, description = "No such listing.", body = ErrorBody),
        (status = 409, description = "Status change while a request is pending.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "foods"
)]
/// Merges the supplied fields into the listing. `PUT` is routed here too.
pub async fn update_food(
    headers: HeaderMap,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
    Path(id): Path<String>,
    payload: Option<Json<FoodPatch>>,
) -> Result<Json<FoodListing>, Error> {
    let principal = require_principal(&headers, &verifier).await?;
    let patch = json_body(payload)?;
    Ok(Json(coordinator.update_food(&principal, &id, patch).await?))
}

#[utoipa::path(
    delete,
    path = "/foods/{id}",
    params(("id" = String, Path, description = "Food listing id")),
    responses(
        (status = 200, description = "Listing deleted.", body = Deleted),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorBody),
        (status = 403, description = "Caller does not own the listing.", body = ErrorBody),
        (status = 404, description = "No such listing.", body = ErrorBody),
        (status = 409, description = "A request is still pending.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "foods"
)]
pub async fn delete_food(
    headers: HeaderMap,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, Error> {
    let principal = require_principal(&headers, &verifier).await?;
    coordinator.delete_food(&principal, &id).await?;
    Ok(Json(Deleted { deleted: true }))
}
