use super::json_body;
use crate::{
    error::{Error, ErrorBody},
    lifecycle::Coordinator,
    model::{RegisterUser, UserProfile},
};
use axum::{extract::Extension, http::StatusCode, Json};

#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Profile created.", body = UserProfile),
        (status = 200, description = "Profile already existed and was refreshed.", body = UserProfile),
        (status = 400, description = "Invalid payload.", body = ErrorBody),
    ),
    tag = "users"
)]
/// Registers a user profile keyed by email. Repeated registrations refresh the
/// optional fields instead of creating duplicates.
pub async fn register(
    coordinator: Extension<Coordinator>,
    payload: Option<Json<RegisterUser>>,
) -> Result<(StatusCode, Json<UserProfile>), Error> {
    let user = json_body(payload)?;
    let (profile, created) = coordinator.register_user(user).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(profile)))
}
