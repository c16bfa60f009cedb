use axum::response::IntoResponse;

// axum handler for /
pub async fn root() -> impl IntoResponse {
    "Share Meal is testing!"
}
