use super::Verifier;
use crate::{identity::DependencyStatus, lifecycle::Coordinator, GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info_span, Instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
    identity_keyset: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database and identity keyset are healthy", body = Health),
        (status = 503, description = "Database or identity keyset is unhealthy", body = Health)
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(
    method: Method,
    coordinator: Extension<Coordinator>,
    verifier: Extension<Verifier>,
) -> impl IntoResponse {
    let ping_span = info_span!("db.ping", db.operation = "PING");
    let database_ok = match coordinator.ping().instrument(ping_span).await {
        Ok(()) => true,
        Err(error) => {
            error!("Failed to ping database: {}", error);
            false
        }
    };

    let keyset_status = verifier.status().await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "ok" } else { "error" }.to_string(),
        identity_keyset: keyset_status.as_str().to_string(),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = health.commit.get(0..7).unwrap_or_default();

    let mut headers = HeaderMap::new();
    match format!("{}:{}:{}", health.name, health.version, short_hash).parse::<HeaderValue>() {
        Ok(x_app_header_value) => {
            debug!("X-App header: {:?}", x_app_header_value);
            headers.insert("X-App", x_app_header_value);
        }
        Err(err) => error!("Failed to parse X-App header: {}", err),
    }

    match keyset_status {
        DependencyStatus::Ok => debug!("Identity keyset is healthy"),
        DependencyStatus::Error => debug!("Identity keyset is unhealthy"),
        DependencyStatus::Static => debug!("Identity keyset is static"),
    }

    (health_status(database_ok, keyset_status), headers, body)
}

fn health_status(database_ok: bool, keyset: DependencyStatus) -> StatusCode {
    if database_ok && keyset.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
