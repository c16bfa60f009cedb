//! Route handlers and the shared bearer-token gate.

pub mod food_requests;
pub mod foods;
pub mod health;
pub mod root;
pub mod users;

use crate::{
    error::Error,
    identity::{IdentityVerifier, VerifiedPrincipal},
};
use axum::{
    extract::{rejection::QueryRejection, Query},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Shared verifier handed to handlers as an `Extension`.
pub type Verifier = Arc<dyn IdentityVerifier>;

/// `?email=` query used by the owner-scoped listings.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmailQuery {
    /// Email to scope the listing to; must be the caller's.
    pub email: Option<String>,
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve the caller or fail with `401`.
///
/// The failure reason is only logged at debug level; clients always see the
/// same message.
pub async fn require_principal(
    headers: &HeaderMap,
    verifier: &Verifier,
) -> Result<VerifiedPrincipal, Error> {
    let Some(token) = bearer_token(headers) else {
        debug!("missing or malformed authorization header");
        return Err(Error::Authentication);
    };

    verifier.verify(token).await.map_err(|err| {
        debug!(error = %err, "identity token rejected");
        Error::Authentication
    })
}

/// Unwrap an optional JSON body, turning a missing or malformed one into `400`.
pub fn json_body<T>(payload: Option<Json<T>>) -> Result<T, Error> {
    payload
        .map(|Json(body)| body)
        .ok_or_else(|| Error::Validation("Missing or invalid JSON payload".to_string()))
}

/// Turn a query string that does not parse into `400` with a JSON body.
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Error> {
    query.map(|Query(params)| params).map_err(|rejection| {
        debug!(error = %rejection.body_text(), "query string rejected");
        Error::Validation("Invalid query parameters".to_string())
    })
}

/// Unknown routes answer with the same JSON error shape as everything else.
pub async fn not_found() -> Error {
    Error::NotFound("route")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer  tok ")), Some("tok"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn missing_body_is_validation_error() {
        let body: Option<Json<serde_json::Value>> = None;
        assert!(matches!(json_body(body), Err(Error::Validation(_))));
    }
}
