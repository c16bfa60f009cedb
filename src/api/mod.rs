use crate::{
    api::handlers::{food_requests, foods, health, not_found, root, users, Verifier},
    lifecycle::Coordinator,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, patch, post},
    Extension, Router,
};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::{openapi, ApiDoc};

const REQUEST_ID: &str = "x-request-id";

/// Build the application router with its middleware stack.
///
/// Store and verifier are handed to handlers as `Extension`s.
pub fn router(coordinator: Coordinator, verifier: Verifier, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health).options(health::health))
        .route("/foods", get(foods::list_foods).post(foods::create_food))
        .route(
            "/foods/:id",
            get(foods::get_food)
                .put(foods::update_food)
                .patch(foods::update_food)
                .delete(foods::delete_food),
        )
        .route("/foods-by-email", get(foods::foods_by_email))
        .route(
            "/food-requests",
            get(food_requests::requests_by_requester).post(food_requests::create_request),
        )
        .route("/food-requests/:id", get(food_requests::get_request))
        .route(
            "/food-requests/:id/status",
            patch(food_requests::update_request_status),
        )
        .route(
            "/food-requests-by-donator",
            get(food_requests::requests_by_donator),
        )
        .route("/users", post(users::register))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(coordinator))
                .layer(Extension(verifier)),
        )
}

/// Start the server and run until SIGINT/SIGTERM.
/// # Errors
/// Return error if the listener cannot be bound or the server fails
pub async fn new(port: u16, app: Router) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gracefully shutdown");

    Ok(())
}

/// CORS for the web client: a single exact origin, or any origin when unset.
///
/// # Errors
/// Returns an error if `origin` is not an absolute URL with a host.
pub fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID)]);

    Ok(match origin {
        Some(origin) => cors.allow_origin(AllowOrigin::exact(frontend_origin(origin)?)),
        None => cors.allow_origin(Any),
    })
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid CORS origin: {frontend_base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {frontend_base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build CORS origin header")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identity::{jwks::Jwks, FirebaseVerifier},
        store::memory::MemoryStore,
    };
    use axum::{body::to_bytes, http::StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Result<Router> {
        let coordinator = Coordinator::new(Arc::new(MemoryStore::new()));
        let verifier: Verifier = Arc::new(FirebaseVerifier::new(Jwks::default(), "share-meal"));
        Ok(router(coordinator, verifier, cors_layer(None)?))
    }

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://sharemeal.dev:8443/app/")?;
        assert_eq!(origin, "https://sharemeal.dev:8443");
        assert!(frontend_origin("not a url").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn root_and_request_id() -> Result<()> {
        let response = app()?
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID));

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(&body[..], b"Share Meal is testing!");
        Ok(())
    }

    #[tokio::test]
    async fn request_id_is_propagated() -> Result<()> {
        let response = app()?
            .oneshot(
                Request::builder()
                    .uri("/foods")
                    .header(REQUEST_ID, "01HZZZZZZZZZZZZZZZZZZZZZZZ")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(
            response.headers().get(REQUEST_ID).map(HeaderValue::as_bytes),
            Some(&b"01HZZZZZZZZZZZZZZZZZZZZZZZ"[..])
        );
        Ok(())
    }

    #[tokio::test]
    async fn health_reports_static_keyset() -> Result<()> {
        let response = app()?
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let health: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(health["database"], "ok");
        assert_eq!(health["identity_keyset"], "static");
        assert_eq!(health["name"], env!("CARGO_PKG_NAME"));
        Ok(())
    }

    #[tokio::test]
    async fn protected_routes_require_bearer() -> Result<()> {
        let app = app()?;
        for (method, uri) in [
            (Method::POST, "/foods"),
            (Method::GET, "/foods-by-email?email=a@x.com"),
            (Method::POST, "/food-requests"),
            (Method::GET, "/food-requests?userEmail=a@x.com"),
            (Method::GET, "/food-requests-by-donator?email=a@x.com"),
            (Method::PUT, "/foods/00000000-0000-0000-0000-000000000000"),
            (Method::PATCH, "/foods/00000000-0000-0000-0000-000000000000"),
            (Method::DELETE, "/foods/00000000-0000-0000-0000-000000000000"),
            (Method::GET, "/food-requests/00000000-0000-0000-0000-000000000000"),
            (
                Method::PATCH,
                "/food-requests/00000000-0000-0000-0000-000000000000/status",
            ),
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method.clone())
                        .uri(uri)
                        .header(AUTHORIZATION, "Bearer not-a-jwt")
                        .body(Body::empty())?,
                )
                .await?;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");

            let body = to_bytes(response.into_body(), usize::MAX).await?;
            let json: serde_json::Value = serde_json::from_slice(&body)?;
            assert_eq!(json["message"], "unauthorized access");
        }
        Ok(())
    }

    #[tokio::test]
    async fn missing_food_is_json_404() -> Result<()> {
        let response = app()?
            .oneshot(Request::builder().uri("/foods/nope").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json, serde_json::json!({ "message": "food not found" }));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() -> Result<()> {
        let response = app()?
            .oneshot(Request::builder().uri("/nope").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json, serde_json::json!({ "message": "route not found" }));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_query_is_json_400() -> Result<()> {
        let response = app()?
            .oneshot(
                Request::builder()
                    .uri("/foods?email=a@x.com&email=b@x.com")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["message"], "Invalid query parameters");
        Ok(())
    }

    #[tokio::test]
    async fn register_user_upserts() -> Result<()> {
        let app = app()?;
        let request = || {
            Request::builder()
                .method(Method::POST)
                .uri("/users")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"A@x.com","name":"Alice"}"#))
        };

        let first = app.clone().oneshot(request()?).await?;
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = app.clone().oneshot(request()?).await?;
        assert_eq!(second.status(), StatusCode::OK);

        let bad = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/users")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))?,
            )
            .await?;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn serves_openapi_document() -> Result<()> {
        let response = app()?
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
