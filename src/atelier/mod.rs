//! HTTP surface of the site.
//!
//! Every browser page lifetime is a visit (see [`state`]); the handlers
//! translate visit actions into calls on the gate and answer with the view
//! the page should render.

pub mod handlers;
pub mod openapi;
pub mod state;

use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use self::{
    handlers::{health, register, session, visits},
    openapi::ApiDoc,
    state::SiteState,
};

pub mod built_info {
    #![allow(clippy::doc_markdown)]
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = if let Some(hash) = built_info::GIT_COMMIT_HASH {
    hash
} else {
    ":-("
};

/// Build the application router around `state`.
#[must_use]
pub fn router(state: Arc<SiteState>) -> Router {
    Router::new()
        .route("/health", get(health).options(health))
        .route("/v1/visits", post(visits::open_visit))
        .route(
            "/v1/visits/:visit_id",
            get(visits::get_visit).delete(visits::close_visit),
        )
        .route("/v1/visits/:visit_id/login", post(session::login))
        .route("/v1/visits/:visit_id/logout", post(session::logout))
        .route(
            "/v1/visits/:visit_id/register/otp",
            post(register::request_otp),
        )
        .route("/v1/visits/:visit_id/register", post(register::register))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Serve the site on `port` until ctrl-c.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn new(port: u16, state: Arc<SiteState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http.request", path, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::Backends,
        gate::{RegistrationSettings, VerificationMode},
    };
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        router(Arc::new(SiteState::new(
            Backends::memory(),
            RegistrationSettings::new(VerificationMode::Otp),
        )))
    }

    #[test]
    fn test_make_span() {
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "01J0000000000000000000000")
            .body(Body::empty())
            .unwrap();
        let _span = make_span(&request);
    }

    #[tokio::test]
    async fn test_health() -> Result<()> {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));
        assert!(response.headers().contains_key("x-request-id"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let health: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(health["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(health["identity"], "memory");
        Ok(())
    }

    #[tokio::test]
    async fn test_health_options_has_no_body() -> Result<()> {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/health")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        assert!(body.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_visit() -> Result<()> {
        let uri = format!("/v1/visits/{}", Ulid::new());
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_login_without_payload() -> Result<()> {
        let uri = format!("/v1/visits/{}/login", Ulid::new());
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(&body[..], b"Missing payload");
        Ok(())
    }

    #[tokio::test]
    async fn test_openapi_served() -> Result<()> {
        let response = app()
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
