//! # consentry-api — Axum API Services for the Consentry Platform
//!
//! The HTTP surface over the consent ledger, access-request log,
//! compliance core, and trust engine.
//!
//! ## API Surface
//!
//! | Prefix                     | Module                  | Auth        |
//! |----------------------------|-------------------------|-------------|
//! | `/v1/consent-types`        | [`routes::consents`]    | bearer      |
//! | `/v1/consents/*`           | [`routes::consents`]    | citizen     |
//! | `/v1/access-requests/*`    | [`routes::requests`]    | org/citizen |
//! | `/v1/compliance/*`         | [`routes::compliance`]  | organization|
//! | `/v1/trust/score`, `/integrity` | [`routes::trust`]  | organization|
//! | `/v1/organizations/*`      | [`routes::directory`]   | staff       |
//! | `/v1/trust/registry`, `/v1/trust/score/{id}` | [`routes::trust`] | public |
//! | `/v1/reports/transparency` | [`routes::reports`]     | public      |
//! | `/health/*`                | (this module)           | public      |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! Health probes, the public trust registry, and the transparency
//! report are mounted outside the auth middleware.

pub mod auth;
pub mod db;
pub mod error;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and the public trust/reporting surface are mounted
/// outside the auth middleware so they remain accessible without
/// credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::consents::router())
        .merge(routes::requests::router())
        .merge(routes::compliance::router())
        .merge(routes::trust::router())
        .merge(routes::directory::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    // Public surface: trust registry, public score reads, transparency
    // report.
    let public = Router::new()
        .merge(routes::trust::public_router())
        .merge(routes::reports::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Unauthenticated health probes.
    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(public).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_probes_respond_without_auth() {
        let state = AppState::with_config(
            state::AppConfig {
                port: 8080,
                auth_token: Some("secret".to_string()),
            },
            std::sync::Arc::new(notify::NoopNotifier),
            None,
        );
        let app = app(state);

        for path in ["/health/liveness", "/health/readiness"] {
            let resp = app
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn public_surface_responds_without_auth() {
        let state = AppState::with_config(
            state::AppConfig {
                port: 8080,
                auth_token: Some("secret".to_string()),
            },
            std::sync::Arc::new(notify::NoopNotifier),
            None,
        );
        let app = app(state);

        for path in ["/v1/trust/registry", "/v1/reports/transparency"] {
            let resp = app
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn authenticated_surface_rejects_missing_token() {
        let state = AppState::with_config(
            state::AppConfig {
                port: 8080,
                auth_token: Some("secret".to_string()),
            },
            std::sync::Arc::new(notify::NoopNotifier),
            None,
        );
        let app = app(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/consent-types")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn openapi_served_behind_auth() {
        let app = app(AppState::new());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
