//! HTTP surface.
//!
//! Route handlers are grouped per resource; everything under `/api` runs
//! behind the bearer token middleware. Shared state travels in [`AppState`].

pub mod audit_logs;
pub mod cooperatives;
pub mod deeds;
pub mod pagination;
pub mod schemas;
pub mod signing;
pub mod statistics;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::config::{CorsOrigins, Settings};
use crate::notifications::Notifier;
use crate::persistence::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub settings: Arc<Settings>,
    pub notifier: Arc<dyn Notifier>,
}

pub const PAGINATION_HEADERS: [HeaderName; 4] = [
    HeaderName::from_static("x-total-count"),
    HeaderName::from_static("x-total-pages"),
    HeaderName::from_static("x-current-page"),
    HeaderName::from_static("x-page-size"),
];

fn cors_layer(settings: &Settings) -> CorsLayer {
    match &settings.cors_origins {
        CorsOrigins::Any => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(PAGINATION_HEADERS),
        CorsOrigins::List(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            // Credentialed CORS forbids wildcards, so methods and headers
            // are spelled out.
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                .allow_credentials(true)
                .expose_headers(PAGINATION_HEADERS)
        }
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Mortgage Deed API is running" }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(cooperatives::routes())
        .merge(deeds::routes())
        .merge(signing::routes())
        .merge(audit_logs::routes())
        .merge(statistics::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.settings))
        .with_state(state)
}
