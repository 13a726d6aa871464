use axum::{routing::get, Json, Router};
use common::types::Health;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::startup::AppStores;

pub mod records;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: health plus the fleet and catalog
/// collections, wrapped in CORS and request tracing.
pub fn build_router(stores: &AppStores, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(records::schema_router(stores.fleet.clone()))
        .merge(records::schema_router(stores.catalog.clone()))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
