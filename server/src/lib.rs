//! Scorm Server - authoring service for SCORM content packages.
//!
//! Exposes manifest parsing and generation, package validation and quiz
//! scoring previews over JSON using scorm-engine. It never hosts a learner
//! session.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

use crate::config::Config;
use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

/// Build the application router.
pub fn app(config: Config) -> Router {
    let max_body_bytes = config.max_body_bytes;
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .merge(routes::create_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
