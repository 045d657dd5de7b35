//! HTTP route definitions.

mod health;
mod manifest;
mod package;
mod quiz;

use crate::error::AppError;
use crate::AppState;
use axum::{http::Uri, Router};

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(manifest::routes())
        .merge(package::routes())
        .merge(quiz::routes())
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
