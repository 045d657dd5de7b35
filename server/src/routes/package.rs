//! Package endpoint routes.

use axum::{routing::post, Json, Router};

use crate::error::Result;
use crate::handlers::{handle_validate, ValidateRequest, ValidateResponse};
use crate::AppState;

/// Create package routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/packages/validate", post(validate_handler))
}

/// POST /packages/validate - Check a manifest against an archive listing.
async fn validate_handler(Json(request): Json<ValidateRequest>) -> Result<Json<ValidateResponse>> {
    let response = handle_validate(request)?;
    Ok(Json(response))
}
