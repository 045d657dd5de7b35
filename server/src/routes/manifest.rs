//! Manifest endpoint routes.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use scorm_engine::Manifest;

use crate::error::Result;
use crate::handlers::{handle_generate, handle_parse, GenerateRequest};
use crate::AppState;

/// Create manifest routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/manifest/parse", post(parse_handler))
        .route("/manifest/generate", post(generate_handler))
}

/// POST /manifest/parse - XML body in, manifest model out.
async fn parse_handler(body: String) -> Result<Json<Manifest>> {
    let manifest = handle_parse(&body)?;
    Ok(Json(manifest))
}

/// POST /manifest/generate - manifest model in, `imsmanifest.xml` out.
async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<impl IntoResponse> {
    let generated = handle_generate(request, state.config.default_version)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/xml".to_string()),
            (
                header::HeaderName::from_static("x-manifest-identifier"),
                generated.identifier,
            ),
        ],
        generated.xml,
    ))
}
