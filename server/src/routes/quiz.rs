//! Quiz endpoint routes.

use axum::{routing::post, Json, Router};
use scorm_engine::QuizConfig;

use crate::error::Result;
use crate::handlers::{
    handle_generate_quiz, handle_score, GenerateQuizRequest, ScoreRequest, ScoreResponse,
};
use crate::AppState;

/// Create quiz routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quiz/score", post(score_handler))
        .route("/quiz/generate", post(generate_handler))
}

/// POST /quiz/score - Grade answers against a quiz definition.
async fn score_handler(Json(request): Json<ScoreRequest>) -> Result<Json<ScoreResponse>> {
    let response = handle_score(request)?;
    Ok(Json(response))
}

/// POST /quiz/generate - Expand a quiz template.
async fn generate_handler(Json(request): Json<GenerateQuizRequest>) -> Result<Json<QuizConfig>> {
    let quiz = handle_generate_quiz(request)?;
    Ok(Json(quiz))
}
