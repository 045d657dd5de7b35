//! Quiz handlers - score previews and template generation.

use crate::error::{AppError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scorm_engine::{generate_quiz, Answer, QuestionId, QuizConfig, QuizTemplate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request body for scoring a set of answers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub quiz: QuizConfig,
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, Answer>,
}

/// Per-question grading detail.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub answered: bool,
    pub correct: bool,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Response for quiz scoring.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub score: u32,
    pub passed: bool,
    pub earned_points: u64,
    pub total_points: u64,
    pub results: Vec<QuestionResult>,
}

/// Request body for quiz generation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizRequest {
    pub template: QuizTemplate,
    /// Fixes the draw so previews are repeatable
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Grade answers without recording an attempt.
pub fn handle_score(request: ScoreRequest) -> Result<ScoreResponse> {
    let ScoreRequest { quiz, answers } = request;

    if let Some(unknown) = answers.keys().find(|id| quiz.question(id.as_str()).is_none()) {
        return Err(AppError::BadRequest(format!("Unknown question: {unknown}")));
    }

    let results = quiz
        .questions
        .iter()
        .map(|question| {
            let answer = answers.get(&question.id);
            let correct = answer.is_some_and(|a| question.is_correct(a));
            QuestionResult {
                question_id: question.id.clone(),
                answered: answer.is_some(),
                correct,
                points: if correct { question.points } else { 0 },
                feedback: answer
                    .and_then(|_| question.feedback_for(correct))
                    .map(str::to_string),
            }
        })
        .collect();

    let outcome = quiz.score(&answers);
    tracing::debug!(
        quiz = %quiz.id,
        score = outcome.score,
        passed = outcome.passed,
        "Scored quiz preview"
    );

    Ok(ScoreResponse {
        score: outcome.score,
        passed: outcome.passed,
        earned_points: outcome.earned_points,
        total_points: outcome.total_points,
        results,
    })
}

/// Build a quiz from a template.
pub fn handle_generate_quiz(request: GenerateQuizRequest) -> Result<QuizConfig> {
    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let quiz = generate_quiz(&request.template, &mut rng)?;
    tracing::info!(
        quiz = %quiz.id,
        questions = quiz.questions.len(),
        "Generated quiz"
    );
    Ok(quiz)
}
