//! Quiz attempts and scoring.
//!
//! A [`QuizEngine`] runs attempts against one [`QuizConfig`]. Finished
//! attempts are persisted into the SCO's suspend data (see
//! [`crate::suspend`]) and the final score is reported through the
//! [`ProgressTracker`].

use crate::{
    suspend::SuspendState, tracker::ProgressTracker, tracker::Status, Error, QuestionId,
    QuizId, Result, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Serialized kebab-case; snake_case spellings are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    #[serde(alias = "multiple_choice")]
    MultipleChoice,
    #[serde(alias = "multiple_response")]
    MultipleResponse,
    #[serde(alias = "true_false")]
    TrueFalse,
    #[serde(alias = "fill_in")]
    FillIn,
    Matching,
    Sequencing,
}

/// A learner answer or an answer key: one value or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multiple(Vec<String>),
}

impl Answer {
    fn as_slice(&self) -> &[String] {
        match self {
            Answer::Single(s) => std::slice::from_ref(s),
            Answer::Multiple(v) => v,
        }
    }
}

impl From<&str> for Answer {
    fn from(s: &str) -> Self {
        Answer::Single(s.to_string())
    }
}

impl From<Vec<&str>> for Answer {
    fn from(v: Vec<&str>) -> Self {
        Answer::Multiple(v.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorrect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub correct_answer: Answer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    pub points: u32,
}

impl Question {
    /// Grade one answer.
    ///
    /// Multiple-response compares as sets of equal size; matching and
    /// sequencing compare element by element in order; everything else is an
    /// exact string match.
    pub fn is_correct(&self, answer: &Answer) -> bool {
        match self.kind {
            QuestionType::MultipleChoice | QuestionType::TrueFalse | QuestionType::FillIn => {
                match (answer, &self.correct_answer) {
                    (Answer::Single(given), Answer::Single(key)) => given == key,
                    _ => false,
                }
            }
            QuestionType::MultipleResponse => {
                let (given, key) = (answer.as_slice(), self.correct_answer.as_slice());
                if given.len() != key.len() {
                    return false;
                }
                let given: HashSet<_> = given.iter().collect();
                let key: HashSet<_> = key.iter().collect();
                given == key
            }
            QuestionType::Matching | QuestionType::Sequencing => answer == &self.correct_answer,
        }
    }

    pub fn feedback_for(&self, correct: bool) -> Option<&str> {
        let feedback = self.feedback.as_ref()?;
        if correct {
            feedback.correct.as_deref()
        } else {
            feedback.incorrect.as_deref()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizConfig {
    pub id: QuizId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Percent required to pass.
    pub passing_score: u32,
    #[serde(default)]
    pub randomize: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Seconds allowed per attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    pub questions: Vec<Question>,
}

/// Result of grading a set of answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreOutcome {
    /// Rounded percentage of points earned.
    pub score: u32,
    pub passed: bool,
    pub earned_points: u64,
    pub total_points: u64,
}

impl QuizConfig {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Sum of all question points, widened so large point values cannot
    /// overflow.
    pub fn total_points(&self) -> u64 {
        self.questions.iter().map(|q| u64::from(q.points)).sum()
    }

    /// Grade `answers`. Unanswered questions earn nothing; a quiz worth no
    /// points scores 0 and does not pass.
    pub fn score(&self, answers: &BTreeMap<QuestionId, Answer>) -> ScoreOutcome {
        let total_points = self.total_points();
        let earned_points = self
            .questions
            .iter()
            .filter(|q| answers.get(&q.id).is_some_and(|a| q.is_correct(a)))
            .map(|q| u64::from(q.points))
            .sum();

        if total_points == 0 {
            return ScoreOutcome {
                score: 0,
                passed: false,
                earned_points,
                total_points,
            };
        }

        let score = (earned_points as f64 / total_points as f64 * 100.0).round() as u32;
        ScoreOutcome {
            score,
            passed: score >= self.passing_score,
            earned_points,
            total_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub start_time: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, Answer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

impl QuizAttempt {
    pub fn new(start_time: Timestamp) -> Self {
        Self {
            start_time,
            end_time: None,
            answers: BTreeMap::new(),
            score: None,
            passed: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

pub struct QuizEngine {
    config: QuizConfig,
    attempts: Vec<QuizAttempt>,
    current: Option<QuizAttempt>,
}

impl QuizEngine {
    /// A quiz with no attempt history.
    pub fn new(config: QuizConfig) -> Self {
        Self {
            config,
            attempts: Vec::new(),
            current: None,
        }
    }

    /// A quiz whose history is restored from the SCO's suspend data.
    ///
    /// Unreadable suspend data is logged and treated as no history.
    pub fn load(config: QuizConfig, tracker: &mut ProgressTracker) -> Self {
        let raw = tracker.suspend_data();
        let attempts = match SuspendState::decode(&raw, &config.id) {
            Ok(state) => state.attempts(&config.id).to_vec(),
            Err(e) => {
                warn!(quiz = %config.id, error = %e, "Ignoring unreadable quiz suspend data");
                Vec::new()
            }
        };
        debug!(quiz = %config.id, attempts = attempts.len(), "Loaded quiz attempts");
        Self {
            config,
            attempts,
            current: None,
        }
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    /// Finished attempts, oldest first.
    pub fn attempts(&self) -> &[QuizAttempt] {
        &self.attempts
    }

    pub fn current_attempt(&self) -> Option<&QuizAttempt> {
        self.current.as_ref()
    }

    pub fn attempts_remaining(&self) -> Option<u32> {
        self.config
            .max_attempts
            .map(|max| max.saturating_sub(self.attempts.len() as u32))
    }

    fn max_attempts_reached(&self) -> bool {
        self.attempts_remaining() == Some(0)
    }

    pub fn start_attempt(&mut self, now: Timestamp) -> Result<&QuizAttempt> {
        if self.current.is_some() {
            return Err(Error::AttemptInProgress(self.config.id.clone()));
        }
        if let Some(max) = self.config.max_attempts {
            if self.max_attempts_reached() {
                return Err(Error::MaxAttemptsReached {
                    quiz: self.config.id.clone(),
                    max,
                });
            }
        }
        info!(quiz = %self.config.id, attempt = self.attempts.len() + 1, "Starting quiz attempt");
        let attempt = self.current.insert(QuizAttempt::new(now));
        Ok(&*attempt)
    }

    /// Record or replace the answer to a question in the active attempt.
    pub fn answer_question(&mut self, question_id: &str, answer: Answer) -> Result<()> {
        let attempt = self.current.as_mut().ok_or(Error::NoActiveAttempt)?;
        if self.config.question(question_id).is_none() {
            return Err(Error::QuestionNotFound(question_id.to_string()));
        }
        attempt.answers.insert(question_id.to_string(), answer);
        Ok(())
    }

    /// Grade and seal the active attempt, persist history and report the
    /// score to the tracker.
    ///
    /// If the history cannot be written to suspend data the score is still
    /// reported and the attempt still counts in memory, but the write error
    /// is returned.
    pub fn submit_attempt(
        &mut self,
        tracker: &mut ProgressTracker,
        now: Timestamp,
    ) -> Result<QuizAttempt> {
        let mut attempt = self.current.take().ok_or(Error::NoActiveAttempt)?;
        let outcome = self.config.score(&attempt.answers);
        attempt.end_time = Some(now);
        attempt.score = Some(outcome.score);
        attempt.passed = Some(outcome.passed);
        self.attempts.push(attempt.clone());

        info!(
            quiz = %self.config.id,
            score = outcome.score,
            passed = outcome.passed,
            "Quiz attempt submitted"
        );

        let saved = self.save_attempts(tracker);

        let _ = tracker.set_score(f64::from(outcome.score));
        if outcome.passed {
            let _ = tracker.set_status(Status::Passed);
        } else if self.max_attempts_reached() {
            let _ = tracker.set_status(Status::Failed);
        }

        if let Err(e) = saved {
            warn!(quiz = %self.config.id, error = %e, "Failed to persist quiz attempts");
            return Err(e);
        }
        Ok(attempt)
    }

    /// Feedback text for an answer to `question_id`.
    pub fn feedback(&self, question_id: &str, answer: &Answer) -> Option<&str> {
        let question = self.config.question(question_id)?;
        question.feedback_for(question.is_correct(answer))
    }

    /// Milliseconds left in the active attempt, if it is timed.
    pub fn time_remaining(&self, now: Timestamp) -> Option<u64> {
        let attempt = self.current.as_ref()?;
        let limit_ms = self.config.time_limit?.saturating_mul(1000);
        let elapsed = now.saturating_sub(attempt.start_time);
        Some(limit_ms.saturating_sub(elapsed))
    }

    /// True when the active attempt has run out of time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.time_remaining(now) == Some(0)
    }

    fn save_attempts(&self, tracker: &mut ProgressTracker) -> Result<()> {
        let raw = tracker.suspend_data();
        let mut state = SuspendState::decode(&raw, &self.config.id).unwrap_or_else(|e| {
            warn!(error = %e, "Replacing unreadable suspend data");
            SuspendState::new()
        });
        state.set_attempts(&self.config.id, self.attempts.clone());
        let json = state.to_json()?;
        if tracker.set_suspend_data(&json).is_ok() {
            return Ok(());
        }

        // Too large for the LMS: keep scores and timing, drop recorded answers.
        let compacted = self
            .attempts
            .iter()
            .map(|attempt| QuizAttempt {
                answers: BTreeMap::new(),
                ..attempt.clone()
            })
            .collect();
        state.set_attempts(&self.config.id, compacted);
        let json = state.to_json()?;
        debug!(quiz = %self.config.id, len = json.len(), "Saving compacted quiz attempts");
        tracker
            .set_suspend_data(&json)
            .map_err(|code| Error::InvalidSuspendData(code.to_string()))
    }
}
