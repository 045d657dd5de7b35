//! Error types for the SCORM engine.
//!
//! Runtime data-model calls report failures through [`ErrorCode`](crate::ErrorCode),
//! the numeric taxonomy shared with the LMS. Everything else (quiz lifecycle,
//! suspend-data decoding, manifests, cache persistence) uses [`Error`].

use crate::{QuestionId, QuizId};
use thiserror::Error;

/// All non-protocol errors from the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Quiz lifecycle
    #[error("maximum attempts ({max}) reached for quiz {quiz}")]
    MaxAttemptsReached { quiz: QuizId, max: u32 },

    #[error("no active quiz attempt")]
    NoActiveAttempt,

    #[error("an attempt is already in progress for quiz {0}")]
    AttemptInProgress(QuizId),

    #[error("question not found: {0}")]
    QuestionNotFound(QuestionId),

    // Suspend data
    #[error("invalid suspend data: {0}")]
    InvalidSuspendData(String),

    #[error("unsupported suspend data format version: {found} (max supported: {supported})")]
    UnsupportedSuspendFormat { found: u32, supported: u32 },

    // Packaging
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("file not found in archive: {0}")]
    MissingArchiveFile(String),

    // Persistence
    #[error("cache store failure: {0}")]
    Cache(String),

    #[error("invalid quiz template: {0}")]
    InvalidTemplate(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::QuestionNotFound("q9".into());
        assert_eq!(err.to_string(), "question not found: q9");

        let err = Error::MaxAttemptsReached {
            quiz: "final".into(),
            max: 3,
        };
        assert_eq!(
            err.to_string(),
            "maximum attempts (3) reached for quiz final"
        );

        let err = Error::UnsupportedSuspendFormat {
            found: 7,
            supported: 1,
        };
        assert_eq!(
            err.to_string(),
            "unsupported suspend data format version: 7 (max supported: 1)"
        );
    }
}
