//! Suspend-data envelope.
//!
//! `cmi.suspend_data` is a single opaque string shared by everything in a
//! SCO. Quiz history is stored there as a versioned JSON document keyed by
//! quiz id, so several quizzes can share one SCO without overwriting each
//! other and future layouts can be detected.

use crate::{quiz::QuizAttempt, Error, QuizId, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the suspend-data layout written by this crate.
pub const SUSPEND_FORMAT_VERSION: u32 = 1;

/// Layout version assigned to the bare attempt array written by early
/// courses.
pub const LEGACY_FORMAT_VERSION: u32 = 0;

/// Everything a SCO keeps in suspend data.
///
/// Uses BTreeMap so the encoded string is stable for identical state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendState {
    pub format_version: u32,
    #[serde(default)]
    pub quizzes: BTreeMap<QuizId, Vec<QuizAttempt>>,
}

impl Default for SuspendState {
    fn default() -> Self {
        Self::new()
    }
}

impl SuspendState {
    pub fn new() -> Self {
        Self {
            format_version: SUSPEND_FORMAT_VERSION,
            quizzes: BTreeMap::new(),
        }
    }

    pub fn attempts(&self, quiz: &str) -> &[QuizAttempt] {
        self.quizzes.get(quiz).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the history of one quiz. Upgrades legacy state to the current
    /// layout.
    pub fn set_attempts(&mut self, quiz: &str, attempts: Vec<QuizAttempt>) {
        self.format_version = SUSPEND_FORMAT_VERSION;
        self.quizzes.insert(quiz.to_string(), attempts);
    }

    pub fn is_legacy(&self) -> bool {
        self.format_version == LEGACY_FORMAT_VERSION
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSuspendData(e.to_string()))
    }

    /// Parse the current layout, rejecting versions newer than this crate
    /// understands.
    pub fn from_json(json: &str) -> Result<Self> {
        let state: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSuspendData(e.to_string()))?;

        if state.format_version > SUSPEND_FORMAT_VERSION {
            return Err(Error::UnsupportedSuspendFormat {
                found: state.format_version,
                supported: SUSPEND_FORMAT_VERSION,
            });
        }

        Ok(state)
    }

    /// Decode whatever is in suspend data.
    ///
    /// Empty input is a fresh state. A bare JSON array is the legacy layout
    /// and is attributed to `quiz`.
    pub fn decode(raw: &str, quiz: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::new());
        }
        if raw.starts_with('[') {
            let attempts: Vec<QuizAttempt> =
                serde_json::from_str(raw).map_err(|e| Error::InvalidSuspendData(e.to_string()))?;
            let mut quizzes = BTreeMap::new();
            quizzes.insert(quiz.to_string(), attempts);
            return Ok(Self {
                format_version: LEGACY_FORMAT_VERSION,
                quizzes,
            });
        }
        Self::from_json(raw)
    }
}
