//! Course-level progress tracking on top of the runtime engine.
//!
//! [`ProgressTracker`] speaks in version-independent terms (location,
//! progress, score, status) and maps each onto the element names of the
//! session's SCORM version.

use crate::{
    adapter::CallResult, runtime::ScormEngine, version::Field, ErrorCode, ScormVersion,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Learner-facing lesson status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[serde(rename = "not attempted")]
    NotAttempted,
    Incomplete,
    Completed,
    Passed,
    Failed,
    Browsed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotAttempted => "not attempted",
            Status::Incomplete => "incomplete",
            Status::Completed => "completed",
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Browsed => "browsed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not attempted" => Ok(Status::NotAttempted),
            "incomplete" => Ok(Status::Incomplete),
            "completed" => Ok(Status::Completed),
            "passed" => Ok(Status::Passed),
            "failed" => Ok(Status::Failed),
            "browsed" => Ok(Status::Browsed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Point-in-time view of tracked data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    pub location: String,
    /// 0..=1; always 0 under SCORM 1.2.
    pub progress: f64,
    pub score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub status: String,
    pub suspend_data: String,
    pub session_time: String,
    pub total_time: String,
}

/// Format an elapsed duration the way `session_time` expects it.
///
/// SCORM 1.2 uses `HH:MM:SS`; SCORM 2004 uses an ISO 8601 duration.
pub fn format_session_time(version: ScormVersion, elapsed_ms: u64) -> String {
    let total = elapsed_ms / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match version {
        ScormVersion::Scorm12 => format!("{hours:02}:{minutes:02}:{seconds:02}"),
        ScormVersion::Scorm2004 => format!("PT{hours}H{minutes}M{seconds}S"),
    }
}

/// `(score - min) / (max - min)` limited to `[-1, 1]`; 0 for a degenerate range.
pub fn scaled_score(score: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range == 0.0 || !range.is_finite() {
        return 0.0;
    }
    let scaled = (score - min) / range;
    if scaled.is_nan() {
        0.0
    } else {
        scaled.clamp(-1.0, 1.0)
    }
}

/// Keep every write, report the first failure.
fn first_error(results: impl IntoIterator<Item = CallResult<()>>) -> CallResult<()> {
    results.into_iter().fold(Ok(()), |acc, r| acc.and(r))
}

pub struct ProgressTracker {
    engine: ScormEngine,
    started_at: Timestamp,
    last_session_time: Option<String>,
}

impl ProgressTracker {
    /// Wrap an engine; session time is measured from `now`.
    pub fn new(engine: ScormEngine, now: Timestamp) -> Self {
        Self {
            engine,
            started_at: now,
            last_session_time: None,
        }
    }

    pub fn engine(&self) -> &ScormEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ScormEngine {
        &mut self.engine
    }

    pub fn into_engine(self) -> ScormEngine {
        self.engine
    }

    pub fn version(&self) -> ScormVersion {
        self.engine.version()
    }

    /// Restart session timing, e.g. when a new session begins.
    pub fn restart_clock(&mut self, now: Timestamp) {
        self.started_at = now;
        self.last_session_time = None;
    }

    pub fn snapshot(&mut self) -> TrackingSnapshot {
        let progress = match self.version() {
            ScormVersion::Scorm12 => 0.0,
            ScormVersion::Scorm2004 => self.read_number(Field::Progress, 0.0),
        };
        TrackingSnapshot {
            location: self.read(Field::Location),
            progress,
            score: self.read_number(Field::ScoreRaw, 0.0),
            min_score: self.read_number(Field::ScoreMin, 0.0),
            max_score: self.read_number(Field::ScoreMax, 100.0),
            status: self.read(Field::Status),
            suspend_data: self.read(Field::SuspendData),
            session_time: self.last_session_time.clone().unwrap_or_default(),
            total_time: self.read(Field::TotalTime),
        }
    }

    pub fn set_location(&mut self, location: &str) -> CallResult<()> {
        self.write(Field::Location, location)
    }

    /// Record progress in `[0, 1]`.
    ///
    /// SCORM 1.2 has no progress element; the call writes nothing and fails
    /// with `NotImplemented`.
    pub fn set_progress(&mut self, progress: f64) -> CallResult<()> {
        match self.version() {
            ScormVersion::Scorm12 => {
                warn!("Progress tracking is not available in SCORM 1.2");
                Err(ErrorCode::NotImplemented)
            }
            ScormVersion::Scorm2004 => {
                self.write(Field::Progress, &progress.clamp(0.0, 1.0).to_string())
            }
        }
    }

    /// Record a percent score on the default 0..100 range.
    pub fn set_score(&mut self, score: f64) -> CallResult<()> {
        self.set_score_range(score, 100.0, 0.0)
    }

    pub fn set_score_range(&mut self, score: f64, max: f64, min: f64) -> CallResult<()> {
        let mut results = vec![
            self.write(Field::ScoreRaw, &score.to_string()),
            self.write(Field::ScoreMax, &max.to_string()),
            self.write(Field::ScoreMin, &min.to_string()),
        ];
        if self.version() == ScormVersion::Scorm2004 {
            let scaled = scaled_score(score, min, max);
            results.push(self.write(Field::ScoreScaled, &scaled.to_string()));
        }
        first_error(results)
    }

    /// Record a status.
    ///
    /// SCORM 1.2 stores it in `lesson_status` as is. SCORM 2004 splits it:
    /// passed / failed go to `success_status` and also mark the attempt
    /// completed; everything else goes to `completion_status`. The 2004
    /// completion vocabulary has no `browsed`, so it is stored as `completed`.
    pub fn set_status(&mut self, status: Status) -> CallResult<()> {
        match self.version() {
            ScormVersion::Scorm12 => self.write(Field::Status, status.as_str()),
            ScormVersion::Scorm2004 => match status {
                Status::Passed | Status::Failed => first_error([
                    self.write(Field::SuccessStatus, status.as_str()),
                    self.write(Field::Status, Status::Completed.as_str()),
                ]),
                Status::Browsed => self.write(Field::Status, Status::Completed.as_str()),
                other => self.write(Field::Status, other.as_str()),
            },
        }
    }

    pub fn set_suspend_data(&mut self, data: &str) -> CallResult<()> {
        self.write(Field::SuspendData, data)
    }

    pub fn suspend_data(&mut self) -> String {
        self.read(Field::SuspendData)
    }

    /// Stamp the time elapsed since the session started.
    pub fn set_session_time(&mut self, now: Timestamp) -> CallResult<()> {
        let elapsed = now.saturating_sub(self.started_at);
        let formatted = format_session_time(self.version(), elapsed);
        let result = self.write(Field::SessionTime, &formatted);
        if result.is_ok() {
            self.last_session_time = Some(formatted);
        }
        result
    }

    /// Close out the SCO.
    ///
    /// With a score, records it and passes or fails against the configured
    /// pass mark; without one, marks the SCO completed. Then sets full
    /// progress (2004), stamps session time and commits.
    pub fn complete(&mut self, score: Option<f64>, now: Timestamp) -> CallResult<()> {
        let mut results = Vec::new();
        match score {
            Some(score) => {
                results.push(self.set_score(score));
                let status = if score >= self.engine.config().passing_score {
                    Status::Passed
                } else {
                    Status::Failed
                };
                results.push(self.set_status(status));
            }
            None => results.push(self.set_status(Status::Completed)),
        }
        if self.version() == ScormVersion::Scorm2004 {
            results.push(self.set_progress(1.0));
        }
        results.push(self.set_session_time(now));
        results.push(self.engine.commit());
        first_error(results)
    }

    fn write(&mut self, field: Field, value: &str) -> CallResult<()> {
        let Some(element) = self.version().element(field) else {
            return Err(ErrorCode::NotImplemented);
        };
        self.engine.set_value(element, value).inspect_err(|code| {
            warn!(element, value, code = code.code(), "Failed to record tracking value");
        })
    }

    fn read(&mut self, field: Field) -> String {
        self.version()
            .element(field)
            .and_then(|element| self.engine.get_value(element).ok())
            .unwrap_or_default()
    }

    fn read_number(&mut self, field: Field, default: f64) -> f64 {
        self.read(field).trim().parse().unwrap_or(default)
    }
}
