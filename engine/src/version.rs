//! SCORM version profiles.
//!
//! Everything that differs between SCORM 1.2 and SCORM 2004 at the protocol
//! level lives here as data: the global API symbol, method names, boolean
//! encoding and the element names behind each tracked field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The SCORM edition a runtime session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScormVersion {
    #[default]
    #[serde(rename = "1.2")]
    Scorm12,
    #[serde(rename = "2004")]
    Scorm2004,
}

/// How a host encodes boolean results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolEncoding {
    /// `"true"` / `"false"` strings (SCORM 1.2)
    Text,
    /// Native booleans (SCORM 2004)
    Native,
}

/// The eight calls of the runtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Initialize,
    Terminate,
    GetValue,
    SetValue,
    Commit,
    GetLastError,
    GetErrorString,
    GetDiagnostic,
}

/// Version-independent names for the data-model fields the tracker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Location,
    SuspendData,
    ScoreRaw,
    ScoreMin,
    ScoreMax,
    ScoreScaled,
    /// Lesson status (1.2) or completion status (2004)
    Status,
    SuccessStatus,
    Progress,
    SessionTime,
    TotalTime,
    Exit,
    LearnerId,
    LearnerName,
}

impl ScormVersion {
    /// Global symbol under which the LMS publishes its API object.
    pub fn api_name(self) -> &'static str {
        match self {
            ScormVersion::Scorm12 => "API",
            ScormVersion::Scorm2004 => "API_1484_11",
        }
    }

    pub fn bool_encoding(self) -> BoolEncoding {
        match self {
            ScormVersion::Scorm12 => BoolEncoding::Text,
            ScormVersion::Scorm2004 => BoolEncoding::Native,
        }
    }

    /// Host method name for a call.
    pub fn method_name(self, method: ApiMethod) -> &'static str {
        use ApiMethod::*;
        match (self, method) {
            (ScormVersion::Scorm12, Initialize) => "LMSInitialize",
            (ScormVersion::Scorm12, Terminate) => "LMSFinish",
            (ScormVersion::Scorm12, GetValue) => "LMSGetValue",
            (ScormVersion::Scorm12, SetValue) => "LMSSetValue",
            (ScormVersion::Scorm12, Commit) => "LMSCommit",
            (ScormVersion::Scorm12, GetLastError) => "LMSGetLastError",
            (ScormVersion::Scorm12, GetErrorString) => "LMSGetErrorString",
            (ScormVersion::Scorm12, GetDiagnostic) => "LMSGetDiagnostic",
            (ScormVersion::Scorm2004, Initialize) => "Initialize",
            (ScormVersion::Scorm2004, Terminate) => "Terminate",
            (ScormVersion::Scorm2004, GetValue) => "GetValue",
            (ScormVersion::Scorm2004, SetValue) => "SetValue",
            (ScormVersion::Scorm2004, Commit) => "Commit",
            (ScormVersion::Scorm2004, GetLastError) => "GetLastError",
            (ScormVersion::Scorm2004, GetErrorString) => "GetErrorString",
            (ScormVersion::Scorm2004, GetDiagnostic) => "GetDiagnostic",
        }
    }

    /// Element path backing a field, if this version has one.
    pub fn element(self, field: Field) -> Option<&'static str> {
        use Field::*;
        let path = match self {
            ScormVersion::Scorm12 => match field {
                Location => "cmi.core.lesson_location",
                SuspendData => "cmi.suspend_data",
                ScoreRaw => "cmi.core.score.raw",
                ScoreMin => "cmi.core.score.min",
                ScoreMax => "cmi.core.score.max",
                Status => "cmi.core.lesson_status",
                SessionTime => "cmi.core.session_time",
                TotalTime => "cmi.core.total_time",
                Exit => "cmi.core.exit",
                LearnerId => "cmi.core.student_id",
                LearnerName => "cmi.core.student_name",
                ScoreScaled | SuccessStatus | Progress => return None,
            },
            ScormVersion::Scorm2004 => match field {
                Location => "cmi.location",
                SuspendData => "cmi.suspend_data",
                ScoreRaw => "cmi.score.raw",
                ScoreMin => "cmi.score.min",
                ScoreMax => "cmi.score.max",
                ScoreScaled => "cmi.score.scaled",
                Status => "cmi.completion_status",
                SuccessStatus => "cmi.success_status",
                Progress => "cmi.progress_measure",
                SessionTime => "cmi.session_time",
                TotalTime => "cmi.total_time",
                Exit => "cmi.exit",
                LearnerId => "cmi.learner_id",
                LearnerName => "cmi.learner_name",
            },
        };
        Some(path)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScormVersion::Scorm12 => "1.2",
            ScormVersion::Scorm2004 => "2004",
        }
    }
}

impl fmt::Display for ScormVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScormVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.2" | "12" => Ok(ScormVersion::Scorm12),
            "2004" => Ok(ScormVersion::Scorm2004),
            other => Err(format!("unknown SCORM version: {other}")),
        }
    }
}
