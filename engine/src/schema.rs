//! Data-model schema and validation.
//!
//! Each SCORM version publishes a fixed table of data-model elements. The
//! schema answers three questions before any call reaches the LMS: does the
//! element exist, may it be read or written, and is the value well formed.
//!
//! Array members (`cmi.objectives.3.id`) are looked up through their
//! normalized form (`cmi.objectives.n.id`), see [`normalize_path`].

use crate::{ErrorCode, ScormVersion};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Placeholder that replaces every numeric path segment.
pub const INDEX_WILDCARD: &str = "n";

/// Who may touch an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

impl Access {
    pub fn readable(self) -> bool {
        self != Access::WriteOnly
    }

    pub fn writable(self) -> bool {
        self != Access::ReadOnly
    }
}

/// Value constraint attached to an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueType {
    /// Free text
    Any,
    /// Text bounded to a number of characters
    Text { max_len: usize },
    /// Decimal number, optionally bounded (inclusive)
    Real { min: Option<f64>, max: Option<f64> },
    /// Whole number within an inclusive range
    Integer { min: i64, max: i64 },
    /// One of a fixed set of tokens
    Vocabulary(&'static [&'static str]),
    /// One of a fixed set of tokens, or a decimal number
    VocabularyOrReal(&'static [&'static str]),
    /// SCORM 1.2 `CMITimespan`: `HHHH:MM:SS.SS`
    Timespan,
    /// SCORM 1.2 `CMITime`: `HH:MM:SS.SS`
    ClockTime,
    /// SCORM 2004 `timeinterval`: ISO 8601 duration
    Duration,
    /// SCORM 2004 `time`: ISO 8601 timestamp
    Timestamp,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "CharString"),
            ValueType::Text { max_len } => write!(f, "CharString({max_len})"),
            ValueType::Real { .. } => write!(f, "Real"),
            ValueType::Integer { .. } => write!(f, "Integer"),
            ValueType::Vocabulary(_) => write!(f, "Vocabulary"),
            ValueType::VocabularyOrReal(_) => write!(f, "Vocabulary|Real"),
            ValueType::Timespan => write!(f, "CMITimespan"),
            ValueType::ClockTime => write!(f, "CMITime"),
            ValueType::Duration => write!(f, "timeinterval"),
            ValueType::Timestamp => write!(f, "time"),
        }
    }
}

impl ValueType {
    /// Check a raw string value against this constraint.
    pub fn accepts(&self, value: &str) -> bool {
        match *self {
            ValueType::Any => true,
            ValueType::Text { max_len } => value.chars().count() <= max_len,
            ValueType::Real { min, max } => match parse_real(value) {
                Some(n) => min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi),
                None => false,
            },
            ValueType::Integer { min, max } => value
                .trim()
                .parse::<i64>()
                .is_ok_and(|n| (min..=max).contains(&n)),
            ValueType::Vocabulary(tokens) => tokens.contains(&value),
            ValueType::VocabularyOrReal(tokens) => {
                tokens.contains(&value) || parse_real(value).is_some()
            }
            ValueType::Timespan => is_clock(value, 2..=4),
            ValueType::ClockTime => is_clock(value, 2..=2),
            ValueType::Duration => is_iso_duration(value),
            ValueType::Timestamp => is_iso_timestamp(value),
        }
    }
}

/// Definition of one data-model element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementDef {
    /// Normalized dotted path
    pub path: &'static str,
    pub access: Access,
    pub value: ValueType,
}

impl ElementDef {
    pub const fn read_write(path: &'static str, value: ValueType) -> Self {
        Self {
            path,
            access: Access::ReadWrite,
            value,
        }
    }

    pub const fn read_only(path: &'static str) -> Self {
        Self {
            path,
            access: Access::ReadOnly,
            value: ValueType::Any,
        }
    }

    pub const fn write_only(path: &'static str, value: ValueType) -> Self {
        Self {
            path,
            access: Access::WriteOnly,
            value,
        }
    }
}

/// Replace every numeric segment of a dotted path with [`INDEX_WILDCARD`].
///
/// `cmi.interactions.2.objectives.0.id` becomes
/// `cmi.interactions.n.objectives.n.id`. Applying it twice is a no-op.
pub fn normalize_path(path: &str) -> String {
    path.split('.')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                INDEX_WILDCARD
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Number of distinct array indices stored directly under `prefix`.
///
/// `cmi.objectives` over keys `cmi.objectives.0.id` and
/// `cmi.objectives.0.score.raw` counts one entry.
pub fn count_indices<'a>(prefix: &str, keys: impl IntoIterator<Item = &'a str>) -> usize {
    let prefix = format!("{prefix}.");
    keys.into_iter()
        .filter_map(|k| k.strip_prefix(&prefix))
        .filter_map(|rest| rest.split('.').next())
        .filter(|index| all_digits(index))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Element table for one SCORM version.
#[derive(Debug, Clone)]
pub struct DataModelSchema {
    version: ScormVersion,
    table: &'static [ElementDef],
    elements: HashMap<&'static str, ElementDef>,
}

impl DataModelSchema {
    /// Build the table for a version.
    pub fn for_version(version: ScormVersion) -> Self {
        let defs: &[ElementDef] = match version {
            ScormVersion::Scorm12 => SCORM12_ELEMENTS,
            ScormVersion::Scorm2004 => SCORM2004_ELEMENTS,
        };
        Self {
            version,
            table: defs,
            elements: defs.iter().map(|d| (d.path, *d)).collect(),
        }
    }

    pub fn version(&self) -> ScormVersion {
        self.version
    }

    /// Look up an element by its concrete path.
    ///
    /// A path that spells out the wildcard (`cmi.objectives.n.id`) names no
    /// element.
    pub fn lookup(&self, path: &str) -> Option<&ElementDef> {
        if spells_wildcard(path) {
            return None;
        }
        self.elements.get(normalize_path(path).as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All element definitions, in no particular order.
    pub fn elements(&self) -> impl Iterator<Item = &ElementDef> {
        self.elements.values()
    }

    /// What an LMS answers for `cmi._version` or a `._children` keyword.
    ///
    /// Children are listed in table order; members of an array report the
    /// fields of one entry.
    pub fn keyword_value(&self, path: &str) -> Option<String> {
        if spells_wildcard(path) {
            return None;
        }
        let normalized = normalize_path(path);
        if normalized == "cmi._version" {
            let version = match self.version {
                ScormVersion::Scorm12 => "3.4",
                ScormVersion::Scorm2004 => "1.0",
            };
            return Some(version.to_string());
        }
        if !self.elements.contains_key(normalized.as_str()) {
            return None;
        }
        let prefix = format!("{}.", normalized.strip_suffix("._children")?);
        let mut children: Vec<&str> = Vec::new();
        for def in self.table {
            let Some(rest) = def.path.strip_prefix(&prefix) else {
                continue;
            };
            let rest = rest.strip_prefix("n.").unwrap_or(rest);
            let child = rest.split('.').next().unwrap_or(rest);
            if !child.starts_with('_') && !children.contains(&child) {
                children.push(child);
            }
        }
        Some(children.join(","))
    }

    /// Validate a read.
    pub fn check_get(&self, path: &str) -> Result<&ElementDef, ErrorCode> {
        match self.lookup(path) {
            Some(def) if def.access.readable() => Ok(def),
            Some(_) => Err(ErrorCode::ElementIsWriteOnly),
            None => Err(self.classify_unknown(path)),
        }
    }

    /// Validate a write, including the value.
    pub fn check_set(&self, path: &str, value: &str) -> Result<&ElementDef, ErrorCode> {
        let def = self.lookup(path).ok_or(ErrorCode::InvalidArgument)?;
        if !def.access.writable() {
            return Err(ErrorCode::InvalidSetValue);
        }
        if !def.value.accepts(value) {
            return Err(ErrorCode::InvalidSetValue);
        }
        Ok(def)
    }

    /// Pick the most specific code for a path that is not in the table.
    fn classify_unknown(&self, path: &str) -> ErrorCode {
        if spells_wildcard(path) {
            return ErrorCode::InvalidArgument;
        }
        let normalized = normalize_path(path);
        if let Some(parent) = normalized.strip_suffix("._children") {
            if self.elements.contains_key(parent) {
                return ErrorCode::ElementCannotHaveChildren;
            }
        }
        if let Some(parent) = normalized.strip_suffix("._count") {
            if self.elements.contains_key(parent) || self.is_container(parent) {
                return ErrorCode::ElementNotAnArray;
            }
        }
        ErrorCode::InvalidArgument
    }

    fn is_container(&self, prefix: &str) -> bool {
        let prefix = format!("{prefix}.");
        self.elements.keys().any(|k| k.starts_with(&prefix))
    }
}

fn spells_wildcard(path: &str) -> bool {
    path.split('.').any(|segment| segment == INDEX_WILDCARD)
}

fn parse_real(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `H{hours}:MM:SS[.S[S]]` with minutes and seconds below 60.
fn is_clock(value: &str, hour_digits: std::ops::RangeInclusive<usize>) -> bool {
    let mut parts = value.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if !all_digits(h) || !hour_digits.contains(&h.len()) {
        return false;
    }
    if m.len() != 2 || !all_digits(m) || m.parse::<u8>().map_or(true, |m| m >= 60) {
        return false;
    }
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (s, None),
    };
    if whole.len() != 2 || !all_digits(whole) || whole.parse::<u8>().map_or(true, |s| s >= 60) {
        return false;
    }
    frac.map_or(true, |f| all_digits(f) && f.len() <= 2)
}

/// ISO 8601 duration such as `PT1H30M5.25S` or `P1DT2H`.
pub(crate) fn is_iso_duration(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('P') else {
        return false;
    };
    let (date, time) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };
    let Some(date_count) = duration_components(date, &['Y', 'M', 'D'], false) else {
        return false;
    };
    let time_count = match time {
        Some(t) => match duration_components(t, &['H', 'M', 'S'], true) {
            Some(0) | None => return false,
            Some(n) => n,
        },
        None => 0,
    };
    date_count + time_count > 0
}

/// Count `<number><designator>` pairs appearing in the given order.
fn duration_components(s: &str, designators: &[char], seconds_fraction: bool) -> Option<usize> {
    let mut count = 0;
    let mut next = 0;
    let mut number = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let pos = designators[next..].iter().position(|d| *d == c)? + next;
        if number.is_empty() {
            return None;
        }
        if number.contains('.') {
            let allowed = seconds_fraction && c == 'S';
            let mut pieces = number.split('.');
            let (Some(w), Some(f), None) = (pieces.next(), pieces.next(), pieces.next()) else {
                return None;
            };
            if !allowed || !all_digits(w) || !all_digits(f) {
                return None;
            }
        }
        number.clear();
        next = pos + 1;
        count += 1;
    }
    number.is_empty().then_some(count)
}

/// Lenient ISO 8601 timestamp: a four digit year, optionally followed by
/// `-MM`, `-DD` and a `T` time part.
fn is_iso_timestamp(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() < 4 || !bytes[..4].iter().all(u8::is_ascii_digit) {
        return false;
    }
    let rest = &value[4..];
    rest.is_empty() || rest.starts_with('-')
}

const LESSON_STATUS: &[&str] = &[
    "passed",
    "completed",
    "failed",
    "incomplete",
    "browsed",
    "not attempted",
];
const EXIT_12: &[&str] = &["time-out", "suspend", "logout", ""];
const INTERACTION_TYPE_12: &[&str] = &[
    "true-false",
    "choice",
    "fill-in",
    "matching",
    "performance",
    "sequencing",
    "likert",
    "numeric",
];
const RESULT_12: &[&str] = &["correct", "wrong", "unanticipated", "neutral"];

const COMPLETION_STATUS: &[&str] = &["completed", "incomplete", "not attempted", "unknown"];
const SUCCESS_STATUS: &[&str] = &["passed", "failed", "unknown"];
const EXIT_2004: &[&str] = &["time-out", "suspend", "logout", "normal", ""];
const INTERACTION_TYPE_2004: &[&str] = &[
    "true-false",
    "choice",
    "fill-in",
    "long-fill-in",
    "matching",
    "performance",
    "sequencing",
    "likert",
    "numeric",
    "other",
];
const RESULT_2004: &[&str] = &["correct", "incorrect", "unanticipated", "neutral"];

const REAL: ValueType = ValueType::Real {
    min: None,
    max: None,
};
const SCALED: ValueType = ValueType::Real {
    min: Some(-1.0),
    max: Some(1.0),
};
const UNIT: ValueType = ValueType::Real {
    min: Some(0.0),
    max: Some(1.0),
};
const NON_NEGATIVE: ValueType = ValueType::Real {
    min: Some(0.0),
    max: None,
};

const fn text(max_len: usize) -> ValueType {
    ValueType::Text { max_len }
}

use ElementDef as E;

static SCORM12_ELEMENTS: &[ElementDef] = &[
    E::read_only("cmi._version"),
    E::read_only("cmi.core._children"),
    E::read_only("cmi.core.student_id"),
    E::read_only("cmi.core.student_name"),
    E::read_write("cmi.core.lesson_location", text(255)),
    E::read_only("cmi.core.credit"),
    E::read_write(
        "cmi.core.lesson_status",
        ValueType::Vocabulary(LESSON_STATUS),
    ),
    E::read_only("cmi.core.entry"),
    E::read_only("cmi.core.score._children"),
    E::read_write("cmi.core.score.raw", REAL),
    E::read_write("cmi.core.score.min", REAL),
    E::read_write("cmi.core.score.max", REAL),
    E::read_only("cmi.core.total_time"),
    E::read_only("cmi.core.lesson_mode"),
    E::write_only("cmi.core.exit", ValueType::Vocabulary(EXIT_12)),
    E::write_only("cmi.core.session_time", ValueType::Timespan),
    E::read_write("cmi.suspend_data", text(4096)),
    E::read_only("cmi.launch_data"),
    E::read_write("cmi.comments", text(4096)),
    E::read_only("cmi.comments_from_lms"),
    E::read_only("cmi.objectives._children"),
    E::read_only("cmi.objectives._count"),
    E::read_write("cmi.objectives.n.id", text(255)),
    E::read_only("cmi.objectives.n.score._children"),
    E::read_write("cmi.objectives.n.score.raw", REAL),
    E::read_write("cmi.objectives.n.score.min", REAL),
    E::read_write("cmi.objectives.n.score.max", REAL),
    E::read_write(
        "cmi.objectives.n.status",
        ValueType::Vocabulary(LESSON_STATUS),
    ),
    E::read_only("cmi.student_data._children"),
    E::read_only("cmi.student_data.mastery_score"),
    E::read_only("cmi.student_data.max_time_allowed"),
    E::read_only("cmi.student_data.time_limit_action"),
    E::read_only("cmi.student_preference._children"),
    E::read_write(
        "cmi.student_preference.audio",
        ValueType::Integer { min: -1, max: 100 },
    ),
    E::read_write("cmi.student_preference.language", text(255)),
    E::read_write(
        "cmi.student_preference.speed",
        ValueType::Integer {
            min: -100,
            max: 100,
        },
    ),
    E::read_write(
        "cmi.student_preference.text",
        ValueType::Integer { min: -1, max: 1 },
    ),
    E::read_only("cmi.interactions._children"),
    E::read_only("cmi.interactions._count"),
    E::write_only("cmi.interactions.n.id", text(255)),
    E::read_only("cmi.interactions.n.objectives._count"),
    E::write_only("cmi.interactions.n.objectives.n.id", text(255)),
    E::write_only("cmi.interactions.n.time", ValueType::ClockTime),
    E::write_only(
        "cmi.interactions.n.type",
        ValueType::Vocabulary(INTERACTION_TYPE_12),
    ),
    E::read_only("cmi.interactions.n.correct_responses._count"),
    E::write_only("cmi.interactions.n.correct_responses.n.pattern", ValueType::Any),
    E::write_only("cmi.interactions.n.weighting", REAL),
    E::write_only("cmi.interactions.n.student_response", ValueType::Any),
    E::write_only(
        "cmi.interactions.n.result",
        ValueType::VocabularyOrReal(RESULT_12),
    ),
    E::write_only("cmi.interactions.n.latency", ValueType::Timespan),
];

static SCORM2004_ELEMENTS: &[ElementDef] = &[
    E::read_only("cmi._version"),
    E::read_only("cmi.comments_from_learner._children"),
    E::read_only("cmi.comments_from_learner._count"),
    E::read_write("cmi.comments_from_learner.n.comment", text(4000)),
    E::read_write("cmi.comments_from_learner.n.location", text(250)),
    E::read_write("cmi.comments_from_learner.n.timestamp", ValueType::Timestamp),
    E::read_only("cmi.comments_from_lms._children"),
    E::read_only("cmi.comments_from_lms._count"),
    E::read_only("cmi.comments_from_lms.n.comment"),
    E::read_only("cmi.comments_from_lms.n.location"),
    E::read_only("cmi.comments_from_lms.n.timestamp"),
    E::read_write(
        "cmi.completion_status",
        ValueType::Vocabulary(COMPLETION_STATUS),
    ),
    E::read_only("cmi.completion_threshold"),
    E::read_only("cmi.credit"),
    E::read_only("cmi.entry"),
    E::write_only("cmi.exit", ValueType::Vocabulary(EXIT_2004)),
    E::read_only("cmi.interactions._children"),
    E::read_only("cmi.interactions._count"),
    E::read_write("cmi.interactions.n.id", text(4000)),
    E::read_write(
        "cmi.interactions.n.type",
        ValueType::Vocabulary(INTERACTION_TYPE_2004),
    ),
    E::read_only("cmi.interactions.n.objectives._count"),
    E::read_write("cmi.interactions.n.objectives.n.id", text(4000)),
    E::read_write("cmi.interactions.n.timestamp", ValueType::Timestamp),
    E::read_only("cmi.interactions.n.correct_responses._count"),
    E::read_write("cmi.interactions.n.correct_responses.n.pattern", ValueType::Any),
    E::read_write("cmi.interactions.n.weighting", REAL),
    E::read_write("cmi.interactions.n.learner_response", ValueType::Any),
    E::read_write(
        "cmi.interactions.n.result",
        ValueType::VocabularyOrReal(RESULT_2004),
    ),
    E::read_write("cmi.interactions.n.latency", ValueType::Duration),
    E::read_write("cmi.interactions.n.description", text(250)),
    E::read_only("cmi.launch_data"),
    E::read_only("cmi.learner_id"),
    E::read_only("cmi.learner_name"),
    E::read_only("cmi.learner_preference._children"),
    E::read_write("cmi.learner_preference.audio_level", NON_NEGATIVE),
    E::read_write("cmi.learner_preference.language", text(250)),
    E::read_write("cmi.learner_preference.delivery_speed", NON_NEGATIVE),
    E::read_write(
        "cmi.learner_preference.audio_captioning",
        ValueType::Integer { min: -1, max: 1 },
    ),
    E::read_write("cmi.location", text(1000)),
    E::read_only("cmi.max_time_allowed"),
    E::read_only("cmi.mode"),
    E::read_only("cmi.objectives._children"),
    E::read_only("cmi.objectives._count"),
    E::read_write("cmi.objectives.n.id", text(4000)),
    E::read_only("cmi.objectives.n.score._children"),
    E::read_write("cmi.objectives.n.score.scaled", SCALED),
    E::read_write("cmi.objectives.n.score.raw", REAL),
    E::read_write("cmi.objectives.n.score.min", REAL),
    E::read_write("cmi.objectives.n.score.max", REAL),
    E::read_write(
        "cmi.objectives.n.success_status",
        ValueType::Vocabulary(SUCCESS_STATUS),
    ),
    E::read_write(
        "cmi.objectives.n.completion_status",
        ValueType::Vocabulary(COMPLETION_STATUS),
    ),
    E::read_write("cmi.objectives.n.progress_measure", UNIT),
    E::read_write("cmi.objectives.n.description", text(250)),
    E::read_write("cmi.progress_measure", UNIT),
    E::read_only("cmi.scaled_passing_score"),
    E::read_only("cmi.score._children"),
    E::read_write("cmi.score.scaled", SCALED),
    E::read_write("cmi.score.raw", REAL),
    E::read_write("cmi.score.min", REAL),
    E::read_write("cmi.score.max", REAL),
    E::write_only("cmi.session_time", ValueType::Duration),
    E::read_write("cmi.success_status", ValueType::Vocabulary(SUCCESS_STATUS)),
    E::read_write("cmi.suspend_data", text(64000)),
    E::read_only("cmi.time_limit_action"),
    E::read_only("cmi.total_time"),
    E::read_write("adl.nav.request", ValueType::Any),
];
