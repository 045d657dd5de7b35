//! The LMS side of the runtime API.
//!
//! An LMS publishes an API object whose methods take and return strings (and
//! native booleans under SCORM 2004). [`LmsApi`] models that object as a
//! single dynamic entry point so that the adapter stays data-driven: the
//! version profile picks the method name, the host answers.

use crate::{
    schema::{count_indices, DataModelSchema},
    version::BoolEncoding,
    ErrorCode, ScormVersion,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

/// A value returned by a host method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Text(String),
    Bool(bool),
}

impl HostValue {
    /// String view of the reply. Booleans become `"true"` / `"false"`.
    pub fn into_text(self) -> String {
        match self {
            HostValue::Text(s) => s,
            HostValue::Bool(b) => b.to_string(),
        }
    }

    /// Whether the reply signals success, accepting either encoding.
    pub fn is_true(&self) -> bool {
        match self {
            HostValue::Text(s) => s.trim() == "true",
            HostValue::Bool(b) => *b,
        }
    }

    /// Encode a boolean the way a host of the given version would.
    pub fn boolean(value: bool, encoding: BoolEncoding) -> Self {
        match encoding {
            BoolEncoding::Text => HostValue::Text(value.to_string()),
            BoolEncoding::Native => HostValue::Bool(value),
        }
    }
}

/// An exception raised by the host while handling a call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("host fault in {method}: {message}")]
pub struct HostFault {
    pub method: String,
    pub message: String,
}

impl HostFault {
    pub fn new(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            message: message.into(),
        }
    }
}

/// An LMS API object.
pub trait LmsApi {
    /// Invoke `method` (e.g. `LMSGetValue` or `GetValue`) with string arguments.
    fn call(&mut self, method: &str, args: &[&str]) -> Result<HostValue, HostFault>;
}

/// Shared handle to a host API, as found in a browsing context.
pub type HostRef = Rc<RefCell<dyn LmsApi>>;

/// Wrap a concrete host into a [`HostRef`].
pub fn host_ref<H: LmsApi + 'static>(host: H) -> (Rc<RefCell<H>>, HostRef) {
    let concrete = Rc::new(RefCell::new(host));
    let erased: HostRef = concrete.clone();
    (concrete, erased)
}

/// An in-memory LMS for previews and tests.
///
/// It speaks either version, validates against the same data-model tables the
/// adapter uses, and reports failures through its own `GetLastError`.
#[derive(Debug, Clone)]
pub struct MockLms {
    version: ScormVersion,
    schema: DataModelSchema,
    data: BTreeMap<String, String>,
    initialized: bool,
    terminated: bool,
    last_error: ErrorCode,
    commits: usize,
    faults: HashSet<String>,
    refuse: HashMap<String, ErrorCode>,
}

impl MockLms {
    /// Create an LMS with no learner data.
    pub fn new(version: ScormVersion) -> Self {
        Self {
            version,
            schema: DataModelSchema::for_version(version),
            data: BTreeMap::new(),
            initialized: false,
            terminated: false,
            last_error: ErrorCode::NoError,
            commits: 0,
            faults: HashSet::new(),
            refuse: HashMap::new(),
        }
    }

    /// Create an LMS seeded with a learner and default statuses.
    pub fn seeded(version: ScormVersion) -> Self {
        let mut lms = Self::new(version);
        let seed: &[(&str, &str)] = match version {
            ScormVersion::Scorm12 => &[
                ("cmi._version", "3.4"),
                ("cmi.core.student_id", "12345"),
                ("cmi.core.student_name", "Test Student"),
                ("cmi.core.credit", "credit"),
                ("cmi.core.entry", "ab-initio"),
                ("cmi.core.lesson_mode", "normal"),
                ("cmi.core.lesson_status", "not attempted"),
                ("cmi.core.total_time", "0000:00:00"),
            ],
            ScormVersion::Scorm2004 => &[
                ("cmi._version", "1.0"),
                ("cmi.learner_id", "12345"),
                ("cmi.learner_name", "Test Student"),
                ("cmi.credit", "credit"),
                ("cmi.entry", "ab-initio"),
                ("cmi.mode", "normal"),
                ("cmi.completion_status", "unknown"),
                ("cmi.success_status", "unknown"),
                ("cmi.total_time", "PT0H0M0S"),
            ],
        };
        for (k, v) in seed {
            lms.data.insert((*k).to_string(), (*v).to_string());
        }
        lms
    }

    /// Builder-style seed of a single element, bypassing access rules.
    pub fn with_value(mut self, element: &str, value: &str) -> Self {
        self.data.insert(element.to_string(), value.to_string());
        self
    }

    /// Make every call to `method` raise a fault.
    pub fn fail_on(&mut self, method: &str) {
        self.faults.insert(method.to_string());
    }

    /// Make every call to `method` report a general exception.
    pub fn refuse(&mut self, method: &str) {
        self.refuse_with(method, ErrorCode::GeneralException);
    }

    /// Make every call to `method` fail and leave `code` for `GetLastError`.
    pub fn refuse_with(&mut self, method: &str, code: ErrorCode) {
        self.refuse.insert(method.to_string(), code);
    }

    pub fn value(&self, element: &str) -> Option<&str> {
        self.data.get(element).map(String::as_str)
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn ok(&mut self) -> HostValue {
        self.last_error = ErrorCode::NoError;
        HostValue::boolean(true, self.version.bool_encoding())
    }

    fn fail(&mut self, code: ErrorCode) -> HostValue {
        self.last_error = code;
        HostValue::boolean(false, self.version.bool_encoding())
    }

    fn get(&mut self, element: &str) -> HostValue {
        if !self.initialized {
            self.last_error = ErrorCode::NotInitialized;
            return HostValue::Text(String::new());
        }
        if let Some(prefix) = element.strip_suffix("._count") {
            self.last_error = ErrorCode::NoError;
            return HostValue::Text(self.count(prefix).to_string());
        }
        match self.schema.check_get(element) {
            Ok(_) => {
                self.last_error = ErrorCode::NoError;
                let value = self
                    .data
                    .get(element)
                    .cloned()
                    .or_else(|| self.schema.keyword_value(element))
                    .unwrap_or_default();
                HostValue::Text(value)
            }
            Err(code) => {
                self.last_error = code;
                HostValue::Text(String::new())
            }
        }
    }

    fn set(&mut self, element: &str, value: &str) -> HostValue {
        if !self.initialized {
            return self.fail(ErrorCode::NotInitialized);
        }
        match self.schema.lookup(element) {
            None => self.fail(ErrorCode::InvalidArgument),
            Some(def) if !def.access.writable() => self.fail(ErrorCode::ElementIsReadOnly),
            Some(def) if !def.value.accepts(value) => self.fail(ErrorCode::IncorrectDataType),
            Some(_) => {
                self.data.insert(element.to_string(), value.to_string());
                self.ok()
            }
        }
    }

    fn count(&self, prefix: &str) -> usize {
        count_indices(prefix, self.data.keys().map(String::as_str))
    }
}

impl LmsApi for MockLms {
    fn call(&mut self, method: &str, args: &[&str]) -> Result<HostValue, HostFault> {
        if self.faults.contains(method) {
            return Err(HostFault::new(method, "injected fault"));
        }
        let base = match self.version {
            ScormVersion::Scorm12 => method.strip_prefix("LMS"),
            ScormVersion::Scorm2004 => Some(method),
        }
        .ok_or_else(|| HostFault::new(method, "is not a function"))?;

        if let Some(&code) = self.refuse.get(method) {
            return Ok(self.fail(code));
        }

        let arg = |i: usize| args.get(i).copied().unwrap_or("");
        let reply = match (self.version, base) {
            (_, "Initialize") => {
                if self.initialized || self.terminated {
                    self.fail(ErrorCode::GeneralException)
                } else {
                    self.initialized = true;
                    self.ok()
                }
            }
            (ScormVersion::Scorm12, "Finish") | (ScormVersion::Scorm2004, "Terminate") => {
                if !self.initialized {
                    self.fail(ErrorCode::NotInitialized)
                } else {
                    self.initialized = false;
                    self.terminated = true;
                    self.ok()
                }
            }
            (_, "GetValue") => self.get(arg(0)),
            (_, "SetValue") => self.set(arg(0), arg(1)),
            (_, "Commit") => {
                if !self.initialized {
                    self.fail(ErrorCode::NotInitialized)
                } else {
                    self.commits += 1;
                    self.ok()
                }
            }
            (_, "GetLastError") => HostValue::Text(self.last_error.code().to_string()),
            (_, "GetErrorString") | (_, "GetDiagnostic") => {
                let code = ErrorCode::parse(arg(0));
                HostValue::Text(code.to_string())
            }
            _ => return Err(HostFault::new(method, "is not a function")),
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_error(lms: &mut MockLms, prefix: &str) -> String {
        lms.call(&format!("{prefix}GetLastError"), &[])
            .unwrap()
            .into_text()
    }

    #[test]
    fn scorm12_replies_with_text_booleans() {
        let mut lms = MockLms::seeded(ScormVersion::Scorm12);
        let reply = lms.call("LMSInitialize", &[""]).unwrap();
        assert_eq!(reply, HostValue::Text("true".into()));
        assert_eq!(last_error(&mut lms, "LMS"), "0");
    }

    #[test]
    fn scorm2004_replies_with_native_booleans() {
        let mut lms = MockLms::seeded(ScormVersion::Scorm2004);
        assert_eq!(lms.call("Initialize", &[""]).unwrap(), HostValue::Bool(true));
        assert_eq!(
            lms.call("Initialize", &[""]).unwrap(),
            HostValue::Bool(false)
        );
        assert_eq!(last_error(&mut lms, ""), "101");
    }

    #[test]
    fn wrong_prefix_is_a_fault() {
        let mut lms = MockLms::new(ScormVersion::Scorm12);
        assert!(lms.call("Initialize", &[""]).is_err());
    }

    #[test]
    fn mock_enforces_read_only() {
        let mut lms = MockLms::seeded(ScormVersion::Scorm12);
        lms.call("LMSInitialize", &[""]).unwrap();
        let reply = lms
            .call("LMSSetValue", &["cmi.core.student_name", "Mallory"])
            .unwrap();
        assert!(!reply.is_true());
        assert_eq!(last_error(&mut lms, "LMS"), "403");
        assert_eq!(lms.value("cmi.core.student_name"), Some("Test Student"));
    }

    #[test]
    fn mock_counts_array_members() {
        let mut lms = MockLms::new(ScormVersion::Scorm2004);
        lms.call("Initialize", &[""]).unwrap();
        lms.call("SetValue", &["cmi.objectives.0.id", "obj-a"]).unwrap();
        lms.call("SetValue", &["cmi.objectives.1.id", "obj-b"]).unwrap();
        lms.call("SetValue", &["cmi.objectives.1.success_status", "passed"])
            .unwrap();
        let count = lms
            .call("GetValue", &["cmi.objectives._count"])
            .unwrap()
            .into_text();
        assert_eq!(count, "2");
    }

    #[test]
    fn injected_fault_surfaces_as_error() {
        let mut lms = MockLms::new(ScormVersion::Scorm2004);
        lms.fail_on("Commit");
        let err = lms.call("Commit", &[""]).unwrap_err();
        assert_eq!(err.method, "Commit");
    }

    #[test]
    fn host_value_truthiness() {
        assert!(HostValue::Text("true".into()).is_true());
        assert!(!HostValue::Text("false".into()).is_true());
        assert!(HostValue::Bool(true).is_true());
        assert_eq!(HostValue::Bool(false).into_text(), "false");
    }
}
