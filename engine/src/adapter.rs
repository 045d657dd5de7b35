//! Version-aware bridge between a SCO and its LMS.
//!
//! One [`ApiAdapter`] drives one LMS session. It enforces the session state
//! machine and validates every element access locally before the host is
//! touched. Each data call returns `Result<_, ErrorCode>` and also records the
//! outcome so that `get_last_error` mirrors the SCORM calling convention.

use crate::{
    discovery::{ApiLocator, Discovery},
    host::{HostRef, HostValue},
    schema::DataModelSchema,
    version::ApiMethod,
    ErrorCode, ScormVersion,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Result of a single runtime call.
pub type CallResult<T> = std::result::Result<T, ErrorCode>;

/// Lifecycle of an LMS session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initialized,
    Terminated,
}

pub struct ApiAdapter {
    version: ScormVersion,
    schema: DataModelSchema,
    host: Option<HostRef>,
    state: SessionState,
    last_error: ErrorCode,
}

impl ApiAdapter {
    pub fn new(version: ScormVersion) -> Self {
        Self {
            version,
            schema: DataModelSchema::for_version(version),
            host: None,
            state: SessionState::Uninitialized,
            last_error: ErrorCode::NoError,
        }
    }

    pub fn version(&self) -> ScormVersion {
        self.version
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn schema(&self) -> &DataModelSchema {
        &self.schema
    }

    pub fn is_bound(&self) -> bool {
        self.host.is_some()
    }

    /// Discover the host and open the session.
    pub fn initialize(&mut self, locator: &dyn ApiLocator) -> CallResult<()> {
        let result = self.try_initialize(locator);
        self.finish(result)
    }

    /// Close the session. No data calls are accepted afterwards.
    pub fn terminate(&mut self) -> CallResult<()> {
        let result = self.try_terminate();
        self.finish(result)
    }

    pub fn get_value(&mut self, element: &str) -> CallResult<String> {
        let result = self.try_get_value(element);
        self.finish(result)
    }

    pub fn set_value(&mut self, element: &str, value: &str) -> CallResult<()> {
        let result = self.try_set_value(element, value);
        self.finish(result)
    }

    pub fn commit(&mut self) -> CallResult<()> {
        let result = self.try_commit();
        self.finish(result)
    }

    /// Code recorded by the most recent call.
    pub fn get_last_error(&self) -> ErrorCode {
        self.last_error
    }

    pub fn get_error_string(&self, code: ErrorCode) -> String {
        code.to_string()
    }

    /// Host-supplied detail for `code`, or the standard string when the host
    /// has nothing to add. Does not change the last error.
    pub fn get_diagnostic(&self, code: ErrorCode) -> String {
        self.host
            .as_ref()
            .and_then(|host| {
                let arg = code.code().to_string();
                self.call_host(host, ApiMethod::GetDiagnostic, &[&arg]).ok()
            })
            .map(HostValue::into_text)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| code.to_string())
    }

    fn finish<T>(&mut self, result: CallResult<T>) -> CallResult<T> {
        self.last_error = match &result {
            Ok(_) => ErrorCode::NoError,
            Err(code) => *code,
        };
        result
    }

    fn try_initialize(&mut self, locator: &dyn ApiLocator) -> CallResult<()> {
        match self.state {
            SessionState::Uninitialized => {}
            SessionState::Initialized => {
                warn!("SCORM session already initialized");
                return Err(ErrorCode::GeneralException);
            }
            SessionState::Terminated => {
                warn!("SCORM session already terminated");
                return Err(ErrorCode::GeneralException);
            }
        }

        match locator.locate(self.version) {
            Discovery::Found { api, hops, via_opener } => {
                debug!(version = %self.version, hops, via_opener, "Found LMS API");
                self.host = Some(api);
            }
            Discovery::NotFound | Discovery::BoundExceeded => {
                error!(version = %self.version, api = self.version.api_name(), "LMS API not found");
                return Err(ErrorCode::GeneralException);
            }
        }

        let reply = self.invoke(ApiMethod::Initialize, &[""])?;
        if !reply.is_true() {
            return Err(ErrorCode::GeneralException);
        }
        self.state = SessionState::Initialized;
        Ok(())
    }

    fn try_terminate(&mut self) -> CallResult<()> {
        self.ensure_initialized()?;
        let reply = self.invoke(ApiMethod::Terminate, &[""])?;
        if !reply.is_true() {
            return Err(ErrorCode::GeneralException);
        }
        self.state = SessionState::Terminated;
        Ok(())
    }

    fn try_get_value(&mut self, element: &str) -> CallResult<String> {
        self.ensure_initialized()?;
        self.schema.check_get(element)?;
        let value = self.invoke(ApiMethod::GetValue, &[element])?.into_text();
        debug!(element, value = %value, "GetValue");
        Ok(value)
    }

    fn try_set_value(&mut self, element: &str, value: &str) -> CallResult<()> {
        self.ensure_initialized()?;
        self.schema.check_set(element, value)?;
        let reply = self.invoke(ApiMethod::SetValue, &[element, value])?;
        if !reply.is_true() {
            return Err(ErrorCode::GeneralException);
        }
        debug!(element, value, "SetValue");
        Ok(())
    }

    fn try_commit(&mut self) -> CallResult<()> {
        self.ensure_initialized()?;
        let reply = self.invoke(ApiMethod::Commit, &[""])?;
        if !reply.is_true() {
            return Err(ErrorCode::GeneralException);
        }
        Ok(())
    }

    fn ensure_initialized(&self) -> CallResult<()> {
        match self.state {
            SessionState::Initialized => Ok(()),
            _ => Err(ErrorCode::NotInitialized),
        }
    }

    /// Call the host and translate its error channel into a `CallResult`.
    fn invoke(&self, method: ApiMethod, args: &[&str]) -> CallResult<HostValue> {
        let host = self.host.as_ref().ok_or(ErrorCode::GeneralException)?;
        let reply = self.call_host(host, method, args)?;

        let code = self
            .call_host(host, ApiMethod::GetLastError, &[])
            .map(|v| ErrorCode::parse(&v.into_text()))
            .unwrap_or(ErrorCode::GeneralException);

        if code.is_error() {
            let arg = code.code().to_string();
            let message = self
                .call_host(host, ApiMethod::GetErrorString, &[&arg])
                .map(HostValue::into_text)
                .unwrap_or_default();
            warn!(
                method = self.version.method_name(method),
                code = code.code(),
                message = %message,
                "LMS reported an error"
            );
            return Err(code);
        }
        Ok(reply)
    }

    fn call_host(
        &self,
        host: &HostRef,
        method: ApiMethod,
        args: &[&str],
    ) -> CallResult<HostValue> {
        let name = self.version.method_name(method);
        let mut api = host.try_borrow_mut().map_err(|_| {
            error!(method = name, "LMS API is busy");
            ErrorCode::GeneralException
        })?;
        api.call(name, args).map_err(|fault| {
            error!(method = name, error = %fault, "LMS API call failed");
            ErrorCode::GeneralException
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DirectHost, Standalone};
    use crate::host::{host_ref, MockLms};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn bound(version: ScormVersion) -> (Rc<RefCell<MockLms>>, ApiAdapter) {
        let (lms, host) = host_ref(MockLms::seeded(version));
        let mut adapter = ApiAdapter::new(version);
        adapter.initialize(&DirectHost(host)).unwrap();
        (lms, adapter)
    }

    #[test]
    fn calls_before_initialize_fail() {
        let mut adapter = ApiAdapter::new(ScormVersion::Scorm12);
        assert_eq!(
            adapter.get_value("cmi.core.lesson_status"),
            Err(ErrorCode::NotInitialized)
        );
        assert_eq!(adapter.get_last_error(), ErrorCode::NotInitialized);
        assert_eq!(adapter.commit(), Err(ErrorCode::NotInitialized));
        assert_eq!(adapter.state(), SessionState::Uninitialized);
    }

    #[test]
    fn initialize_without_host_fails() {
        let mut adapter = ApiAdapter::new(ScormVersion::Scorm2004);
        assert_eq!(
            adapter.initialize(&Standalone),
            Err(ErrorCode::GeneralException)
        );
        assert!(!adapter.is_bound());
        assert_eq!(adapter.state(), SessionState::Uninitialized);
    }

    #[test]
    fn double_initialize_is_rejected() {
        let (_lms, mut adapter) = bound(ScormVersion::Scorm12);
        assert_eq!(
            adapter.initialize(&Standalone),
            Err(ErrorCode::GeneralException)
        );
        assert_eq!(adapter.state(), SessionState::Initialized);
    }

    #[test]
    fn scorm12_round_trip_through_host() {
        let (lms, mut adapter) = bound(ScormVersion::Scorm12);
        adapter
            .set_value("cmi.core.lesson_location", "page-3")
            .unwrap();
        assert_eq!(adapter.get_last_error(), ErrorCode::NoError);
        assert_eq!(
            adapter.get_value("cmi.core.lesson_location").unwrap(),
            "page-3"
        );
        assert_eq!(
            lms.borrow().value("cmi.core.lesson_location"),
            Some("page-3")
        );
    }

    #[test]
    fn read_only_set_is_rejected_locally() {
        let (lms, mut adapter) = bound(ScormVersion::Scorm12);
        assert_eq!(
            adapter.set_value("cmi.core.student_name", "Mallory"),
            Err(ErrorCode::InvalidSetValue)
        );
        assert_eq!(adapter.get_last_error(), ErrorCode::InvalidSetValue);
        assert_eq!(
            lms.borrow().value("cmi.core.student_name"),
            Some("Test Student")
        );
    }

    #[test]
    fn write_only_get_is_rejected() {
        let (_lms, mut adapter) = bound(ScormVersion::Scorm2004);
        assert_eq!(
            adapter.get_value("cmi.session_time"),
            Err(ErrorCode::ElementIsWriteOnly)
        );
    }

    #[test]
    fn unknown_element_is_invalid_argument() {
        let (_lms, mut adapter) = bound(ScormVersion::Scorm2004);
        assert_eq!(
            adapter.get_value("cmi.bogus"),
            Err(ErrorCode::InvalidArgument)
        );
        // A later success clears the error.
        adapter.get_value("cmi.learner_id").unwrap();
        assert_eq!(adapter.get_last_error(), ErrorCode::NoError);
    }

    #[test]
    fn host_error_code_is_surfaced() {
        let (lms, mut adapter) = bound(ScormVersion::Scorm2004);
        lms.borrow_mut().refuse("Commit");
        assert_eq!(adapter.commit(), Err(ErrorCode::GeneralException));
    }

    #[test]
    fn literal_wildcard_path_never_reaches_the_lms() {
        let (lms, mut adapter) = bound(ScormVersion::Scorm2004);
        assert_eq!(
            adapter.set_value("cmi.objectives.n.id", "obj"),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(adapter.get_last_error(), ErrorCode::InvalidArgument);
        assert_eq!(lms.borrow().value("cmi.objectives.n.id"), None);
    }

    #[test]
    fn host_specific_codes_are_copied() {
        let (lms, mut adapter) = bound(ScormVersion::Scorm2004);
        lms.borrow_mut()
            .refuse_with("SetValue", ErrorCode::IncorrectDataType);
        assert_eq!(
            adapter.set_value("cmi.location", "p1"),
            Err(ErrorCode::IncorrectDataType)
        );
        assert_eq!(adapter.get_last_error(), ErrorCode::IncorrectDataType);

        lms.borrow_mut().refuse_with("GetValue", ErrorCode::Host(351));
        assert_eq!(adapter.get_value("cmi.learner_id"), Err(ErrorCode::Host(351)));
        assert_eq!(adapter.get_last_error(), ErrorCode::Host(351));
        assert_eq!(adapter.get_last_error().code(), 351);
    }

    #[test]
    fn host_fault_becomes_general_exception() {
        let (lms, mut adapter) = bound(ScormVersion::Scorm12);
        lms.borrow_mut().fail_on("LMSGetValue");
        assert_eq!(
            adapter.get_value("cmi.core.lesson_location"),
            Err(ErrorCode::GeneralException)
        );
    }

    #[test]
    fn terminate_closes_the_session() {
        let (lms, mut adapter) = bound(ScormVersion::Scorm12);
        adapter.terminate().unwrap();
        assert_eq!(adapter.state(), SessionState::Terminated);
        assert!(lms.borrow().is_terminated());
        assert_eq!(
            adapter.set_value("cmi.core.lesson_location", "x"),
            Err(ErrorCode::NotInitialized)
        );
        assert_eq!(adapter.state(), SessionState::Terminated);
        assert_eq!(
            adapter.initialize(&Standalone),
            Err(ErrorCode::GeneralException)
        );
    }

    #[test]
    fn diagnostic_prefers_host_text() {
        let (_lms, adapter) = bound(ScormVersion::Scorm2004);
        assert_eq!(
            adapter.get_diagnostic(ErrorCode::InvalidArgument),
            "Invalid argument"
        );
        let unbound = ApiAdapter::new(ScormVersion::Scorm2004);
        assert_eq!(
            unbound.get_diagnostic(ErrorCode::NotInitialized),
            "Not initialized"
        );
    }
}
