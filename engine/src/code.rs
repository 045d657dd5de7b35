//! SCORM runtime error codes.
//!
//! The numeric values are shared by SCORM 1.2 and the subset of SCORM 2004
//! codes this engine raises itself. Codes reported by an LMS that fall outside
//! that set are carried verbatim in [`ErrorCode::Host`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The error taxonomy exchanged with the LMS.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum ErrorCode {
    #[error("No error")]
    NoError,
    #[error("General exception")]
    GeneralException,
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("Element cannot have children")]
    ElementCannotHaveChildren,
    #[error("Element is not an array")]
    ElementNotAnArray,
    #[error("Not initialized")]
    NotInitialized,
    #[error("Not implemented")]
    NotImplemented,
    #[error("Invalid set value")]
    InvalidSetValue,
    #[error("Element is read only")]
    ElementIsReadOnly,
    #[error("Element is write only")]
    ElementIsWriteOnly,
    #[error("Incorrect data type")]
    IncorrectDataType,
    /// Any other code reported by the host.
    #[error("Unknown error")]
    Host(u16),
}

impl ErrorCode {
    /// Numeric value as sent over the wire.
    pub fn code(self) -> u16 {
        match self {
            ErrorCode::NoError => 0,
            ErrorCode::GeneralException => 101,
            ErrorCode::InvalidArgument => 201,
            ErrorCode::ElementCannotHaveChildren => 202,
            ErrorCode::ElementNotAnArray => 203,
            ErrorCode::NotInitialized => 301,
            ErrorCode::NotImplemented => 401,
            ErrorCode::InvalidSetValue => 402,
            ErrorCode::ElementIsReadOnly => 403,
            ErrorCode::ElementIsWriteOnly => 404,
            ErrorCode::IncorrectDataType => 405,
            ErrorCode::Host(code) => code,
        }
    }

    /// Parse the string form returned by `GetLastError`.
    ///
    /// An empty reply is treated as "no error"; anything that is not an
    /// integer becomes a general exception.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return ErrorCode::NoError;
        }
        raw.parse::<u16>()
            .map(ErrorCode::from)
            .unwrap_or(ErrorCode::GeneralException)
    }

    pub fn is_error(self) -> bool {
        self != ErrorCode::NoError
    }
}

impl From<u16> for ErrorCode {
    fn from(code: u16) -> Self {
        match code {
            0 => ErrorCode::NoError,
            101 => ErrorCode::GeneralException,
            201 => ErrorCode::InvalidArgument,
            202 => ErrorCode::ElementCannotHaveChildren,
            203 => ErrorCode::ElementNotAnArray,
            301 => ErrorCode::NotInitialized,
            401 => ErrorCode::NotImplemented,
            402 => ErrorCode::InvalidSetValue,
            403 => ErrorCode::ElementIsReadOnly,
            404 => ErrorCode::ElementIsWriteOnly,
            405 => ErrorCode::IncorrectDataType,
            other => ErrorCode::Host(other),
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_both_ways() {
        for code in [0u16, 101, 201, 202, 203, 301, 401, 402, 403, 404, 405] {
            assert_eq!(ErrorCode::from(code).code(), code);
            assert!(!matches!(ErrorCode::from(code), ErrorCode::Host(_)));
        }
        assert_eq!(ErrorCode::from(351), ErrorCode::Host(351));
        assert_eq!(ErrorCode::Host(351).code(), 351);
    }

    #[test]
    fn parse_host_reply() {
        assert_eq!(ErrorCode::parse("0"), ErrorCode::NoError);
        assert_eq!(ErrorCode::parse(""), ErrorCode::NoError);
        assert_eq!(ErrorCode::parse(" 301 "), ErrorCode::NotInitialized);
        assert_eq!(ErrorCode::parse("oops"), ErrorCode::GeneralException);
    }

    #[test]
    fn display_matches_scorm_strings() {
        assert_eq!(ErrorCode::NoError.to_string(), "No error");
        assert_eq!(ErrorCode::InvalidSetValue.to_string(), "Invalid set value");
        assert_eq!(ErrorCode::Host(999).to_string(), "Unknown error");
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&ErrorCode::ElementIsWriteOnly).unwrap();
        assert_eq!(json, "404");
        let parsed: ErrorCode = serde_json::from_str("201").unwrap();
        assert_eq!(parsed, ErrorCode::InvalidArgument);
    }
}
