//! C ABI for non-Rust hosts.
//!
//! Authoring tools and native shells call these functions directly. All
//! structured data crosses the boundary as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `scorm_*` functions are allocated by Rust
//! - Caller must free them with `scorm_string_free`
//! - Engine pointers must be freed with `scorm_engine_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{
    cache::FileCache,
    discovery::Standalone,
    manifest::Manifest,
    package::{validate_manifest, MemoryArchive},
    quiz::{Answer, QuizConfig},
    runtime::{EngineConfig, ScormEngine},
    QuestionId, ScormVersion,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::{c_char, CStr, CString};
use std::ptr;

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

fn error_json(message: impl Into<String>) -> *mut c_char {
    to_c_string(FfiResult::<()>::err(message).to_json())
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `scorm_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .map(CString::into_raw)
            .unwrap_or(ptr::null_mut()),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `scorm_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn scorm_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Crate version as a plain (non-JSON) string.
///
/// # Safety
/// Caller must free the returned string with `scorm_string_free`.
#[no_mangle]
pub unsafe extern "C" fn scorm_version() -> *mut c_char {
    to_c_string(env!("CARGO_PKG_VERSION").to_string())
}

// ============================================================================
// Manifests and packages
// ============================================================================

/// Parse manifest XML.
///
/// # Returns
/// JSON string: `{"ok": Manifest}` or `{"error": "message"}`
///
/// # Safety
/// - `xml` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `scorm_string_free`
#[no_mangle]
pub unsafe extern "C" fn scorm_manifest_parse(xml: *const c_char) -> *mut c_char {
    let Some(xml) = from_c_string(xml) else {
        return error_json("invalid manifest string");
    };
    match Manifest::from_xml(&xml) {
        Ok(manifest) => to_c_string(FfiResult::ok(manifest).to_json()),
        Err(e) => error_json(e.to_string()),
    }
}

/// Generate manifest XML from manifest JSON.
///
/// # Arguments
/// - `version`: `"1.2"` or `"2004"`; null means 1.2
///
/// # Returns
/// JSON string: `{"ok": "<xml>"}` or `{"error": "message"}`
///
/// # Safety
/// - `manifest_json` and `version` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `scorm_string_free`
#[no_mangle]
pub unsafe extern "C" fn scorm_manifest_generate(
    manifest_json: *const c_char,
    version: *const c_char,
) -> *mut c_char {
    let Some(json) = from_c_string(manifest_json) else {
        return error_json("invalid manifest JSON");
    };
    let version = match from_c_string(version) {
        None => ScormVersion::default(),
        Some(v) => match v.parse::<ScormVersion>() {
            Ok(v) => v,
            Err(e) => return error_json(e),
        },
    };
    match serde_json::from_str::<Manifest>(&json) {
        Ok(manifest) => to_c_string(FfiResult::ok(manifest.to_xml(version)).to_json()),
        Err(e) => error_json(format!("parse error: {}", e)),
    }
}

/// Validate manifest XML against a file listing.
///
/// # Arguments
/// - `files_json`: JSON array of archive paths
///
/// # Returns
/// JSON string: `{"ok": ValidationReport}` or `{"error": "message"}`
///
/// # Safety
/// - `manifest_xml` and `files_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `scorm_string_free`
#[no_mangle]
pub unsafe extern "C" fn scorm_package_validate(
    manifest_xml: *const c_char,
    files_json: *const c_char,
) -> *mut c_char {
    let Some(xml) = from_c_string(manifest_xml) else {
        return error_json("invalid manifest string");
    };
    let Some(files) = from_c_string(files_json) else {
        return error_json("invalid file list");
    };
    let files: Vec<String> = match serde_json::from_str(&files) {
        Ok(f) => f,
        Err(e) => return error_json(format!("parse error: {}", e)),
    };
    let manifest = match Manifest::from_xml(&xml) {
        Ok(m) => m,
        Err(e) => return error_json(e.to_string()),
    };
    let archive = MemoryArchive::from_paths(files);
    to_c_string(FfiResult::ok(validate_manifest(&manifest, &archive)).to_json())
}

// ============================================================================
// Quiz scoring
// ============================================================================

#[derive(Deserialize)]
struct ScoreRequest {
    quiz: QuizConfig,
    answers: BTreeMap<QuestionId, Answer>,
}

/// Score a set of answers.
///
/// # Arguments
/// - `request_json`: `{"quiz": QuizConfig, "answers": {questionId: answer}}`
///
/// # Returns
/// JSON string: `{"ok": ScoreOutcome}` or `{"error": "message"}`
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `scorm_string_free`
#[no_mangle]
pub unsafe extern "C" fn scorm_quiz_score(request_json: *const c_char) -> *mut c_char {
    let Some(json) = from_c_string(request_json) else {
        return error_json("invalid request JSON");
    };
    match serde_json::from_str::<ScoreRequest>(&json) {
        Ok(req) => to_c_string(FfiResult::ok(req.quiz.score(&req.answers)).to_json()),
        Err(e) => error_json(format!("parse error: {}", e)),
    }
}

// ============================================================================
// Offline runtime sessions
// ============================================================================

/// Create an engine that always runs from a file cache in `cache_dir`.
///
/// # Returns
/// Pointer to the engine, or null on failure.
///
/// # Safety
/// - `config_json` and `cache_dir` must be valid null-terminated C strings or null
/// - Caller must free the returned pointer with `scorm_engine_free`
#[no_mangle]
pub unsafe extern "C" fn scorm_engine_new(
    config_json: *const c_char,
    cache_dir: *const c_char,
) -> *mut ScormEngine {
    let config = match from_c_string(config_json) {
        Some(json) => match serde_json::from_str::<EngineConfig>(&json) {
            Ok(c) => c,
            Err(_) => return ptr::null_mut(),
        },
        None => EngineConfig::default(),
    };
    let Some(dir) = from_c_string(cache_dir) else {
        return ptr::null_mut();
    };
    let cache = FileCache::open(dir, "");
    Box::into_raw(Box::new(ScormEngine::new(config, Standalone, cache)))
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer from `scorm_engine_new`
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn scorm_engine_free(engine: *mut ScormEngine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Start a session.
///
/// # Returns
/// 1 on success, 0 on a null pointer.
///
/// # Safety
/// - `engine` must be a valid pointer from `scorm_engine_new` or null
#[no_mangle]
pub unsafe extern "C" fn scorm_engine_initialize(engine: *mut ScormEngine, now: u64) -> i32 {
    match engine.as_mut() {
        Some(e) => i32::from(e.initialize(now)),
        None => 0,
    }
}

/// End a session, committing the cache.
///
/// # Safety
/// - `engine` must be a valid pointer from `scorm_engine_new` or null
#[no_mangle]
pub unsafe extern "C" fn scorm_engine_terminate(engine: *mut ScormEngine) -> i32 {
    match engine.as_mut() {
        Some(e) => i32::from(e.terminate()),
        None => 0,
    }
}

/// Read a data-model element.
///
/// # Returns
/// JSON string: `{"ok": "value"}` or `{"error": "<code>"}`
///
/// # Safety
/// - `engine` must be a valid pointer from `scorm_engine_new` or null
/// - `element` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `scorm_string_free`
#[no_mangle]
pub unsafe extern "C" fn scorm_engine_get_value(
    engine: *mut ScormEngine,
    element: *const c_char,
) -> *mut c_char {
    let Some(engine) = engine.as_mut() else {
        return error_json("null engine pointer");
    };
    let Some(element) = from_c_string(element) else {
        return error_json("invalid element");
    };
    match engine.get_value(&element) {
        Ok(value) => to_c_string(FfiResult::ok(value).to_json()),
        Err(code) => error_json(code.code().to_string()),
    }
}

/// Write a data-model element.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "<code>"}`
///
/// # Safety
/// - `engine` must be a valid pointer from `scorm_engine_new` or null
/// - `element` and `value` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `scorm_string_free`
#[no_mangle]
pub unsafe extern "C" fn scorm_engine_set_value(
    engine: *mut ScormEngine,
    element: *const c_char,
    value: *const c_char,
) -> *mut c_char {
    let Some(engine) = engine.as_mut() else {
        return error_json("null engine pointer");
    };
    let (Some(element), Some(value)) = (from_c_string(element), from_c_string(value)) else {
        return error_json("invalid element or value");
    };
    match engine.set_value(&element, &value) {
        Ok(()) => to_c_string(FfiResult::ok(()).to_json()),
        Err(code) => error_json(code.code().to_string()),
    }
}

/// Commit pending writes.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "<code>"}`
///
/// # Safety
/// - `engine` must be a valid pointer from `scorm_engine_new` or null
/// - Caller must free the returned string with `scorm_string_free`
#[no_mangle]
pub unsafe extern "C" fn scorm_engine_commit(engine: *mut ScormEngine) -> *mut c_char {
    let Some(engine) = engine.as_mut() else {
        return error_json("null engine pointer");
    };
    match engine.commit() {
        Ok(()) => to_c_string(FfiResult::ok(()).to_json()),
        Err(code) => error_json(code.code().to_string()),
    }
}

/// Code of the most recent call, or 101 for a null pointer.
///
/// # Safety
/// - `engine` must be a valid pointer from `scorm_engine_new` or null
#[no_mangle]
pub unsafe extern "C" fn scorm_engine_last_error(engine: *const ScormEngine) -> u16 {
    match engine.as_ref() {
        Some(e) => e.get_last_error().code(),
        None => crate::ErrorCode::GeneralException.code(),
    }
}
