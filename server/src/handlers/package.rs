//! Package validation handler.

use crate::error::Result;
use scorm_engine::{
    validate_manifest, Archive, Manifest, MemoryArchive, ValidationReport, MANIFEST_FILE,
};
use serde::{Deserialize, Serialize};

/// Request body for package validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    /// `imsmanifest.xml` contents
    pub manifest: String,
    /// Paths present in the archive
    #[serde(default)]
    pub files: Vec<String>,
}

/// Response for package validation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(flatten)]
    pub report: ValidationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_href: Option<String>,
}

/// Cross-check a manifest against the listed archive paths.
pub fn handle_validate(request: ValidateRequest) -> Result<ValidateResponse> {
    let manifest = Manifest::from_xml(&request.manifest)?;

    let mut archive = MemoryArchive::from_paths(&request.files);
    if !archive.contains(MANIFEST_FILE) {
        archive.insert(MANIFEST_FILE, request.manifest.into_bytes());
    }

    let report = validate_manifest(&manifest, &archive);
    tracing::info!(
        manifest = %manifest.identifier,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "Validated package"
    );

    Ok(ValidateResponse {
        valid: report.is_valid(),
        launch_href: manifest.launch_href().map(str::to_string),
        report,
    })
}
