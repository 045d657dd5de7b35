//! Manifest handlers - parse and generate `imsmanifest.xml`.

use crate::error::{AppError, Result};
use scorm_engine::{Manifest, ScormVersion};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for manifest generation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub manifest: Manifest,
    /// Target version; the server default when absent
    #[serde(default)]
    pub version: Option<ScormVersion>,
}

/// A generated manifest document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedManifest {
    pub identifier: String,
    pub version: ScormVersion,
    pub xml: String,
}

/// Parse a manifest document into its JSON model.
pub fn handle_parse(xml: &str) -> Result<Manifest> {
    if xml.trim().is_empty() {
        return Err(AppError::BadRequest("Manifest body is empty".to_string()));
    }
    let manifest = Manifest::from_xml(xml)?;
    tracing::debug!(
        manifest = %manifest.identifier,
        organizations = manifest.organizations.len(),
        resources = manifest.resources.len(),
        "Parsed manifest"
    );
    Ok(manifest)
}

/// Write a manifest model out as XML for the requested version.
///
/// A manifest without an identifier is given a fresh one.
pub fn handle_generate(
    request: GenerateRequest,
    default_version: ScormVersion,
) -> Result<GeneratedManifest> {
    let mut manifest = request.manifest;
    if manifest.organizations.is_empty() {
        return Err(AppError::BadRequest(
            "Manifest needs at least one organization".to_string(),
        ));
    }
    if manifest.identifier.trim().is_empty() {
        manifest.identifier = format!("MANIFEST-{}", Uuid::new_v4());
    }

    let version = request.version.unwrap_or(default_version);
    let xml = manifest.to_xml(version);
    tracing::info!(manifest = %manifest.identifier, %version, "Generated manifest");

    Ok(GeneratedManifest {
        identifier: manifest.identifier,
        version,
        xml,
    })
}
