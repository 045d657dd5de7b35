//! Content packages: an archive plus its manifest.
//!
//! The archive itself is an opaque named-file store behind [`Archive`]; zip
//! handling lives with whoever produces the bytes. Validation cross-checks
//! the manifest's references against the archive's file index.

use crate::{
    manifest::{Item, Manifest, Organization, Resource},
    Error, Result, ScormVersion,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{error, info, warn};

/// Manifest location at the archive root.
pub const MANIFEST_FILE: &str = "imsmanifest.xml";

/// Read access to the files of a package.
pub trait Archive {
    fn contains(&self, path: &str) -> bool;
    fn read(&self, path: &str) -> Option<&[u8]>;
    /// All file paths, sorted.
    fn paths(&self) -> Vec<&str>;
}

/// Normalize an archive path: forward slashes, no leading `./` or `/`.
pub fn normalize_archive_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut rest = path.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryArchive {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// A file index with empty contents, e.g. from a zip directory listing.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut archive = Self::new();
        for path in paths {
            archive.insert(path.as_ref(), Vec::new());
        }
        archive
    }

    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files.insert(normalize_archive_path(path), contents.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Archive for MemoryArchive {
    fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_archive_path(path))
    }

    fn read(&self, path: &str) -> Option<&[u8]> {
        self.files
            .get(&normalize_archive_path(path))
            .map(Vec::as_slice)
    }

    fn paths(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }
}

/// Outcome of validating a manifest against an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: String) {
        error!("{message}");
        self.errors.push(message);
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Check a manifest's structure and references against `archive`.
///
/// Missing organizations or resources end validation immediately. Item
/// references to undeclared resources and duplicate resource identifiers are
/// errors. Missing files and unresolved dependencies are warnings only.
pub fn validate_manifest(manifest: &Manifest, archive: &dyn Archive) -> ValidationReport {
    info!(manifest = %manifest.identifier, "Validating SCORM package");
    let mut report = ValidationReport::default();

    if manifest.organizations.is_empty() {
        report.error("No organizations found in manifest".to_string());
        return report;
    }
    if manifest.resources.is_empty() {
        report.error("No resources found in manifest".to_string());
        return report;
    }

    let mut declared = HashSet::new();
    for resource in &manifest.resources {
        if !declared.insert(resource.identifier.as_str()) {
            report.error(format!("Duplicate resource identifier: {}", resource.identifier));
        }
    }

    if let Some(default) = manifest.default_organization.as_deref() {
        if !manifest.organizations.iter().any(|o| o.identifier == default) {
            report.warn(format!("Default organization not found: {default}"));
        }
    }

    for item in manifest.items() {
        if let Some(resource) = item.resource_identifier.as_deref() {
            if !declared.contains(resource) {
                report.error(format!("Resource not found: {resource}"));
            }
        }
    }

    for resource in &manifest.resources {
        for dependency in &resource.dependencies {
            if !declared.contains(dependency.as_str()) {
                report.warn(format!(
                    "Dependency not found: {dependency} (resource {})",
                    resource.identifier
                ));
            }
        }
        for file in &resource.files {
            if !archive.contains(file) {
                report.warn(format!("File not found in package: {file}"));
            }
        }
        if let Some(href) = resource.href.as_deref() {
            let launch = href.split(['?', '#']).next().unwrap_or(href);
            if !resource.files.iter().any(|f| f == launch) && !archive.contains(launch) {
                report.warn(format!("Launch file not found in package: {launch}"));
            }
        }
    }

    if report.is_valid() {
        info!(warnings = report.warnings.len(), "SCORM package validation successful");
    }
    report
}

/// Pass/fail form of [`validate_manifest`].
pub fn validate_package(manifest: &Manifest, archive: &dyn Archive) -> bool {
    validate_manifest(manifest, archive).is_valid()
}

/// A loaded package.
#[derive(Debug, Clone)]
pub struct Package<A: Archive = MemoryArchive> {
    manifest: Manifest,
    archive: A,
}

impl<A: Archive> Package<A> {
    /// Locate and parse the manifest. Failures are logged and yield `None`.
    pub fn load(archive: A) -> Option<Self> {
        info!("Loading SCORM package");
        let Some(bytes) = archive.read(MANIFEST_FILE) else {
            error!("No {MANIFEST_FILE} found in package");
            return None;
        };
        let xml = match std::str::from_utf8(bytes) {
            Ok(xml) => xml,
            Err(e) => {
                error!(error = %e, "Manifest is not valid UTF-8");
                return None;
            }
        };
        match Manifest::from_xml(xml) {
            Ok(manifest) => {
                info!(manifest = %manifest.identifier, "SCORM package loaded");
                Some(Self { manifest, archive })
            }
            Err(e) => {
                error!(error = %e, "Failed to parse manifest");
                None
            }
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn into_parts(self) -> (Manifest, A) {
        (self.manifest, self.archive)
    }

    pub fn validate(&self) -> ValidationReport {
        validate_manifest(&self.manifest, &self.archive)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_valid()
    }

    pub fn launch_href(&self) -> Option<&str> {
        self.manifest.launch_href()
    }
}

/// Assembles a single-SCO package with a generated manifest.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    identifier: String,
    title: String,
    version: ScormVersion,
    launch: Option<String>,
    mastery_score: Option<u32>,
    files: MemoryArchive,
}

impl PackageBuilder {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>, version: ScormVersion) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            version,
            launch: None,
            mastery_score: None,
            files: MemoryArchive::new(),
        }
    }

    pub fn file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path, contents);
        self
    }

    /// Entry point of the SCO. Defaults to `index.html`.
    pub fn launch(mut self, path: &str) -> Self {
        self.launch = Some(normalize_archive_path(path));
        self
    }

    /// Pass mark written to the item (SCORM 1.2 only).
    pub fn mastery_score(mut self, score: u32) -> Self {
        self.mastery_score = Some(score);
        self
    }

    /// The manifest describing the files added so far.
    pub fn manifest(&self) -> Manifest {
        let launch = self.launch.clone().unwrap_or_else(|| "index.html".to_string());
        let org_id = format!("{}-ORG", self.identifier);
        let resource_id = format!("{}-RES", self.identifier);

        let mut item = Item::leaf(format!("{}-ITEM", self.identifier), &self.title, &resource_id);
        item.mastery_score = self.mastery_score.map(|s| s.to_string());

        Manifest {
            identifier: self.identifier.clone(),
            version: "1.0".to_string(),
            metadata: Default::default(),
            default_organization: Some(org_id.clone()),
            organizations: vec![Organization {
                identifier: org_id,
                title: self.title.clone(),
                items: vec![item],
            }],
            resources: vec![Resource {
                identifier: resource_id,
                kind: "webcontent".to_string(),
                href: Some(launch),
                scorm_type: Some("sco".to_string()),
                files: self
                    .files
                    .paths()
                    .into_iter()
                    .filter(|p| *p != MANIFEST_FILE)
                    .map(str::to_string)
                    .collect(),
                dependencies: Vec::new(),
            }],
        }
    }

    /// Write the manifest into the archive and validate the result.
    pub fn build(self) -> Result<Package<MemoryArchive>> {
        let manifest = self.manifest();
        if let Some(launch) = manifest.launch_href() {
            if !self.files.contains(launch) {
                return Err(Error::MissingArchiveFile(launch.to_string()));
            }
        }

        let report = validate_manifest(&manifest, &self.files);
        if !report.is_valid() {
            return Err(Error::InvalidManifest(report.errors.join("; ")));
        }

        let mut archive = self.files;
        archive.insert(MANIFEST_FILE, manifest.to_xml(self.version));
        Ok(Package { manifest, archive })
    }
}
