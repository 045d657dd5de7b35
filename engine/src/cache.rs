//! Local key-value store used when no LMS is reachable.
//!
//! Writes are staged in memory and become durable on `commit`. A store that
//! is reopened after a commit sees the committed values.

use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// File name used by [`FileCache`] unless a prefix is given.
pub const DEFAULT_CACHE_FILE: &str = "scorm_data.json";

pub trait CacheStore {
    /// Staged value for `key`, or an empty string.
    fn get_value(&self, key: &str) -> String;
    fn set_value(&mut self, key: &str, value: &str) -> Result<()>;
    /// Every key holding a staged value.
    fn keys(&self) -> Vec<String>;
    /// Make staged values durable.
    fn commit(&mut self) -> Result<()>;
    /// Drop all values, staged and durable.
    fn clear(&mut self) -> Result<()>;
}

/// Cache whose durable layer is shared between reopened instances.
///
/// Useful for previews and tests: [`MemoryCache::reopen`] behaves like
/// reloading the page against the same browser storage.
#[derive(Debug, Default)]
pub struct MemoryCache {
    staged: BTreeMap<String, String>,
    durable: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh instance over the same durable storage.
    pub fn reopen(&self) -> Self {
        Self {
            staged: self.durable.borrow().clone(),
            durable: Rc::clone(&self.durable),
        }
    }

    /// Committed value for `key`, ignoring anything staged.
    pub fn durable_value(&self, key: &str) -> Option<String> {
        self.durable.borrow().get(key).cloned()
    }
}

impl CacheStore for MemoryCache {
    fn get_value(&self, key: &str) -> String {
        self.staged.get(key).cloned().unwrap_or_default()
    }

    fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        self.staged.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.staged.keys().cloned().collect()
    }

    fn commit(&mut self) -> Result<()> {
        *self.durable.borrow_mut() = self.staged.clone();
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.staged.clear();
        self.durable.borrow_mut().clear();
        Ok(())
    }
}

/// Cache persisted as a JSON object on disk.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    data: BTreeMap<String, String>,
    dirty: bool,
}

impl FileCache {
    /// Open `dir/{prefix}data.json`, loading any existing contents.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is logged
    /// and also starts empty.
    pub fn open(dir: impl AsRef<Path>, prefix: &str) -> Self {
        let file_name = if prefix.is_empty() {
            DEFAULT_CACHE_FILE.to_string()
        } else {
            format!("{prefix}data.json")
        };
        let path = dir.as_ref().join(file_name);
        let data = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Discarding corrupt SCORM cache");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read SCORM cache");
                BTreeMap::new()
            }
        };
        Self {
            path,
            data,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn persist(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| Error::Cache(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| Error::Cache(e.to_string()))?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.data.len(), "SCORM cache written");
        Ok(())
    }
}

impl CacheStore for FileCache {
    fn get_value(&self, key: &str) -> String {
        self.data.get(key).cloned().unwrap_or_default()
    }

    fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        self.data.insert(key.to_string(), value.to_string());
        self.dirty = true;
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    fn commit(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.persist()
    }

    fn clear(&mut self) -> Result<()> {
        self.data.clear();
        self.persist()
    }
}
