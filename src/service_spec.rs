// Service description loader
// Reads the YAML description from disk, re-parsing only when its mtime changes

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use crate::error::ApiError;

/// A parsed description plus its content tag
#[derive(Debug, Clone)]
pub struct LoadedSpec {
    pub document: Value,
    pub etag: String,
    modified: SystemTime,
}

/// Top-level keys of the description
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpecIndex {
    pub keys: Vec<String>,
    pub etag: String,
}

pub struct ServiceSpec {
    path: PathBuf,
    cached: RwLock<Option<Arc<LoadedSpec>>>,
}

impl ServiceSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current description, reloaded if the file changed on disk
    pub fn load(&self) -> Result<Arc<LoadedSpec>, ApiError> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|_| {
                ApiError::NotFound(format!(
                    "service description at {}",
                    self.path.display()
                ))
            })?;

        {
            let cached = self.cached.read().unwrap_or_else(|e| e.into_inner());
            if let Some(spec) = cached.as_ref().filter(|s| s.modified == modified) {
                return Ok(spec.clone());
            }
        }

        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            ApiError::ConfigError(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let document: Value = serde_saphyr::from_str(&text).map_err(|e| {
            ApiError::ConfigError(format!("Invalid YAML in {}: {}", self.path.display(), e))
        })?;

        let spec = Arc::new(LoadedSpec {
            document,
            etag: etag(&text),
            modified,
        });
        tracing::debug!(path = %self.path.display(), etag = %spec.etag, "Loaded service description");

        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = Some(spec.clone());
        Ok(spec)
    }

    pub fn index(&self) -> Result<SpecIndex, ApiError> {
        let spec = self.load()?;
        let keys = spec
            .document
            .as_object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();
        Ok(SpecIndex {
            keys,
            etag: spec.etag.clone(),
        })
    }

    /// Value at a slash-separated path, e.g. `tools/0/name`
    pub fn section(&self, section_path: &str) -> Result<Value, ApiError> {
        let spec = self.load()?;
        lookup(&spec.document, section_path)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("section '{}'", section_path)))
    }
}

/// First 16 hex chars of the SHA-256 of `text`
pub fn etag(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut tag = hex::encode(digest);
    tag.truncate(16);
    tag
}

/// Walk object keys and array indices
pub fn lookup<'a>(root: &'a Value, section_path: &str) -> Option<&'a Value> {
    section_path
        .split('/')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .try_fold(root, |node, part| match node {
            Value::Object(map) => map.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
