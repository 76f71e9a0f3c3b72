//! # Repository File
//!
//! The shared repository file, in the package manager's `repositories.yaml`
//! schema. Only `name` and `url` are interpreted; every other field of an
//! entry is carried through untouched.

use crate::repository::RepositoryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Parsed repository file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RepositoryFile {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub generated: String,
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

/// One registered chart repository
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RepositoryEntry {
    pub name: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl RepositoryEntry {
    #[must_use]
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl RepositoryFile {
    /// Load the repository file; a missing or empty file is an empty registry
    ///
    /// # Errors
    ///
    /// Returns `Io` on read failures other than not-found, `Parse` on invalid YAML.
    pub fn load(path: &Path) -> Result<Self, RepositoryError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(RepositoryError::io(path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| RepositoryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether a repository with this name is registered
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.repositories.iter().any(|r| r.name == name)
    }

    /// Look up a repository by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RepositoryEntry> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Insert or replace an entry by name
    pub fn update(&mut self, entry: RepositoryEntry) {
        match self.repositories.iter_mut().find(|r| r.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.repositories.push(entry),
        }
    }

    /// Write the file atomically: temp file in the same directory, then rename
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory, temp file, or rename fails.
    pub fn write_atomic(&mut self, path: &Path) -> Result<(), RepositoryError> {
        self.generated = chrono::Utc::now().to_rfc3339();
        let yaml = serde_yaml::to_string(&*self).map_err(|source| RepositoryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, yaml.as_bytes())
    }
}

/// Replace `path` with `contents` so readers never observe a partial write
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), RepositoryError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| RepositoryError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RepositoryError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| RepositoryError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| RepositoryError::io(path, e.error))?;
    Ok(())
}
