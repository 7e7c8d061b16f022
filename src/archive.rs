//! Backup archive document
//!
//! An archive is one JSON object mapping device paths to raw file contents,
//! pretty-printed so it can be read and edited by hand. Key order is kept as
//! written, which is also the order a restore replays it in.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::DeviceError;

/// File name offered for a freshly made backup
pub const DEFAULT_ARCHIVE_NAME: &str = "Backup.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveDocument {
    entries: IndexMap<String, String>,
}

impl ArchiveDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the content stored for `path`
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.entries.insert(path.into(), contents.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in archive key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serializes the archive as a two-space indented JSON object
    pub fn to_json_pretty(&self) -> Result<String, DeviceError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Parses an archive
    ///
    /// # Errors
    /// `MalformedArchive` if `json` is not an object whose values are all strings
    pub fn from_json(json: &str) -> Result<Self, DeviceError> {
        serde_json::from_str(json).map_err(|e| DeviceError::MalformedArchive(e.to_string()))
    }

    /// Writes the archive to `path`
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), DeviceError> {
        tokio::fs::write(path, self.to_json_pretty()?).await?;
        Ok(())
    }

    /// Reads and parses an archive from `path`
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ArchiveDocument {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
