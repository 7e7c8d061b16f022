//! Remote file catalog
//!
//! Issues single `/list` requests and keeps the catalog of everything those
//! listings returned. The catalog is only mutated while the request gate is
//! held, so its order is exactly the order the listings completed in.

use serde::Deserialize;
use tracing::debug;

use crate::{DeviceError, DeviceSession};

pub const LIST_ENDPOINT: &str = "/list";
pub const DELETE_ENDPOINT: &str = "/delete";

/// Kind filter of a listing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// Value of the `type` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            EntryKind::File => "0",
            EntryKind::Directory => "1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    pub path: String,
    pub kind: EntryKind,
}

/// Entries discovered on the device, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCatalog {
    entries: Vec<FileEntry>,
}

impl FileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: FileEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Paths of the file entries, in catalog order
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.of_kind(EntryKind::File)
    }

    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.of_kind(EntryKind::Directory)
    }

    fn of_kind(&self, kind: EntryKind) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |e| e.kind == kind)
            .map(|e| e.path.as_str())
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.files().any(|p| p == path)
    }

    /// Drops the file entry for `path`, returns whether one was present
    pub fn remove_file(&mut self, path: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.kind == EntryKind::File && e.path == path));
        before != self.entries.len()
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    list: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    file: String,
}

/// Listing and deletion requests against one session
#[derive(Debug, Clone, Copy)]
pub struct RemoteFileCatalog<'a> {
    session: &'a DeviceSession,
}

impl<'a> RemoteFileCatalog<'a> {
    pub fn new(session: &'a DeviceSession) -> Self {
        Self { session }
    }

    /// Lists entries of `kind` under `path`
    ///
    /// The device recurses `depth` levels below `path` on its own. Every
    /// returned entry is appended to the session catalog, in response order,
    /// before the gate is released.
    ///
    /// # Returns
    /// The entries returned by the device; empty when it reported nothing
    ///
    /// # Errors
    /// Returns `DeviceError` if the request fails or the body is not a listing
    pub async fn list(
        &self,
        path: &str,
        kind: EntryKind,
        depth: u8,
    ) -> Result<Vec<FileEntry>, DeviceError> {
        let mut permit = self.session.permit().await?;
        let res = permit
            .get(
                LIST_ENDPOINT,
                vec![
                    ("path", path.to_string()),
                    ("type", kind.as_query().to_string()),
                    ("depth", depth.to_string()),
                ],
            )
            .await?;

        // the device answers `null` instead of an empty list
        let listing: Option<ListResponse> = res.json()?;
        let entries: Vec<FileEntry> = listing
            .map(|l| l.list)
            .unwrap_or_default()
            .into_iter()
            .map(|path| FileEntry { path, kind })
            .collect();
        debug!("{path} listed {} {kind:?} entries", entries.len());

        self.session.with_catalog(|catalog| {
            for entry in &entries {
                catalog.push(entry.clone());
            }
        });
        Ok(entries)
    }

    /// Deletes a file on the device and removes it from the catalog
    ///
    /// # Returns
    /// The path the device reports as deleted
    pub async fn delete(&self, path: &str) -> Result<String, DeviceError> {
        let mut permit = self.session.permit().await?;
        let res: DeleteResponse = permit
            .post(DELETE_ENDPOINT, vec![("path", path.to_string())])
            .await?
            .json()?;
        self.session.with_catalog(|catalog| catalog.remove_file(&res.file));
        Ok(res.file)
    }
}
