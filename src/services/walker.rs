//! Bounded-depth directory discovery
//!
//! Lists the files at the root, asks the device for every directory within
//! the depth bound, then lists the files of each discovered directory one
//! request at a time, first discovered first.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::catalog::{EntryKind, FileEntry, RemoteFileCatalog};
use crate::{DeviceError, DeviceSession};

/// Pending directories of one traversal
#[derive(Debug, Clone)]
pub struct TraversalSession {
    queue: VecDeque<String>,
    max_depth: u8,
}

impl TraversalSession {
    pub fn new(max_depth: u8) -> Self {
        Self {
            queue: VecDeque::new(),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    pub fn enqueue(&mut self, dir: impl Into<String>) {
        self.queue.push_back(dir.into());
    }

    pub fn next_dir(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Recursion depth of the device's directory listing covering `max_depth`
    /// hops, or `None` when no directory is in range
    ///
    /// A directory listing always returns the immediate subdirectories and
    /// recurses `depth` levels further.
    fn directory_listing_depth(&self) -> Option<u8> {
        self.max_depth.checked_sub(1)
    }
}

/// Outcome of a finished traversal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalReport {
    /// Directories whose files were listed, in visiting order
    pub directories: Vec<String>,
    /// File entries appended to the catalog
    pub files: usize,
}

pub struct DirectoryWalker<'a> {
    catalog: RemoteFileCatalog<'a>,
    root: String,
    traversal: TraversalSession,
}

impl<'a> DirectoryWalker<'a> {
    /// Prepares a traversal of `root` descending at most `max_depth` directory hops
    pub fn new(session: &'a DeviceSession, root: impl Into<String>, max_depth: u8) -> Self {
        Self {
            catalog: RemoteFileCatalog::new(session),
            root: root.into(),
            traversal: TraversalSession::new(max_depth),
        }
    }

    /// Runs the traversal until no directory is left to expand
    ///
    /// Each listing holds the gate until its entries are in the catalog, so
    /// the next listing never starts before the previous one was merged.
    /// A failed listing counts as an empty one.
    ///
    /// # Errors
    /// Only if the gate itself is gone; device failures do not end a traversal
    pub async fn run(mut self) -> Result<TraversalReport, DeviceError> {
        let mut report = TraversalReport::default();
        let root = self.root.clone();

        report.files += self.list_or_empty(&root, EntryKind::File, 0).await?.len();

        if let Some(depth) = self.traversal.directory_listing_depth() {
            for dir in self.list_or_empty(&root, EntryKind::Directory, depth).await? {
                self.traversal.enqueue(dir.path);
            }
        }
        debug!(
            "{} directories within {} hops of {root}",
            self.traversal.pending(),
            self.traversal.max_depth()
        );

        while let Some(dir) = self.traversal.next_dir() {
            report.files += self.list_or_empty(&dir, EntryKind::File, 0).await?.len();
            report.directories.push(dir);
        }

        info!(
            "Traversal of {root} found {} files in {} directories",
            report.files,
            report.directories.len()
        );
        Ok(report)
    }

    async fn list_or_empty(
        &self,
        path: &str,
        kind: EntryKind,
        depth: u8,
    ) -> Result<Vec<FileEntry>, DeviceError> {
        match self.catalog.list(path, kind, depth).await {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_transport() => {
                warn!("Listing {kind:?} entries of {path} failed, treating as empty: {e}");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
