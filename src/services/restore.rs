//! Ordered replay of an archive onto the device

use std::future::Future;

use tracing::{debug, info, warn};

use super::storage_status::StorageStatusReporter;
use crate::{ArchiveDocument, DeviceError, DeviceSession};

pub const RESTORE_ENDPOINT: &str = "/restorefile";

/// Reported once per acknowledged write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreProgress {
    pub completed: usize,
    pub total: usize,
    pub path: String,
}

/// Outcome of a successful restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Files written to the device
    pub restored: usize,
    /// Files in the catalog after the post-restore refresh
    pub catalog_files: usize,
    /// Free space after the restore, `None` if the device did not tell
    pub free_space: Option<u64>,
}

/// Writes archive entries back to the device, one acknowledged write at a time
pub struct RestoreEngine<'a> {
    session: &'a DeviceSession,
    written: usize,
}

impl<'a> RestoreEngine<'a> {
    pub fn new(session: &'a DeviceSession) -> Self {
        Self {
            session,
            written: 0,
        }
    }

    /// Writes acknowledged by the device during the latest restore
    pub fn written(&self) -> usize {
        self.written
    }

    pub async fn restore(
        &mut self,
        archive: &ArchiveDocument,
    ) -> Result<RestoreReport, DeviceError> {
        self.restore_with_progress(archive, |_| async {}).await
    }

    /// Parses `json` as an archive and restores it
    ///
    /// Nothing is sent to the device when the archive is malformed.
    pub async fn restore_json(&mut self, json: &str) -> Result<RestoreReport, DeviceError> {
        let archive = ArchiveDocument::from_json(json)?;
        self.restore(&archive).await
    }

    /// Replays `archive` in key order, then refreshes catalog and free space
    ///
    /// Write k+1 is only issued once write k was acknowledged. A failed write
    /// stops the replay; files written before it stay on the device.
    ///
    /// # Arguments
    /// * `archive` - Paths and contents to write
    /// * `callback` - Awaited after every acknowledged write
    ///
    /// # Errors
    /// `RestoreFailed` naming the failing path and how many writes preceded it
    pub async fn restore_with_progress<Fut>(
        &mut self,
        archive: &ArchiveDocument,
        callback: impl Fn(RestoreProgress) -> Fut,
    ) -> Result<RestoreReport, DeviceError>
    where
        Fut: Future<Output = ()>,
    {
        self.written = 0;
        let total = archive.len();
        info!("Restoring {total} files to {}", self.session.label());

        for (path, contents) in archive.iter() {
            if let Err(e) = self.write(path, contents).await {
                warn!("Restore stopped at {path} after {} files: {e}", self.written);
                return Err(DeviceError::RestoreFailed {
                    path: path.to_string(),
                    restored: self.written,
                    source: Box::new(e),
                });
            }
            self.written += 1;
            callback(RestoreProgress {
                completed: self.written,
                total,
                path: path.to_string(),
            })
            .await;
        }
        info!("Restore successful, {} files written", self.written);

        let catalog_files = self.session.refresh_catalog().await?;
        let free_space = match StorageStatusReporter::new(self.session).free_space().await {
            Ok(space) => Some(space),
            Err(e) => {
                warn!("Could not read free space after restore: {e}");
                None
            }
        };

        Ok(RestoreReport {
            restored: self.written,
            catalog_files,
            free_space,
        })
    }

    async fn write(&self, path: &str, contents: &str) -> Result<(), DeviceError> {
        let mut permit = self.session.permit().await?;
        permit
            .post(
                RESTORE_ENDPOINT,
                vec![("path", path.to_string()), ("contents", contents.to_string())],
            )
            .await?;
        debug!("{path} restored");
        Ok(())
    }
}
