//! All-or-nothing backup of the cataloged files

use std::{future::Future, time::Duration};

use tracing::{debug, info, warn};

use crate::{ArchiveDocument, DeviceError, DeviceSession};

pub const DOWNLOAD_ENDPOINT: &str = "/download";

/// Reported once per downloaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupProgress {
    pub completed: usize,
    pub total: usize,
    pub path: String,
}

/// Downloads every cataloged file, one at a time, into an [`ArchiveDocument`]
pub struct BackupArchiver<'a> {
    session: &'a DeviceSession,
    throttle: Duration,
}

impl<'a> BackupArchiver<'a> {
    /// Creates an archiver using the session's download throttle
    pub fn new(session: &'a DeviceSession) -> Self {
        Self {
            session,
            throttle: session.config().download_throttle,
        }
    }

    /// Overrides the minimum delay between two downloads
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub async fn run(&self) -> Result<ArchiveDocument, DeviceError> {
        self.run_with_progress(|_| async {}).await
    }

    /// Downloads the files currently in the catalog, reporting each one
    ///
    /// # Arguments
    /// * `callback` - Awaited after every completed download
    ///
    /// # Returns
    /// The archive, only once every file has been retrieved
    ///
    /// # Errors
    /// `DownloadFailed` for the first file that could not be retrieved; no
    /// partial archive is returned
    pub async fn run_with_progress<Fut>(
        &self,
        callback: impl Fn(BackupProgress) -> Fut,
    ) -> Result<ArchiveDocument, DeviceError>
    where
        Fut: Future<Output = ()>,
    {
        // a refresh in progress leaves the catalog half built
        let _traversal = self.session.traversal.lock().await;
        let paths: Vec<String> = self.session.catalog().files().map(str::to_owned).collect();
        let total = paths.len();
        info!("Backing up {total} files from {}", self.session.label());

        let mut archive = ArchiveDocument::new();
        for (i, path) in paths.into_iter().enumerate() {
            if i > 0 && !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }
            let contents = match self.download(&path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("Could not complete backup, {path} failed: {e}");
                    return Err(DeviceError::DownloadFailed {
                        path,
                        source: Box::new(e),
                    });
                }
            };
            archive.insert(path.clone(), contents);
            callback(BackupProgress {
                completed: i + 1,
                total,
                path,
            })
            .await;
        }

        info!("Backup of {} files complete", archive.len());
        Ok(archive)
    }

    async fn download(&self, path: &str) -> Result<String, DeviceError> {
        let mut permit = self.session.permit().await?;
        let res = permit
            .get(DOWNLOAD_ENDPOINT, vec![("path", path.to_string())])
            .await?;
        debug!("Downloaded {path}, {} bytes", res.text().len());
        Ok(res.into_text())
    }
}
