//! Inventory, backup and restore of an embedded device's file storage.
//!
//! The device exposes a small HTTP API (`/list`, `/download`, `/restorefile`,
//! `/delete`, `/freeSpace`) and can only serve one request at a time. Every
//! request issued through a [`DeviceSession`] passes through its [`AckGate`],
//! so traversal, backup and restore never have two requests in flight.

pub mod archive;
pub mod config;
pub mod gate;
#[cfg(test)]
pub(crate) mod mock;
pub mod provider;

pub mod services;
pub use services::*;

pub use archive::ArchiveDocument;
pub use config::SessionConfig;
pub use gate::{AckGate, GatePermit, GateState};
pub use provider::{DeviceProvider, DeviceResponse};

use std::{io, sync::Mutex};

use thiserror::Error;
use tracing::info;

use catalog::FileCatalog;

/// Main handle for talking to one device
///
/// Owns the transport, the request gate and the file catalog discovered by
/// the last traversal. The handle is `Send + Sync`; several tasks may share it
/// behind an `Arc` and the gate keeps their requests strictly sequential.
#[derive(Debug)]
pub struct DeviceSession {
    provider: Box<dyn DeviceProvider>,
    gate: AckGate,
    catalog: Mutex<FileCatalog>,
    traversal: tokio::sync::Mutex<()>,
    config: SessionConfig,
}

impl DeviceSession {
    /// Creates a session on top of an existing transport
    ///
    /// # Arguments
    /// * `provider` - Transport used for every device request
    /// * `config` - Throttle and traversal defaults for this session
    pub fn new(provider: Box<dyn DeviceProvider>, config: SessionConfig) -> Self {
        Self {
            provider,
            gate: AckGate::new(),
            catalog: Mutex::new(FileCatalog::new()),
            traversal: tokio::sync::Mutex::new(()),
            config,
        }
    }

    /// Creates a session speaking HTTP to the host named in `config`
    ///
    /// # Errors
    /// Returns `DeviceError` if the HTTP client cannot be built
    #[cfg(feature = "http")]
    pub fn connect(config: SessionConfig) -> Result<Self, DeviceError> {
        let provider = provider::HttpProvider::new(&config)?;
        Ok(Self::new(Box::new(provider), config))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        self.provider.label()
    }

    /// Current state of the request gate
    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Waits until no other request is outstanding and claims the gate
    pub(crate) async fn permit(&self) -> Result<GatePermit<'_>, DeviceError> {
        self.gate.acquire(self.provider.as_ref()).await
    }

    /// Returns a snapshot of the current catalog
    pub fn catalog(&self) -> FileCatalog {
        self.with_catalog(|c| c.clone())
    }

    pub(crate) fn with_catalog<R>(&self, f: impl FnOnce(&mut FileCatalog) -> R) -> R {
        let mut catalog = self.catalog.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut catalog)
    }

    /// Clears the catalog and rebuilds it from the configured root and depth
    ///
    /// # Returns
    /// The number of files now in the catalog
    pub async fn refresh_catalog(&self) -> Result<usize, DeviceError> {
        // one traversal session at a time, otherwise two refreshes would
        // interleave their appends
        let _traversal = self.traversal.lock().await;
        {
            let _permit = self.permit().await?;
            self.with_catalog(|c| c.clear());
        }
        let report = walker::DirectoryWalker::new(self, &self.config.root, self.config.depth)
            .run()
            .await?;
        info!(
            "Catalog refreshed: {} files in {} directories",
            report.files,
            report.directories.len()
        );
        Ok(report.files)
    }

    /// Downloads every file in the catalog into one archive
    ///
    /// Waits for a running catalog refresh to finish first.
    pub async fn backup(&self) -> Result<ArchiveDocument, DeviceError> {
        backup::BackupArchiver::new(self).run().await
    }

    /// Replays an archive onto the device, then refreshes catalog and free space
    pub async fn restore(
        &self,
        archive: &ArchiveDocument,
    ) -> Result<restore::RestoreReport, DeviceError> {
        restore::RestoreEngine::new(self).restore(archive).await
    }

    /// Free space on the device in bytes
    pub async fn free_space(&self) -> Result<u64, DeviceError> {
        storage_status::StorageStatusReporter::new(self)
            .free_space()
            .await
    }

    /// Deletes a file on the device and drops it from the catalog
    pub async fn delete_file(&self, path: &str) -> Result<String, DeviceError> {
        catalog::RemoteFileCatalog::new(self).delete(path).await
    }
}

/// Every failure a device operation can report
#[derive(Error, Debug)]
#[repr(i32)]
#[non_exhaustive]
pub enum DeviceError {
    #[error("local io failed")]
    Io(#[from] io::Error) = -1,

    #[cfg(feature = "http")]
    #[error("http transport error")]
    Reqwest(#[from] reqwest::Error) = -2,

    #[error("device responded with status {0}: {1}")]
    HttpStatus(u16, String) = -3,

    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error) = -4,

    #[error("unexpected response from device")]
    UnexpectedResponse = -5,

    #[error("malformed archive: {0}")]
    MalformedArchive(String) = -6,

    #[error("download of {path} failed")]
    DownloadFailed {
        path: String,
        source: Box<DeviceError>,
    } = -7,

    #[error("restore of {path} failed after {restored} files were written")]
    RestoreFailed {
        path: String,
        restored: usize,
        source: Box<DeviceError>,
    } = -8,

    #[error("request gate closed")]
    GateClosed = -9,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String) = -10,
}

impl DeviceError {
    pub fn code(&self) -> i32 {
        match self {
            DeviceError::Io(_) => -1,
            #[cfg(feature = "http")]
            DeviceError::Reqwest(_) => -2,
            DeviceError::HttpStatus(_, _) => -3,
            DeviceError::Json(_) => -4,
            DeviceError::UnexpectedResponse => -5,
            DeviceError::MalformedArchive(_) => -6,
            DeviceError::DownloadFailed { .. } => -7,
            DeviceError::RestoreFailed { .. } => -8,
            DeviceError::GateClosed => -9,
            DeviceError::InvalidConfig(_) => -10,
        }
    }

    /// True for failures of the request itself: no response, a non-success
    /// status, or a body that could not be understood
    pub fn is_transport(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            DeviceError::Reqwest(_) => true,
            DeviceError::HttpStatus(_, _)
            | DeviceError::Json(_)
            | DeviceError::UnexpectedResponse => true,
            _ => false,
        }
    }
}
