//! Free space reporting

use serde::Deserialize;
use tracing::debug;

use crate::{DeviceError, DeviceSession};

pub const FREE_SPACE_ENDPOINT: &str = "/freeSpace";

#[derive(Debug, Deserialize)]
struct FreeSpaceResponse {
    space: u64,
}

/// Stateless free-space query; every call asks the device again
#[derive(Debug, Clone, Copy)]
pub struct StorageStatusReporter<'a> {
    session: &'a DeviceSession,
}

impl<'a> StorageStatusReporter<'a> {
    pub fn new(session: &'a DeviceSession) -> Self {
        Self { session }
    }

    /// Free space on the device in bytes
    ///
    /// # Errors
    /// Returns `DeviceError` if the device does not answer with a space figure
    pub async fn free_space(&self) -> Result<u64, DeviceError> {
        let mut permit = self.session.permit().await?;
        let res: Option<FreeSpaceResponse> = permit
            .get(FREE_SPACE_ENDPOINT, Vec::new())
            .await?
            .json()?;
        match res {
            Some(r) => {
                debug!("Free space: {} bytes", r.space);
                Ok(r.space)
            }
            None => Err(DeviceError::UnexpectedResponse),
        }
    }
}
