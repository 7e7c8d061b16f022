//! At-most-one-in-flight request gate
//!
//! The device serves one request at a time and its write path is single
//! threaded. Every request is issued through a [`GatePermit`]; the permit is
//! held until the caller has applied the response, so the next request can
//! only start once the previous one's effects are visible.

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, trace};

use crate::{
    provider::{DeviceProvider, Params},
    DeviceError, DeviceResponse,
};

/// Observable state of an [`AckGate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug)]
pub struct AckGate {
    permits: Semaphore,
}

impl AckGate {
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(1),
        }
    }

    pub fn state(&self) -> GateState {
        if self.permits.available_permits() == 0 {
            GateState::AwaitingResponse
        } else {
            GateState::Idle
        }
    }

    /// Waits for the gate to become idle and claims it
    ///
    /// Waiters are served in the order they arrived.
    ///
    /// # Errors
    /// `GateClosed` once [`AckGate::close`] was called
    pub async fn acquire<'a>(
        &'a self,
        provider: &'a dyn DeviceProvider,
    ) -> Result<GatePermit<'a>, DeviceError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DeviceError::GateClosed)?;
        trace!("Gate claimed");
        Ok(GatePermit {
            _permit: permit,
            provider,
        })
    }

    /// Tears the gate down; pending and future acquisitions fail
    pub fn close(&self) {
        self.permits.close();
    }
}

impl Default for AckGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to talk to the device
///
/// Dropping the permit returns the gate to idle.
pub struct GatePermit<'a> {
    _permit: SemaphorePermit<'a>,
    provider: &'a dyn DeviceProvider,
}

impl GatePermit<'_> {
    pub async fn get(
        &mut self,
        endpoint: &'static str,
        params: Params,
    ) -> Result<DeviceResponse, DeviceError> {
        debug!("GET {endpoint} {params:?}");
        self.provider.get(endpoint, params).await
    }

    pub async fn post(
        &mut self,
        endpoint: &'static str,
        params: Params,
    ) -> Result<DeviceResponse, DeviceError> {
        // form bodies carry whole files, keep them out of the log
        debug!(
            "POST {endpoint} {:?}",
            params.iter().map(|(k, _)| *k).collect::<Vec<_>>()
        );
        self.provider.post(endpoint, params).await
    }
}

impl std::fmt::Debug for GatePermit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatePermit")
            .field("provider", &self.provider.label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::MockDevice;

    #[tokio::test]
    async fn permit_holds_gate_until_dropped() {
        let device = MockDevice::new();
        let gate = AckGate::new();
        assert_eq!(gate.state(), GateState::Idle);

        let mut permit = gate.acquire(&device).await.unwrap();
        assert_eq!(gate.state(), GateState::AwaitingResponse);
        permit.get("/freeSpace", Vec::new()).await.unwrap();
        // response received but not yet applied
        assert_eq!(gate.state(), GateState::AwaitingResponse);

        drop(permit);
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[tokio::test]
    async fn second_acquire_waits_for_release() {
        let device = MockDevice::new();
        let gate = AckGate::new();
        let permit = gate.acquire(&device).await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(20), gate.acquire(&device)).await;
        assert!(waiting.is_err());

        drop(permit);
        let again = tokio::time::timeout(Duration::from_millis(20), gate.acquire(&device)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn closed_gate_rejects() {
        let device = MockDevice::new();
        let gate = AckGate::new();
        gate.close();
        assert!(matches!(
            gate.acquire(&device).await,
            Err(DeviceError::GateClosed)
        ));
    }
}
