//! Lifecycle guard shared by the camera, microphone, and storage wrappers.
//!
//! A `PeripheralHandle` owns an opaque driver and exactly one `PeripheralState`.
//! The driver is only reachable for I/O while the handle is `Ready`; bring-up and
//! teardown go through `initialize_with` / `teardown_with` so the state transitions
//! stay in one place.

use cams3_core::{CaptureError, Peripheral, PeripheralState, Result};
use tracing::{debug, warn};

/// Driver handle plus lifecycle state
#[derive(Debug)]
pub struct PeripheralHandle<D> {
    peripheral: Peripheral,
    state: PeripheralState,
    driver: D,
}

impl<D> PeripheralHandle<D> {
    pub fn new(peripheral: Peripheral, driver: D) -> Self {
        Self {
            peripheral,
            state: PeripheralState::Uninitialized,
            driver,
        }
    }

    pub fn peripheral(&self) -> Peripheral {
        self.peripheral
    }

    pub fn state(&self) -> PeripheralState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Fail with `NotInitialized` unless the handle is `Ready`
    pub fn require_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CaptureError::not_initialized(self.peripheral))
        }
    }

    /// Driver access for I/O; only granted while `Ready`
    pub fn ready_driver_mut(&mut self) -> Result<&mut D> {
        self.require_ready()?;
        Ok(&mut self.driver)
    }

    /// Read-only driver access regardless of state
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable driver access regardless of state, for board-specific extras
    /// that sit outside the lifecycle (and for fault injection in tests)
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Bring the peripheral up.
    ///
    /// - `Ready`: no-op success, `bring_up` is not called.
    /// - `Failed`: rejected with `RequiresTeardown`.
    /// - otherwise: runs `bring_up`; success moves to `Ready`, any error to `Failed`.
    ///
    /// `bring_up` must unwind whatever it allocated before returning an error.
    pub fn initialize_with<F>(&mut self, bring_up: F) -> Result<()>
    where
        F: FnOnce(&mut D) -> Result<()>,
    {
        match self.state {
            PeripheralState::Ready => return Ok(()),
            PeripheralState::Failed => {
                return Err(CaptureError::RequiresTeardown {
                    peripheral: self.peripheral,
                })
            }
            PeripheralState::Uninitialized | PeripheralState::Initializing => {}
        }

        self.state = PeripheralState::Initializing;
        match bring_up(&mut self.driver) {
            Ok(()) => {
                self.state = PeripheralState::Ready;
                debug!(peripheral = %self.peripheral, "peripheral ready");
                Ok(())
            }
            Err(e) => {
                self.state = PeripheralState::Failed;
                warn!(peripheral = %self.peripheral, error = %e, "peripheral initialization failed");
                Err(e)
            }
        }
    }

    /// Release hardware resources and return to `Uninitialized`.
    ///
    /// Idempotent: an `Uninitialized` handle succeeds without calling `release`.
    /// A `Failed` handle already unwound its resources during bring-up, so it is
    /// reset without calling `release` either. If `release` fails the handle stays
    /// `Ready`, since the hardware is still held.
    pub fn teardown_with<F>(&mut self, release: F) -> Result<()>
    where
        F: FnOnce(&mut D) -> Result<()>,
    {
        match self.state {
            PeripheralState::Uninitialized => Ok(()),
            PeripheralState::Failed | PeripheralState::Initializing => {
                self.state = PeripheralState::Uninitialized;
                Ok(())
            }
            PeripheralState::Ready => {
                release(&mut self.driver)?;
                self.state = PeripheralState::Uninitialized;
                debug!(peripheral = %self.peripheral, "peripheral released");
                Ok(())
            }
        }
    }
}
