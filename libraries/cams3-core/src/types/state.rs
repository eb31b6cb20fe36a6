//! Peripheral lifecycle state

use std::fmt;

/// Lifecycle state carried by every peripheral handle.
///
/// `Uninitialized -> Initializing -> Ready` on a successful hardware bring-up,
/// `Initializing -> Failed` on any driver error. `Failed` is sticky until an
/// explicit teardown returns the handle to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PeripheralState {
    /// No hardware resources held
    #[default]
    Uninitialized,
    /// Bring-up in progress
    Initializing,
    /// Hardware resources acquired and usable
    Ready,
    /// Bring-up failed; resources were unwound
    Failed,
}

impl PeripheralState {
    pub fn is_ready(&self) -> bool {
        matches!(self, PeripheralState::Ready)
    }
}

impl fmt::Display for PeripheralState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeripheralState::Uninitialized => "uninitialized",
            PeripheralState::Initializing => "initializing",
            PeripheralState::Ready => "ready",
            PeripheralState::Failed => "failed",
        };
        f.write_str(s)
    }
}
