//! Imaging modes and the scan-gate state.
//!
//! The console historically carried four mutually-exclusive mode
//! booleans; [`Mode`] replaces them with one enum so an impossible
//! combination cannot be represented.

use serde::{Deserialize, Serialize};

/// Imaging mode of the probe console.
///
/// Exactly one mode is active at any time. `Robot` is the pure motion
/// view; the other three select an acquisition modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    /// Motion-only view, no acquisition running.
    Robot = 0,
    /// Structural OCT acquisition.
    Oct = 1,
    /// OCT angiography acquisition.
    Octa = 2,
    /// Elastography acquisition.
    Oce = 3,
}

impl Mode {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Robot),
            1 => Some(Self::Oct),
            2 => Some(Self::Octa),
            3 => Some(Self::Oce),
            _ => None,
        }
    }

    /// Human-readable label used in console status messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Robot => "ROBOT Mode",
            Self::Oct => "OCT Mode",
            Self::Octa => "OCTA Mode",
            Self::Oce => "OCE Mode",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::Robot
    }
}

/// Scan-gate state.
///
/// `Busy` from the moment a scan pulse is raised until the console's
/// scan-trigger mirror flips, signalling the scan finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ScanState {
    /// No scan in flight; a new pulse may be raised.
    Idle = 0,
    /// Pulse raised, waiting for the console to acknowledge.
    Busy = 1,
}

impl ScanState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Busy),
            _ => None,
        }
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::Idle
    }
}
