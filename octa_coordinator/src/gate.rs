//! Scan gate: trigger-pulse handshake with the capture backend.
//!
//! A capture is started by pulsing `scan_trigger` on the outbound status;
//! the console acknowledges completion by toggling its own `scan_trigger`
//! mirror in the next command snapshot. The gate tracks the last mirror
//! value it stored at trigger time and reports Busy until the mirror
//! flips. It never times out on its own; a stuck capture is resolved by
//! the cancel path forcing the gate idle.

use octa_common::mode::ScanState;

/// Capture handshake state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanGate {
    state: ScanState,
    mirror_store: bool,
}

impl ScanGate {
    pub const fn new() -> Self {
        Self {
            state: ScanState::Idle,
            mirror_store: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == ScanState::Idle
    }

    /// Start a capture: go Busy and remember the mirror value so a later
    /// flip can be detected. The caller raises the outbound pulse flag.
    pub fn begin_capture(&mut self, mirror_now: bool) {
        self.state = ScanState::Busy;
        self.mirror_store = mirror_now;
    }

    /// Feed the inbound mirror value. A change means the console finished
    /// the capture; the gate returns to Idle and stores the new value.
    /// Returns true when the mirror flipped on this observation.
    pub fn observe_mirror(&mut self, mirror_now: bool) -> bool {
        if mirror_now != self.mirror_store {
            self.state = ScanState::Idle;
            self.mirror_store = mirror_now;
            true
        } else {
            false
        }
    }

    /// Drop any in-flight handshake, used by the cancel path.
    pub fn force_idle(&mut self) {
        self.state = ScanState::Idle;
    }
}

impl Default for ScanGate {
    fn default() -> Self {
        Self::new()
    }
}
