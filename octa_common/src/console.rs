//! Console wire schema.
//!
//! Two fixed snapshots cross the console boundary: [`ConsoleCommand`]
//! inbound (operator settings and request flags) and [`ProbeStatus`]
//! outbound (published every period, change-logged on difference).
//! Both derive `PartialEq` so the sync task can detect changes without
//! field-by-field bookkeeping.

use serde::{Deserialize, Serialize};

use crate::mode::Mode;

/// Inbound command snapshot from the operator console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleCommand {
    /// Robot velocity scaling, 0..=1.
    pub velocity: f64,
    /// Robot acceleration scaling, 0..=1.
    pub acceleration: f64,
    /// Height tolerance for the focus loop, millimetres.
    pub z_tolerance: f64,
    /// Angle tolerance for the focus loop, degrees.
    pub angle_tolerance: f64,
    /// Lateral offset radius applied per move step, metres.
    pub radius: f64,
    /// Total sweep covered by the configured point count, degrees.
    pub angle_limit: f64,
    /// Number of points the sweep is divided into.
    pub num_points: i32,
    /// Manual height jog increment.
    pub dz: f64,
    /// Manual rotation jog increment.
    pub drot: f64,
    /// Run the auto-focus routine.
    pub autofocus: bool,
    /// Hold the robot in freedrive (teach) mode.
    pub freedrive: bool,
    /// Step to the previous sweep position.
    pub previous: bool,
    /// Step to the next sweep position.
    pub next: bool,
    /// Return to the zero-angle position.
    pub home: bool,
    /// Drive to the default posture.
    pub reset: bool,
    /// Console mirror of the published scan-trigger pulse.
    pub scan_trigger: bool,
    /// Console mirror of the published 3D-capture flag.
    pub scan_3d: bool,
    /// Target surface depth for the focus loop, pixels.
    pub z_height: f64,
    /// Run the scripted full scan.
    pub full_scan: bool,
    /// Console mirror of the published imaging mode.
    pub mode: Mode,
    /// Cancel whatever is currently running.
    pub cancel: bool,
}

impl Default for ConsoleCommand {
    fn default() -> Self {
        Self {
            velocity: 0.5,
            acceleration: 0.5,
            z_tolerance: 0.0,
            angle_tolerance: 0.0,
            radius: 0.0,
            angle_limit: 0.0,
            num_points: 1,
            dz: 0.0,
            drot: 0.0,
            autofocus: false,
            freedrive: false,
            previous: false,
            next: false,
            home: false,
            reset: false,
            scan_trigger: false,
            scan_3d: false,
            z_height: 0.0,
            full_scan: false,
            mode: Mode::Robot,
            cancel: false,
        }
    }
}

/// Outbound status snapshot to the operator console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStatus {
    /// Free-text progress message shown on the console.
    pub message: String,
    /// Accumulated sweep angle, degrees.
    pub angle: f64,
    /// Signed lap counter, 1 at the zero-angle position.
    pub circle: i32,
    /// Scan-trigger pulse, held high for at least the gate pulse width.
    pub scan_trigger: bool,
    /// Apply-config pulse requesting the console to reload settings.
    pub apply_config: bool,
    /// A focus goal reached a terminal state and has not been
    /// acknowledged yet.
    pub end_state: bool,
    /// 3D-capture mode requested from the console.
    pub scan_3d: bool,
    /// A full scan is running.
    pub full_scan: bool,
    /// Imaging mode the console should be in.
    pub mode: Mode,
}

impl Default for ProbeStatus {
    fn default() -> Self {
        Self {
            message: "idle".to_owned(),
            angle: 0.0,
            circle: 1,
            scan_trigger: false,
            apply_config: false,
            end_state: false,
            scan_3d: false,
            full_scan: false,
            mode: Mode::Robot,
        }
    }
}
