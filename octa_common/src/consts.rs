//! System-wide constants for the OCTA probe workspace.
//!
//! Single source of truth for timing and numeric defaults. Imported by
//! the coordinator and its tests, with no duplication permitted.

use std::time::Duration;

/// Arbiter tick period.
pub const TICK_PERIOD: Duration = Duration::from_millis(5);

/// Console status publish period.
pub const PUBLISH_PERIOD: Duration = Duration::from_millis(5);

/// Minimum width of the scan-trigger pulse so a polling console
/// reliably observes the rising edge.
pub const GATE_PULSE: Duration = Duration::from_millis(20);

/// Width of the apply-config pulse.
pub const APPLY_CONFIG_PULSE: Duration = Duration::from_millis(20);

/// Delay granted to the console to settle into a recipe step's imaging
/// mode before the step action is dispatched.
pub const RECIPE_SETTLE: Duration = Duration::from_millis(100);

/// Bound on the inbound services confirming against their console
/// mirror (3D-capture toggle, focus deactivation).
pub const SERVICE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settle delay after the console confirms 3D-capture activation.
pub const CAPTURE_SETTLE: Duration = Duration::from_millis(50);

/// Bound on acquiring one frame newer than the last one consumed.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on the background-capture request issued after a reset.
pub const BACKGROUND_TIMEOUT: Duration = Duration::from_secs(1);

/// Minimum spacing between stored frames.
pub const FRAME_GATING: Duration = Duration::from_millis(50);

/// Accumulated angles closer to zero than this count as "at home".
pub const ANGLE_EPSILON: f64 = 1e-6;

/// Frames per focus iteration.
pub const DEFAULT_FRAME_COUNT: usize = 6;

/// Image scale, pixels per millimetre.
pub const DEFAULT_PX_PER_MM: f64 = 55.0;

/// Radius of the spherical position envelope handed to the planner, metres.
pub const DEFAULT_ENVELOPE_RADIUS_M: f64 = 0.05;

/// Focus iterations before the goal is aborted.
pub const DEFAULT_MAX_FOCUS_ITERATIONS: u32 = 25;

/// Bound on the homing motion of a reset goal.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on one trajectory execution.
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(GATE_PULSE >= Duration::from_millis(20));
        assert!(TICK_PERIOD < GATE_PULSE);
        assert!(PUBLISH_PERIOD <= GATE_PULSE);
        assert!(DEFAULT_FRAME_COUNT >= 1);
        assert!(DEFAULT_PX_PER_MM > 0.0);
        assert!(DEFAULT_MAX_FOCUS_ITERATIONS >= 1);
    }

    #[test]
    fn pulse_survives_at_least_one_publish() {
        // The console polls at PUBLISH_PERIOD; the pulse must span
        // several polls even with one missed tick.
        assert!(GATE_PULSE.as_millis() >= 2 * PUBLISH_PERIOD.as_millis());
    }
}
