//! Scripted full-scan recipe.
//!
//! The full scan is a fixed sequence of steps: focus the probe once,
//! then sweep the probe around the target in ten-degree increments,
//! capturing in each imaging mode along the way. The player executes
//! it one step per terminal event, so the table is plain data.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

use crate::mode::Mode;

/// What a single recipe step asks the coordinator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    /// Run the auto-focus routine.
    Focus,
    /// Rotate the probe by the step argument, degrees.
    MoveByAngle,
    /// Pulse the scan trigger and wait for the capture to finish.
    Scan,
}

impl StepAction {
    /// Console label for this step, as shown in progress messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Focus => "Focus Action",
            Self::MoveByAngle => "Move-by-Angle Action",
            Self::Scan => "Scanning Action",
        }
    }
}

/// One entry of the scripted scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    /// Action to dispatch.
    pub action: StepAction,
    /// Imaging mode the console must be in before the action runs.
    pub mode: Mode,
    /// Action argument: rotation in degrees for move steps, unused
    /// otherwise.
    pub arg: f64,
}

/// Shorthand for building recipe tables, including test scripts.
pub const fn step(action: StepAction, mode: Mode, arg: f64) -> RecipeStep {
    RecipeStep { action, mode, arg }
}

/// Rotation applied by every move step of the sweep, degrees.
pub const SWEEP_STEP_DEG: f64 = 10.0;

/// The scripted full scan.
///
/// One focus pass, then three arcs of six move/capture triplets each,
/// with an OCTA capture before each arc and after the last. The
/// eighteen moves cover a 180-degree sweep.
pub static FULL_SCAN: &[RecipeStep] = &[
    step(StepAction::Focus, Mode::Robot, 0.0),
    step(StepAction::Scan, Mode::Octa, 0.0),
    // First arc, 0 through 60 degrees.
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::Scan, Mode::Octa, 0.0),
    // Second arc, 60 through 120 degrees.
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::Scan, Mode::Octa, 0.0),
    // Third arc, 120 through 180 degrees.
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::MoveByAngle, Mode::Oct, SWEEP_STEP_DEG),
    step(StepAction::Scan, Mode::Oct, 0.0),
    step(StepAction::Scan, Mode::Oce, 0.0),
    step(StepAction::Scan, Mode::Octa, 0.0),
];

const_assert_eq!(FULL_SCAN.len(), 59);
