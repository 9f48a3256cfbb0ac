//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use octa_common::prelude::*;` and get
//! the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use octa_common::prelude::*;
//! ```

// ─── Imaging Modes ──────────────────────────────────────────────────
pub use crate::mode::{Mode, ScanState};

// ─── Actions & Goals ────────────────────────────────────────────────
pub use crate::action::{ActionKind, GoalStatus, UserAction};

// ─── Console Wire Schema ────────────────────────────────────────────
pub use crate::console::{ConsoleCommand, ProbeStatus};

// ─── Scan Recipe ────────────────────────────────────────────────────
pub use crate::recipe::{RecipeStep, StepAction, FULL_SCAN, SWEEP_STEP_DEG};

// ─── Timing Constants ───────────────────────────────────────────────
pub use crate::consts::{GATE_PULSE, PUBLISH_PERIOD, TICK_PERIOD};
