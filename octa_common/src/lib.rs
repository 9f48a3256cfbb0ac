//! OCTA Common Library
//!
//! Shared data model for the OCTA probe workspace: the console wire
//! schema, the action/mode/goal enums, the full-scan recipe table, and
//! the timing constants every crate agrees on.
//!
//! # Module Structure
//!
//! - [`action`] - User actions, lifecycle kinds and goal states
//! - [`console`] - Inbound command and outbound status snapshots
//! - [`consts`] - Timing constants and numeric defaults
//! - [`mode`] - Imaging modes and the scan-gate state
//! - [`recipe`] - The scripted full-scan program
//! - [`prelude`] - Common re-exports for convenience

pub mod action;
pub mod console;
pub mod consts;
pub mod mode;
pub mod prelude;
pub mod recipe;
