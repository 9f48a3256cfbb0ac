//! # OCTA Coordinator Library
//!
//! Orchestration core for a robot-mounted optical imaging probe. A
//! fixed-tick arbiter folds operator console snapshots into at most one
//! active action (focus, sweep move, freedrive, reset), a scripted
//! full-scan recipe drives the move/scan sequence across imaging modes,
//! and latched services answer the console's capture and focus
//! handshakes. Hardware sits behind trait seams (motion, vision,
//! console transport); the [`sim`] module carries the simulated rig the
//! binary and the integration tests run against.
//!
//! ## Task Model
//!
//! - **Arbiter**: fixed tick, owns the control law and the recipe cursor
//! - **Console sync**: publishes status every period, drains commands
//! - **Executors**: one supervised task per in-flight action goal
//!
//! All shared state lives behind a single `parking_lot::Mutex`; nothing
//! holds it across an await.

pub mod actions;
pub mod alignment;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod planning;
pub mod services;
pub mod sim;
pub mod state;
pub mod sync;
pub mod vision;
