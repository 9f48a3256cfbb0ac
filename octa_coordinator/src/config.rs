//! TOML configuration loader with validation.
//!
//! Every tunable of the coordinator lives here: loop periods, the scan
//! gate pulse width, focus-loop policy, and motion bounds. All fields
//! carry serde defaults matching the shipped constants, so an empty file
//! (or a missing section) yields the stock behavior.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use octa_common::consts::{
    CAPTURE_SETTLE, DEFAULT_ENVELOPE_RADIUS_M, DEFAULT_EXECUTE_TIMEOUT, DEFAULT_FRAME_COUNT,
    DEFAULT_MAX_FOCUS_ITERATIONS, DEFAULT_PX_PER_MM, DEFAULT_RESET_TIMEOUT, FRAME_TIMEOUT,
    GATE_PULSE, PUBLISH_PERIOD, RECIPE_SETTLE, SERVICE_TIMEOUT, TICK_PERIOD,
};

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// File I/O error.
    Io(String),
    /// TOML parse error.
    Parse(String),
    /// Parameter validation error.
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Validation(e) => write!(f, "config validation: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ─── Sections ───────────────────────────────────────────────────────

/// Loop periods and console handshake bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Arbiter tick period [ms].
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Console publish period [ms].
    #[serde(default = "default_publish_ms")]
    pub publish_ms: u64,

    /// Minimum width of the scan-trigger and apply-config pulses [ms].
    #[serde(default = "default_gate_pulse_ms")]
    pub gate_pulse_ms: u64,

    /// Grace period for the console to settle on a recipe step's mode
    /// before the step action is dispatched [ms].
    #[serde(default = "default_recipe_settle_ms")]
    pub recipe_settle_ms: u64,

    /// Bound on latched console services [s].
    #[serde(default = "default_service_timeout_s")]
    pub service_timeout_s: f64,

    /// Settle delay after 3D capture activation is confirmed [ms].
    #[serde(default = "default_capture_settle_ms")]
    pub capture_settle_ms: u64,
}

fn default_tick_ms() -> u64 {
    TICK_PERIOD.as_millis() as u64
}
fn default_publish_ms() -> u64 {
    PUBLISH_PERIOD.as_millis() as u64
}
fn default_gate_pulse_ms() -> u64 {
    GATE_PULSE.as_millis() as u64
}
fn default_recipe_settle_ms() -> u64 {
    RECIPE_SETTLE.as_millis() as u64
}
fn default_service_timeout_s() -> f64 {
    SERVICE_TIMEOUT.as_secs_f64()
}
fn default_capture_settle_ms() -> u64 {
    CAPTURE_SETTLE.as_millis() as u64
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            publish_ms: default_publish_ms(),
            gate_pulse_ms: default_gate_pulse_ms(),
            recipe_settle_ms: default_recipe_settle_ms(),
            service_timeout_s: default_service_timeout_s(),
            capture_settle_ms: default_capture_settle_ms(),
        }
    }
}

/// Focus-loop policy and image geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Frames acquired per focus iteration.
    #[serde(default = "default_frame_count")]
    pub frame_count: usize,

    /// Depth-axis image scale [px/mm].
    #[serde(default = "default_px_per_mm")]
    pub px_per_mm: f64,

    /// Bound on a single frame acquisition [s].
    #[serde(default = "default_frame_timeout_s")]
    pub frame_timeout_s: f64,

    /// Hard bound on focus-loop iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// After one corrective pass, accept the angle even if it is still
    /// out of tolerance.
    #[serde(default = "default_skip_angle_tolerance")]
    pub skip_angle_tolerance: bool,

    /// Stop after the first successful corrective move instead of
    /// re-measuring.
    #[serde(default)]
    pub early_terminate: bool,
}

fn default_frame_count() -> usize {
    DEFAULT_FRAME_COUNT
}
fn default_px_per_mm() -> f64 {
    DEFAULT_PX_PER_MM
}
fn default_frame_timeout_s() -> f64 {
    FRAME_TIMEOUT.as_secs_f64()
}
fn default_max_iterations() -> u32 {
    DEFAULT_MAX_FOCUS_ITERATIONS
}
fn default_skip_angle_tolerance() -> bool {
    true
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            frame_count: default_frame_count(),
            px_per_mm: default_px_per_mm(),
            frame_timeout_s: default_frame_timeout_s(),
            max_iterations: default_max_iterations(),
            skip_angle_tolerance: default_skip_angle_tolerance(),
            early_terminate: false,
        }
    }
}

/// Motion planning and execution bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Radius of the spherical position envelope around the start pose [m].
    #[serde(default = "default_envelope_radius_m")]
    pub envelope_radius_m: f64,

    /// Bound on the homing motion of a reset goal [s].
    #[serde(default = "default_reset_timeout_s")]
    pub reset_timeout_s: f64,

    /// Bound on a single trajectory execution [s].
    #[serde(default = "default_execute_timeout_s")]
    pub execute_timeout_s: f64,
}

fn default_envelope_radius_m() -> f64 {
    DEFAULT_ENVELOPE_RADIUS_M
}
fn default_reset_timeout_s() -> f64 {
    DEFAULT_RESET_TIMEOUT.as_secs_f64()
}
fn default_execute_timeout_s() -> f64 {
    DEFAULT_EXECUTE_TIMEOUT.as_secs_f64()
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            envelope_radius_m: default_envelope_radius_m(),
            reset_timeout_s: default_reset_timeout_s(),
            execute_timeout_s: default_execute_timeout_s(),
        }
    }
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level coordinator configuration, loaded from TOML at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub motion: MotionConfig,
}

impl CoordinatorConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.timing.tick_ms == 0 {
            return Err("tick_ms must be at least 1".into());
        }
        if self.timing.publish_ms == 0 {
            return Err("publish_ms must be at least 1".into());
        }
        if self.timing.gate_pulse_ms == 0 {
            return Err("gate_pulse_ms must be at least 1".into());
        }
        if self.timing.service_timeout_s <= 0.0 {
            return Err(format!(
                "service_timeout_s {} must be positive",
                self.timing.service_timeout_s
            ));
        }
        if self.focus.frame_count == 0 {
            return Err("frame_count must be at least 1".into());
        }
        if self.focus.px_per_mm <= 0.0 {
            return Err(format!(
                "px_per_mm {} must be positive",
                self.focus.px_per_mm
            ));
        }
        if self.focus.frame_timeout_s <= 0.0 {
            return Err(format!(
                "frame_timeout_s {} must be positive",
                self.focus.frame_timeout_s
            ));
        }
        if self.focus.max_iterations == 0 {
            return Err("max_iterations must be at least 1".into());
        }
        if self.motion.envelope_radius_m <= 0.0 {
            return Err(format!(
                "envelope_radius_m {} must be positive",
                self.motion.envelope_radius_m
            ));
        }
        if self.motion.reset_timeout_s <= 0.0 {
            return Err(format!(
                "reset_timeout_s {} must be positive",
                self.motion.reset_timeout_s
            ));
        }
        if self.motion.execute_timeout_s <= 0.0 {
            return Err(format!(
                "execute_timeout_s {} must be positive",
                self.motion.execute_timeout_s
            ));
        }
        Ok(())
    }

    // Duration accessors so the rest of the crate never re-derives units.

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.timing.tick_ms)
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.timing.publish_ms)
    }

    pub fn gate_pulse(&self) -> Duration {
        Duration::from_millis(self.timing.gate_pulse_ms)
    }

    pub fn recipe_settle(&self) -> Duration {
        Duration::from_millis(self.timing.recipe_settle_ms)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timing.service_timeout_s)
    }

    pub fn capture_settle(&self) -> Duration {
        Duration::from_millis(self.timing.capture_settle_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.focus.frame_timeout_s)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.motion.reset_timeout_s)
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.motion.execute_timeout_s)
    }
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the coordinator configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CoordinatorConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
    load_config_from_str(&raw)
}

/// Parse and validate configuration from an in-memory TOML string.
pub fn load_config_from_str(raw: &str) -> Result<CoordinatorConfig, ConfigError> {
    let config: CoordinatorConfig =
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate().map_err(ConfigError::Validation)?;
    Ok(config)
}
