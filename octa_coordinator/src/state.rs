//! Shared runtime state and readiness signals.
//!
//! One `SharedControlState` behind one `parking_lot::Mutex` is the single
//! source of truth: the latest inbound command, the outbound status, the
//! arbiter's bookkeeping, and the scan gate. Executors and services take
//! the lock for short reads and writes only, never across an await; the
//! things they do wait on (console mirrors) are exposed as `watch`
//! channels on [`Signals`] instead of being polled under the lock.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use octa_common::action::UserAction;
use octa_common::console::{ConsoleCommand, ProbeStatus};
use octa_common::mode::Mode;

use crate::config::CoordinatorConfig;
use crate::gate::ScanGate;

/// Everything the coordinator mutates at runtime, under one lock.
#[derive(Debug)]
pub struct SharedControlState {
    /// Latest inbound command snapshot.
    pub command: ConsoleCommand,
    /// Outbound status snapshot, published every period.
    pub status: ProbeStatus,

    /// Action the arbiter is currently driving, if any.
    pub current: Option<UserAction>,
    /// Action driven on the previous tick, for rising-edge detection.
    pub previous: Option<UserAction>,
    /// Recipe position. Written only by the arbiter task.
    pub cursor: usize,
    /// A cancel request arrived and has not been serviced yet.
    pub cancel_pending: bool,
    /// One of the latched console services is in flight.
    pub service_latch: bool,
    /// Rotation argument for the pending move goal, degrees.
    pub yaw: f64,
    /// Recipe step dispatch is deferred until this deadline while the
    /// console settles on the step's mode.
    pub settle_until: Option<Instant>,

    /// Capture handshake state.
    pub gate: ScanGate,
    /// Deadline after which the scan-trigger flag drops.
    pub scan_pulse: Option<Instant>,
    /// Deadline after which the apply-config flag drops.
    pub apply_pulse: Option<Instant>,
}

impl SharedControlState {
    pub fn new() -> Self {
        Self {
            command: ConsoleCommand::default(),
            status: ProbeStatus::default(),
            current: None,
            previous: None,
            cursor: 0,
            cancel_pending: false,
            service_latch: false,
            yaw: 0.0,
            settle_until: None,
            gate: ScanGate::new(),
            scan_pulse: None,
            apply_pulse: None,
        }
    }

    /// Store a fresh inbound snapshot. Returns true when it differs from
    /// the previous one (the caller change-logs on that).
    ///
    /// A set `cancel` flag is folded into `cancel_pending` and clears the
    /// stored autofocus request, so a held autofocus does not immediately
    /// re-dispatch after the cancel is serviced.
    pub fn ingest_command(&mut self, cmd: ConsoleCommand) -> bool {
        let changed = cmd != self.command;
        self.command = cmd;
        if self.command.cancel {
            self.cancel_pending = true;
            self.command.autofocus = false;
        }
        changed
    }

    /// Replace the status message.
    pub fn set_message(&mut self, text: impl Into<String>) {
        self.status.message = text.into();
    }

    /// Append a line to the status message.
    pub fn append_message(&mut self, text: &str) {
        if !self.status.message.is_empty() {
            self.status.message.push('\n');
        }
        self.status.message.push_str(text);
    }

    /// Raise the scan-trigger flag and arm its minimum-width deadline.
    pub fn arm_scan_pulse(&mut self, now: Instant, width: Duration) {
        self.status.scan_trigger = true;
        self.scan_pulse = Some(now + width);
    }

    /// Raise the apply-config flag and arm its minimum-width deadline.
    pub fn arm_apply_pulse(&mut self, now: Instant, width: Duration) {
        self.status.apply_config = true;
        self.apply_pulse = Some(now + width);
    }

    /// Drop pulse flags whose deadline has passed. The gate state is not
    /// touched; a capture stays Busy until its mirror flips.
    pub fn expire_pulses(&mut self, now: Instant) {
        if self.scan_pulse.is_some_and(|deadline| now >= deadline) {
            self.status.scan_trigger = false;
            self.scan_pulse = None;
        }
        if self.apply_pulse.is_some_and(|deadline| now >= deadline) {
            self.status.apply_config = false;
            self.apply_pulse = None;
        }
    }
}

impl Default for SharedControlState {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared-state handle passed between tasks.
pub type SharedState = Arc<Mutex<SharedControlState>>;

/// Readiness channels derived from the inbound command stream.
///
/// Services and the focus loop wait on these instead of polling the
/// shared state: the sync task publishes every fresh snapshot's mirror
/// fields here, and `watch::Receiver::wait_for` turns "poll until the
/// console confirms" into a single bounded await.
#[derive(Debug)]
pub struct Signals {
    scan_3d: watch::Sender<bool>,
    autofocus: watch::Sender<bool>,
    mode: watch::Sender<Mode>,
}

impl Signals {
    pub fn new() -> Self {
        Self {
            scan_3d: watch::Sender::new(false),
            autofocus: watch::Sender::new(false),
            mode: watch::Sender::new(Mode::Robot),
        }
    }

    /// Publish the mirror fields of a stored command snapshot.
    pub fn update_from(&self, cmd: &ConsoleCommand) {
        update(&self.scan_3d, cmd.scan_3d);
        update(&self.autofocus, cmd.autofocus);
        update(&self.mode, cmd.mode);
    }

    pub fn subscribe_scan_3d(&self) -> watch::Receiver<bool> {
        self.scan_3d.subscribe()
    }

    pub fn subscribe_autofocus(&self) -> watch::Receiver<bool> {
        self.autofocus.subscribe()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<Mode> {
        self.mode.subscribe()
    }
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

fn update<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    });
}

/// Bundle of handles every component works against.
#[derive(Debug, Clone)]
pub struct ControlContext {
    pub state: SharedState,
    pub signals: Arc<Signals>,
    pub config: Arc<CoordinatorConfig>,
}

impl ControlContext {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedControlState::new())),
            signals: Arc::new(Signals::new()),
            config: Arc::new(config),
        }
    }

    /// Store an inbound snapshot and refresh the readiness signals.
    /// Returns true when the snapshot differed from the stored one.
    pub fn ingest_command(&self, cmd: ConsoleCommand) -> bool {
        let (changed, stored) = {
            let mut state = self.state.lock();
            let changed = state.ingest_command(cmd);
            (changed, state.command.clone())
        };
        self.signals.update_from(&stored);
        changed
    }
}
