//! Simulated rig: motion, vision and console for the coordinator.
//!
//! The imaged target is a plane below the probe. Frames report it in
//! pixel units relative to the current pose, so the focus loop behaves
//! the way it does on hardware: a depth offset shows up in the box
//! center, a relative tilt in the box rotation, and after a corrective
//! move the next measurement reads level. The console half answers
//! every handshake the arbiter issues: it follows the imaging mode,
//! confirms 3D-capture requests, acknowledges scan pulses by toggling
//! its trigger mirror, and drops the autofocus request once a raised
//! end flag is published.

use std::sync::Arc;
use std::time::Duration;

use nalgebra::{Point3, Rotation3, Vector3};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::mpsc;
use tokio::time::sleep;

use octa_common::console::{ConsoleCommand, ProbeStatus};
use octa_common::consts::FRAME_GATING;

use crate::error::{LinkError, MotionError, VisionError};
use crate::planning::{Envelope, MotionSystem, PlanPipeline, ProbePose, Trajectory};
use crate::sync::ConsoleLink;
use crate::vision::{Frame, VisionSystem};

/// Probe-to-surface standoff that reads as in focus [m].
pub const SIM_STANDOFF_M: f64 = 0.01;

/// Console depth setpoint matching [`SIM_STANDOFF_M`] at the stock
/// 55 px/mm image scale.
pub const SIM_Z_HEIGHT_PX: f64 = 550.0;

// ─── Rig ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct RigState {
    pose: ProbePose,
    home: ProbePose,
    surface_z: f64,
    surface_roll: f64,
    surface_pitch: f64,
    freedrive: bool,
    fail_plan: bool,
    fail_execute: bool,
    fail_capture: bool,
    moves: u32,
    halts: u32,
}

/// Shared simulated hardware. Clones hand out the motion and vision
/// views; tests keep one handle to steer failures and inspect the pose.
#[derive(Debug, Clone)]
pub struct SimRig {
    inner: Arc<Mutex<RigState>>,
}

impl SimRig {
    /// Level surface at the in-focus standoff. Nothing to correct.
    pub fn level() -> Self {
        Self::with_surface(0.0, 0.0, 0.0)
    }

    /// Tilted surface with a depth offset from the in-focus standoff.
    /// The focus loop has to correct both before it converges.
    pub fn with_surface(roll_deg: f64, pitch_deg: f64, depth_offset_mm: f64) -> Self {
        let home = ProbePose::default();
        Self {
            inner: Arc::new(Mutex::new(RigState {
                pose: home,
                home,
                surface_z: -SIM_STANDOFF_M + depth_offset_mm / 1000.0,
                surface_roll: roll_deg.to_radians(),
                surface_pitch: pitch_deg.to_radians(),
                freedrive: false,
                fail_plan: false,
                fail_execute: false,
                fail_capture: false,
                moves: 0,
                halts: 0,
            })),
        }
    }

    pub fn motion(&self) -> SimMotion {
        SimMotion { rig: self.clone() }
    }

    pub fn vision(&self, px_per_mm: f64) -> SimVision {
        SimVision {
            rig: self.clone(),
            px_per_mm,
        }
    }

    pub fn pose(&self) -> ProbePose {
        self.inner.lock().pose
    }

    pub fn freedrive(&self) -> bool {
        self.inner.lock().freedrive
    }

    /// Executed trajectories, homing included.
    pub fn moves(&self) -> u32 {
        self.inner.lock().moves
    }

    pub fn halts(&self) -> u32 {
        self.inner.lock().halts
    }

    pub fn fail_planning(&self, fail: bool) {
        self.inner.lock().fail_plan = fail;
    }

    pub fn fail_execution(&self, fail: bool) {
        self.inner.lock().fail_execute = fail;
    }

    pub fn fail_capture(&self, fail: bool) {
        self.inner.lock().fail_capture = fail;
    }

    /// Depth error between the current standoff and the in-focus one [m].
    pub fn depth_error(&self) -> f64 {
        let state = self.inner.lock();
        (state.pose.position.z - state.surface_z) - SIM_STANDOFF_M
    }

    /// Roll/pitch error between the probe and the surface [rad].
    pub fn tilt_error(&self) -> (f64, f64) {
        let state = self.inner.lock();
        let (roll, pitch, _) = state.pose.orientation.euler_angles();
        (state.surface_roll - roll, state.surface_pitch - pitch)
    }
}

/// Surface patch as seen from the current pose: a 9x5 grid spanning
/// 400x200 px, rotated by however far the probe is from the surface
/// orientation and centered at the standoff depth. Half a pixel of
/// seeded depth noise keeps the cloud from being perfectly planar.
fn frame_points(state: &RigState, px_per_mm: f64, seq: u64) -> Vec<Point3<f64>> {
    let (probe_roll, probe_pitch, _) = state.pose.orientation.euler_angles();
    let roll_rel = state.surface_roll - probe_roll;
    let pitch_rel = state.surface_pitch - probe_pitch;
    // Box angles come out swapped in the probe frame (see
    // `alignment::measure`), so the relative tilt goes in pre-swapped.
    let tilt = Rotation3::from_euler_angles(pitch_rel, -roll_rel, 0.0);
    let depth_px = (state.pose.position.z - state.surface_z) * px_per_mm * 1000.0;

    let mut rng = StdRng::seed_from_u64(seq);
    let mut points = Vec::with_capacity(45);
    for xi in -4i32..=4 {
        for yi in -2i32..=2 {
            let noise = rng.gen_range(-0.5..0.5);
            let local = Vector3::new(f64::from(xi) * 50.0, f64::from(yi) * 50.0, noise);
            let p = tilt * local;
            points.push(Point3::new(p.x, p.y, p.z + depth_px));
        }
    }
    points
}

// ─── Motion ─────────────────────────────────────────────────────────

/// Motion view of a [`SimRig`].
#[derive(Debug, Clone)]
pub struct SimMotion {
    rig: SimRig,
}

impl MotionSystem for SimMotion {
    async fn current_pose(&self) -> ProbePose {
        self.rig.inner.lock().pose
    }

    async fn plan(
        &self,
        target: ProbePose,
        envelope: Envelope,
        pipeline: PlanPipeline,
    ) -> Result<Trajectory, MotionError> {
        sleep(Duration::from_millis(2)).await;
        let start = {
            let state = self.rig.inner.lock();
            if state.fail_plan {
                return Err(MotionError::Planning(format!(
                    "{} pipeline rejected the target",
                    pipeline.label()
                )));
            }
            state.pose
        };
        if !envelope.contains(&target.position) {
            return Err(MotionError::Planning(
                "target outside the motion envelope".into(),
            ));
        }
        let waypoints = match pipeline {
            // The joint-space path detours through a lifted midpoint, so
            // the straight-line candidate wins the length comparison.
            PlanPipeline::Ptp => {
                let mid = Point3::from(
                    (start.position.coords + target.position.coords) * 0.5
                        + Vector3::new(0.0, 0.0, 0.002),
                );
                vec![start, ProbePose::new(mid, start.orientation), target]
            }
            PlanPipeline::Lin => vec![start, target],
        };
        Ok(Trajectory {
            pipeline,
            waypoints,
        })
    }

    async fn execute(&self, trajectory: Trajectory) -> Result<(), MotionError> {
        sleep(Duration::from_millis(5)).await;
        let mut state = self.rig.inner.lock();
        if state.fail_execute {
            return Err(MotionError::Execution(
                "controller rejected the trajectory".into(),
            ));
        }
        if let Some(pose) = trajectory.final_pose() {
            state.pose = *pose;
        }
        state.moves += 1;
        Ok(())
    }

    async fn halt(&self) {
        self.rig.inner.lock().halts += 1;
    }

    async fn set_freedrive(&self, enable: bool) -> Result<(), MotionError> {
        self.rig.inner.lock().freedrive = enable;
        Ok(())
    }

    async fn reset_home(&self) -> Result<(), MotionError> {
        sleep(Duration::from_millis(10)).await;
        let mut state = self.rig.inner.lock();
        state.pose = state.home;
        state.moves += 1;
        Ok(())
    }
}

// ─── Vision ─────────────────────────────────────────────────────────

/// Vision view of a [`SimRig`].
#[derive(Debug, Clone)]
pub struct SimVision {
    rig: SimRig,
    px_per_mm: f64,
}

impl VisionSystem for SimVision {
    async fn next_frame(&self, last_seq: u64) -> Result<Frame, VisionError> {
        sleep(FRAME_GATING).await;
        let state = self.rig.inner.lock();
        if state.fail_capture {
            return Err(VisionError::Capture("frame source offline".into()));
        }
        let seq = last_seq + 1;
        Ok(Frame {
            seq,
            points: frame_points(&state, self.px_per_mm, seq),
        })
    }

    async fn reconstruct(&self, frames: &[Frame]) -> Result<Vec<Point3<f64>>, VisionError> {
        if frames.is_empty() {
            return Err(VisionError::Reconstruction("no frames to merge".into()));
        }
        Ok(frames
            .iter()
            .flat_map(|frame| frame.points.iter().copied())
            .collect())
    }

    async fn capture_background(&self) -> Result<(), VisionError> {
        if self.rig.inner.lock().fail_capture {
            return Err(VisionError::Capture("frame source offline".into()));
        }
        sleep(Duration::from_millis(5)).await;
        Ok(())
    }
}

// ─── Console ────────────────────────────────────────────────────────

#[derive(Debug)]
struct ConsoleState {
    command: ConsoleCommand,
    last_status: Option<ProbeStatus>,
    trigger_seen: bool,
    apply_seen: bool,
    scans: u32,
    applies: u32,
    saw_full_scan: bool,
}

/// Scripted operator console.
///
/// Every published status is answered with a fresh command snapshot
/// that keeps the handshakes moving. Tests and the demo binary steer it
/// through [`SimConsole::press`].
#[derive(Debug, Clone)]
pub struct SimConsole {
    state: Arc<Mutex<ConsoleState>>,
    outbound: mpsc::UnboundedSender<ConsoleCommand>,
    inbound: Arc<TokioMutex<mpsc::UnboundedReceiver<ConsoleCommand>>>,
}

impl SimConsole {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(Mutex::new(ConsoleState {
                command: ConsoleCommand::default(),
                last_status: None,
                trigger_seen: false,
                apply_seen: false,
                scans: 0,
                applies: 0,
                saw_full_scan: false,
            })),
            outbound: tx,
            inbound: Arc::new(TokioMutex::new(rx)),
        }
    }

    /// Operator input: mutate the command and send the snapshot right
    /// away instead of waiting for the next published status.
    pub fn press(&self, input: impl FnOnce(&mut ConsoleCommand)) {
        let snapshot = {
            let mut console = self.state.lock();
            input(&mut console.command);
            console.command.clone()
        };
        let _ = self.outbound.send(snapshot);
    }

    /// Last status snapshot the coordinator published.
    pub fn last_status(&self) -> Option<ProbeStatus> {
        self.state.lock().last_status.clone()
    }

    /// Acknowledged scan pulses.
    pub fn scans(&self) -> u32 {
        self.state.lock().scans
    }

    /// Observed apply-config pulses.
    pub fn applies(&self) -> u32 {
        self.state.lock().applies
    }

    /// Console-side command as the operator and the UI currently hold it.
    pub fn command(&self) -> ConsoleCommand {
        self.state.lock().command.clone()
    }
}

impl Default for SimConsole {
    fn default() -> Self {
        Self::new()
    }
}

/// Console link that prints each outbound snapshot as one JSON line
/// and never produces inbound commands. Attach it alongside a real
/// console to watch the status stream from a shell.
#[derive(Debug, Clone, Copy)]
pub struct StdoutConsole;

impl ConsoleLink for StdoutConsole {
    async fn publish(&self, status: &ProbeStatus) -> Result<(), LinkError> {
        let line =
            serde_json::to_string(status).map_err(|err| LinkError::Encode(err.to_string()))?;
        println!("{line}");
        Ok(())
    }

    async fn recv_command(&self) -> Result<ConsoleCommand, LinkError> {
        std::future::pending().await
    }
}

impl ConsoleLink for SimConsole {
    async fn publish(&self, status: &ProbeStatus) -> Result<(), LinkError> {
        let snapshot = {
            let mut console = self.state.lock();

            console.command.mode = status.mode;
            console.command.scan_3d = status.scan_3d;

            // One acknowledge per trigger pulse: toggle the mirror on
            // the rising edge, re-arm once the pulse drops.
            if status.scan_trigger && !console.trigger_seen {
                console.trigger_seen = true;
                console.command.scan_trigger = !console.command.scan_trigger;
                console.scans += 1;
            } else if !status.scan_trigger {
                console.trigger_seen = false;
            }

            if status.apply_config && !console.apply_seen {
                console.apply_seen = true;
                console.applies += 1;
            } else if !status.apply_config {
                console.apply_seen = false;
            }

            // The console UI clears the focus button once the probe
            // reports the goal finished.
            if status.end_state {
                console.command.autofocus = false;
            }

            // Likewise the full-scan checkbox once a running scan stops.
            if status.full_scan {
                console.saw_full_scan = true;
            } else if console.saw_full_scan {
                console.saw_full_scan = false;
                console.command.full_scan = false;
            }

            console.last_status = Some(status.clone());
            console.command.clone()
        };
        self.outbound
            .send(snapshot)
            .map_err(|_| LinkError::Closed)?;
        Ok(())
    }

    async fn recv_command(&self) -> Result<ConsoleCommand, LinkError> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or(LinkError::Closed)
    }
}
