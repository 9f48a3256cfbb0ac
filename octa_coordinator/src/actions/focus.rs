//! Autofocus loop.
//!
//! One pass switches the console into 3D capture, collects a burst of
//! frames, switches capture back off, reconstructs the cloud, and fits
//! an oriented box to measure tilt and depth offset. Out-of-tolerance
//! axes produce a corrective move around the current pose; the loop runs
//! until both checks pass or the iteration cap trips. Plan and execute
//! failures inside a pass are reported as feedback and retried on the
//! next pass, everything else is terminal.

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, info};

use crate::actions::cancelable;
use crate::alignment;
use crate::config::CoordinatorConfig;
use crate::error::{ActionError, ServiceError};
use crate::lifecycle::{CancelToken, EventSink};
use crate::planning::{Envelope, MotionSystem, plan_shortest};
use crate::services::Services;
use crate::vision::{Frame, VisionSystem};

/// Tolerances and depth setpoint for one focus goal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusGoal {
    /// Acceptance bound on roll and pitch, degrees.
    pub angle_tolerance_deg: f64,
    /// Acceptance bound on the depth offset, millimeters.
    pub z_tolerance_mm: f64,
    /// Desired surface depth in the image, pixels.
    pub z_height_px: f64,
}

/// Runs the measure-correct loop against the motion and vision seams.
#[derive(Clone)]
pub struct FocusExecutor<M, V> {
    motion: M,
    vision: V,
    services: Services<V>,
    config: Arc<CoordinatorConfig>,
}

fn service_failure(what: &'static str, err: ServiceError) -> ActionError {
    match err {
        ServiceError::NotConfirmed(after) => ActionError::Timeout { what, after },
        ServiceError::Busy => ActionError::Execution(format!("{what}: {err}")),
    }
}

impl<M: MotionSystem, V: VisionSystem> FocusExecutor<M, V> {
    pub fn new(motion: M, vision: V, services: Services<V>, config: Arc<CoordinatorConfig>) -> Self {
        Self {
            motion,
            vision,
            services,
            config,
        }
    }

    pub async fn run(
        &self,
        goal: FocusGoal,
        mut token: CancelToken,
        sink: EventSink,
    ) -> Result<String, ActionError> {
        let result = self.execute(goal, &mut token, &sink).await;
        if matches!(result, Err(ActionError::Canceled)) {
            self.motion.halt().await;
        }
        result
    }

    async fn execute(
        &self,
        goal: FocusGoal,
        token: &mut CancelToken,
        sink: &EventSink,
    ) -> Result<String, ActionError> {
        let focus = &self.config.focus;
        info!(
            angle_tolerance = goal.angle_tolerance_deg,
            z_tolerance = goal.z_tolerance_mm,
            "focus loop started"
        );

        let mut angle_focused = false;
        let mut z_focused = false;
        // In skip mode the angle check passes after one corrective move
        // even when the measurement still disagrees.
        let mut corrective_pass = false;
        let mut last_seq = 0u64;
        let mut iterations = 0u32;

        while !(angle_focused && z_focused) {
            iterations += 1;
            if iterations > focus.max_iterations {
                return Err(ActionError::Execution(format!(
                    "focus loop exceeded {} iterations",
                    focus.max_iterations
                )));
            }
            token.check()?;

            let frames = self.collect_burst(token, sink, &mut last_seq).await?;

            let points = cancelable(token, self.vision.reconstruct(&frames)).await??;
            let sample = alignment::measure(&points, goal.z_height_px, focus.px_per_mm)?;
            sink.feedback(format!(
                "Calculated:\n    [Rotation] R:{:.2} P:{:.2} Y:{:.2}\n    [Center]   x:{:.2}  y:{:.2}  z:{:.2}\n    [Height]   dz:{:.4}",
                sample.roll.to_degrees(),
                sample.pitch.to_degrees(),
                sample.yaw.to_degrees(),
                sample.center.x,
                sample.center.y,
                sample.center.z,
                sample.dz * 1000.0,
            ));

            if alignment::angle_within_tolerance(sample.roll, sample.pitch, goal.angle_tolerance_deg)
            {
                angle_focused = true;
                sink.feedback("=> Angle focused");
            } else {
                if !focus.skip_angle_tolerance {
                    angle_focused = false;
                }
                if focus.skip_angle_tolerance && corrective_pass {
                    angle_focused = true;
                    corrective_pass = false;
                }
            }
            if alignment::height_within_tolerance(sample.dz, goal.z_tolerance_mm) {
                z_focused = true;
                sink.feedback("=> Height focused");
            } else {
                z_focused = false;
            }

            let current = self.motion.current_pose().await;
            let mut target = current;
            if angle_focused && !z_focused {
                corrective_pass = true;
                target.position.z += sample.dz;
            } else if !angle_focused {
                corrective_pass = true;
                target.orientation *= sample.correction_rotation();
                target.position.z += sample.dz;
            }

            if corrective_pass {
                if !focus.skip_angle_tolerance {
                    corrective_pass = false;
                }
                let envelope = Envelope::around(&current, self.config.motion.envelope_radius_m);
                let trajectory =
                    match cancelable(token, plan_shortest(&self.motion, target, envelope)).await? {
                        Ok(trajectory) => trajectory,
                        Err(err) => {
                            debug!(%err, "corrective plan rejected");
                            sink.feedback("Planning failed!");
                            continue;
                        }
                    };
                let bound = self.config.execute_timeout();
                match cancelable(token, timeout(bound, self.motion.execute(trajectory))).await? {
                    Ok(Ok(())) => {
                        if focus.early_terminate {
                            angle_focused = true;
                            z_focused = true;
                        }
                    }
                    Ok(Err(err)) => {
                        debug!(%err, "corrective move rejected");
                        sink.feedback("Execute Failed!");
                        continue;
                    }
                    Err(_) => {
                        return Err(ActionError::Timeout {
                            what: "trajectory execution",
                            after: bound,
                        });
                    }
                }
            }
        }

        info!(iterations, "within tolerance or early termination");
        token.check()?;
        Ok("Focus completed successfully".to_owned())
    }

    /// One capture burst: 3D scan on, `frame_count` fresh frames, 3D
    /// scan off again.
    async fn collect_burst(
        &self,
        token: &mut CancelToken,
        sink: &EventSink,
        last_seq: &mut u64,
    ) -> Result<Vec<Frame>, ActionError> {
        if let Err(err) = cancelable(token, self.services.set_capture_3d(true)).await? {
            return Err(service_failure("activate_3d_scan", err));
        }

        let bound = self.config.frame_timeout();
        let mut frames = Vec::with_capacity(self.config.focus.frame_count);
        for i in 0..self.config.focus.frame_count {
            let frame =
                match cancelable(token, timeout(bound, self.vision.next_frame(*last_seq))).await? {
                    Ok(Ok(frame)) => frame,
                    Ok(Err(err)) => return Err(err.into()),
                    Err(_) => {
                        return Err(ActionError::Timeout {
                            what: "image acquisition",
                            after: bound,
                        });
                    }
                };
            *last_seq = frame.seq;
            sink.feedback(format!("Collected image {}", i + 1));
            frames.push(frame);
        }

        if let Err(err) = cancelable(token, self.services.set_capture_3d(false)).await? {
            return Err(service_failure("deactivate_3d_scan", err));
        }
        Ok(frames)
    }
}
