//! Orbital move action.
//!
//! One goal rotates the probe about its optical axis by a yaw increment
//! and shifts it along the scan circle. The target is built from the
//! current pose, planned through both pipelines, and executed once; there
//! are no retries, a failed plan or execution aborts the goal.

use std::sync::Arc;

use nalgebra::UnitQuaternion;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::actions::cancelable;
use crate::config::CoordinatorConfig;
use crate::error::ActionError;
use crate::lifecycle::{CancelToken, EventSink};
use crate::planning::{Envelope, MotionSystem, plan_shortest};

/// One orbital step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveByAngleGoal {
    /// Yaw increment in degrees. Sign encodes direction.
    pub yaw_deg: f64,
    /// Scan circle radius in meters.
    pub radius: f64,
    /// Accumulated sweep angle in degrees before this step.
    pub angle_deg: f64,
}

/// Plans and executes one orbital step.
#[derive(Clone)]
pub struct MoveByAngleExecutor<M> {
    motion: M,
    config: Arc<CoordinatorConfig>,
}

impl<M: MotionSystem> MoveByAngleExecutor<M> {
    pub fn new(motion: M, config: Arc<CoordinatorConfig>) -> Self {
        Self { motion, config }
    }

    pub async fn run(
        &self,
        goal: MoveByAngleGoal,
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
        goal: MoveByAngleGoal,
        token: &mut CancelToken,
        sink: &EventSink,
    ) -> Result<String, ActionError> {
        token.check()?;
        info!(yaw = goal.yaw_deg, angle = goal.angle_deg, "move by angle");

        let current = self.motion.current_pose().await;
        let mut target = current;
        let spin = UnitQuaternion::from_euler_angles(0.0, 0.0, goal.yaw_deg.to_radians());
        target.orientation *= spin;
        let heading = goal.angle_deg.to_radians();
        target.position.x += goal.radius * heading.cos();
        target.position.y += goal.radius * heading.sin();

        let envelope = Envelope::around(&current, self.config.motion.envelope_radius_m);
        let trajectory = cancelable(token, plan_shortest(&self.motion, target, envelope)).await??;
        debug!(pipeline = trajectory.pipeline.label(), "trajectory planned");
        sink.feedback("Planning succeeded; starting execution.");

        token.check()?;
        let bound = self.config.execute_timeout();
        match cancelable(token, timeout(bound, self.motion.execute(trajectory))).await? {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                return Err(ActionError::Timeout {
                    what: "trajectory execution",
                    after: bound,
                });
            }
        }

        token.check()?;
        sink.feedback(format!(
            "Move completed; accumulated angle {:.1} deg",
            goal.angle_deg + goal.yaw_deg
        ));
        Ok("Move by angle completed".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use approx::assert_relative_eq;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use octa_common::action::{ActionKind, GoalStatus};

    use crate::error::MotionError;
    use crate::lifecycle::{ActionEvent, ActionOutcome, ActiveGoals, CancelReason};
    use crate::planning::{PlanPipeline, ProbePose, Trajectory};

    #[derive(Clone, Default)]
    struct OrbitRig {
        planned: Arc<Mutex<Option<ProbePose>>>,
        fail_plan: bool,
        fail_execute: bool,
        hold_execute: bool,
        halted: Arc<AtomicBool>,
    }

    impl MotionSystem for OrbitRig {
        async fn current_pose(&self) -> ProbePose {
            ProbePose::default()
        }

        async fn plan(
            &self,
            target: ProbePose,
            _envelope: Envelope,
            pipeline: PlanPipeline,
        ) -> Result<Trajectory, MotionError> {
            if self.fail_plan {
                return Err(MotionError::Planning("unreachable target".into()));
            }
            *self.planned.lock() = Some(target);
            Ok(Trajectory {
                pipeline,
                waypoints: vec![ProbePose::default(), target],
            })
        }

        async fn execute(&self, _trajectory: Trajectory) -> Result<(), MotionError> {
            if self.hold_execute {
                std::future::pending::<()>().await;
            }
            if self.fail_execute {
                return Err(MotionError::Execution("controller fault".into()));
            }
            Ok(())
        }

        async fn halt(&self) {
            self.halted.store(true, Ordering::SeqCst);
        }

        async fn set_freedrive(&self, _enable: bool) -> Result<(), MotionError> {
            Ok(())
        }

        async fn reset_home(&self) -> Result<(), MotionError> {
            Ok(())
        }
    }

    async fn next_terminal(rx: &mut mpsc::UnboundedReceiver<ActionEvent>) -> (GoalStatus, String) {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if let ActionOutcome::Terminal(status, text) = event.outcome {
                return (status, text);
            }
        }
    }

    fn dispatch(
        exec: &MoveByAngleExecutor<OrbitRig>,
        goals: &mut ActiveGoals,
        goal: MoveByAngleGoal,
    ) {
        let run = exec.clone();
        let _ = goals.dispatch(ActionKind::MoveByAngle, move |token, sink| async move {
            run.run(goal, token, sink).await
        });
    }

    #[tokio::test]
    async fn target_combines_spin_and_circle_shift() {
        let rig = OrbitRig::default();
        let exec = MoveByAngleExecutor::new(rig.clone(), Arc::new(Default::default()));
        let (mut goals, mut rx) = ActiveGoals::channel();

        dispatch(
            &exec,
            &mut goals,
            MoveByAngleGoal {
                yaw_deg: 10.0,
                radius: 0.02,
                angle_deg: 90.0,
            },
        );
        let (status, text) = next_terminal(&mut rx).await;
        assert_eq!(status, GoalStatus::Succeeded);
        assert_eq!(text, "Move by angle completed");

        let target = rig.planned.lock().take().unwrap();
        // heading 90 deg puts the whole shift on the y axis
        assert_relative_eq!(target.position.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(target.position.y, 0.02, epsilon = 1e-12);
        let (_, _, yaw) = target.orientation.euler_angles();
        assert_relative_eq!(yaw, 10f64.to_radians(), epsilon = 1e-9);
    }

    #[tokio::test]
    async fn planning_failure_aborts_without_execution() {
        let rig = OrbitRig {
            fail_plan: true,
            ..Default::default()
        };
        let exec = MoveByAngleExecutor::new(rig, Arc::new(Default::default()));
        let (mut goals, mut rx) = ActiveGoals::channel();

        dispatch(
            &exec,
            &mut goals,
            MoveByAngleGoal {
                yaw_deg: 10.0,
                radius: 0.02,
                angle_deg: 0.0,
            },
        );
        let (status, text) = next_terminal(&mut rx).await;
        assert_eq!(status, GoalStatus::Aborted);
        assert!(text.contains("planning failed"));
    }

    #[tokio::test]
    async fn execution_failure_aborts_after_planning_feedback() {
        let rig = OrbitRig {
            fail_execute: true,
            ..Default::default()
        };
        let exec = MoveByAngleExecutor::new(rig, Arc::new(Default::default()));
        let (mut goals, mut rx) = ActiveGoals::channel();

        dispatch(
            &exec,
            &mut goals,
            MoveByAngleGoal {
                yaw_deg: -10.0,
                radius: 0.02,
                angle_deg: 30.0,
            },
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first.outcome,
            ActionOutcome::Feedback("Planning succeeded; starting execution.".to_owned())
        );
        let (status, text) = next_terminal(&mut rx).await;
        assert_eq!(status, GoalStatus::Aborted);
        assert!(text.contains("controller fault"));
    }

    #[tokio::test]
    async fn cancel_mid_execution_halts_the_rig() {
        let rig = OrbitRig {
            hold_execute: true,
            ..Default::default()
        };
        let exec = MoveByAngleExecutor::new(rig.clone(), Arc::new(Default::default()));
        let (mut goals, mut rx) = ActiveGoals::channel();

        dispatch(
            &exec,
            &mut goals,
            MoveByAngleGoal {
                yaw_deg: 10.0,
                radius: 0.02,
                angle_deg: 0.0,
            },
        );
        // Let the goal reach execution, then cancel it.
        loop {
            let event = rx.recv().await.unwrap();
            if matches!(event.outcome, ActionOutcome::Feedback(_)) {
                break;
            }
        }
        assert!(goals.request_cancel(ActionKind::MoveByAngle, CancelReason::Operator));

        let (status, _) = next_terminal(&mut rx).await;
        assert_eq!(status, GoalStatus::Canceled);
        assert!(rig.halted.load(Ordering::SeqCst));
    }
}
