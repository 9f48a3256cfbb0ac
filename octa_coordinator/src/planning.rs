//! Motion seam: poses, planning candidates, trajectory selection.
//!
//! The coordinator never talks to a planner directly. It builds a target
//! pose plus a motion envelope, asks the [`MotionSystem`] seam for one
//! trajectory per candidate pipeline, and executes the shortest valid
//! one. Real planner internals stay behind the seam; the simulation in
//! [`crate::sim`] is enough for the binary and the tests.

use nalgebra::{Point3, UnitQuaternion};

use crate::error::MotionError;

/// Pose of the probe flange in the robot base frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbePose {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl ProbePose {
    pub fn new(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

impl Default for ProbePose {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

/// Planning candidate pipelines, tried concurrently for every move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanPipeline {
    /// Joint-space point-to-point.
    Ptp,
    /// Cartesian straight-line.
    Lin,
}

impl PlanPipeline {
    pub const ALL: [Self; 2] = [Self::Ptp, Self::Lin];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Ptp => "ptp",
            Self::Lin => "lin",
        }
    }
}

/// Spherical position bound around the motion start pose. Orientation is
/// left free up to `angular_tolerance` radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub center: Point3<f64>,
    pub radius: f64,
    pub angular_tolerance: f64,
}

impl Envelope {
    /// Envelope centered on the current pose with full orientation
    /// freedom. Built fresh before every plan request.
    pub fn around(pose: &ProbePose, radius: f64) -> Self {
        Self {
            center: pose.position,
            radius,
            angular_tolerance: std::f64::consts::PI,
        }
    }

    pub fn contains(&self, position: &Point3<f64>) -> bool {
        (position - self.center).norm() <= self.radius
    }
}

/// A planned path. Waypoint zero is the start pose.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub pipeline: PlanPipeline,
    pub waypoints: Vec<ProbePose>,
}

impl Trajectory {
    /// Sum of straight-line segment lengths, the selection metric.
    pub fn path_length(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|pair| (pair[1].position - pair[0].position).norm())
            .sum()
    }

    pub fn final_pose(&self) -> Option<&ProbePose> {
        self.waypoints.last()
    }
}

/// Seam to the motion planner and trajectory executor.
///
/// Futures are `Send` because executors run on spawned tasks.
pub trait MotionSystem: Clone + Send + Sync + 'static {
    /// Current flange pose.
    fn current_pose(&self) -> impl Future<Output = ProbePose> + Send;

    /// Plan a trajectory to `target` through one candidate pipeline.
    fn plan(
        &self,
        target: ProbePose,
        envelope: Envelope,
        pipeline: PlanPipeline,
    ) -> impl Future<Output = Result<Trajectory, MotionError>> + Send;

    /// Execute a previously planned trajectory to completion.
    fn execute(&self, trajectory: Trajectory) -> impl Future<Output = Result<(), MotionError>> + Send;

    /// Stop any in-flight execution. Used on cooperative cancel.
    fn halt(&self) -> impl Future<Output = ()> + Send;

    /// Switch the hand-guiding mode on or off.
    fn set_freedrive(&self, enable: bool) -> impl Future<Output = Result<(), MotionError>> + Send;

    /// Drive to the default posture.
    fn reset_home(&self) -> impl Future<Output = Result<(), MotionError>> + Send;
}

/// Plan through both candidate pipelines concurrently and keep the
/// shortest valid trajectory. Only when every candidate fails does the
/// whole request fail.
pub async fn plan_shortest<M: MotionSystem>(
    motion: &M,
    target: ProbePose,
    envelope: Envelope,
) -> Result<Trajectory, MotionError> {
    let (ptp, lin) = tokio::join!(
        motion.plan(target, envelope, PlanPipeline::Ptp),
        motion.plan(target, envelope, PlanPipeline::Lin),
    );
    match (ptp, lin) {
        (Ok(a), Ok(b)) => {
            if a.path_length() <= b.path_length() {
                Ok(a)
            } else {
                Ok(b)
            }
        }
        (Ok(a), Err(_)) => Ok(a),
        (Err(_), Ok(b)) => Ok(b),
        (Err(a), Err(b)) => Err(MotionError::Planning(format!(
            "no pipeline produced a valid trajectory (ptp: {a}; lin: {b})"
        ))),
    }
}
