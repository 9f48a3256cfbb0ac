//! Action executors, one per goal kind.
//!
//! An executor's `run` future is what [`crate::lifecycle::ActiveGoals`]
//! spawns: it reports progress through the event sink and resolves to the
//! terminal result text, or to an [`ActionError`] that the lifecycle
//! wrapper maps onto the goal status. Executors observe cancellation at
//! every blocking boundary and stop the probe themselves before bailing
//! out with `Canceled`.

mod focus;
mod freedrive;
mod move_by_angle;
mod reset;

pub use focus::{FocusExecutor, FocusGoal};
pub use freedrive::FreedriveExecutor;
pub use move_by_angle::{MoveByAngleExecutor, MoveByAngleGoal};
pub use reset::ResetExecutor;

use std::sync::Arc;

use crate::config::CoordinatorConfig;
use crate::error::ActionError;
use crate::lifecycle::CancelToken;
use crate::planning::MotionSystem;
use crate::services::Services;
use crate::vision::VisionSystem;

/// Await `fut` unless cancellation is requested first.
///
/// The cancel arm is polled first, so a token that is already tripped
/// wins even when `fut` is immediately ready. The inner future is simply
/// dropped on cancel; any device teardown is the caller's job.
pub(crate) async fn cancelable<F: Future>(
    token: &mut CancelToken,
    fut: F,
) -> Result<F::Output, ActionError> {
    tokio::select! {
        biased;
        _ = token.canceled() => Err(ActionError::Canceled),
        out = fut => Ok(out),
    }
}

/// The four executors bundled for the arbiter's dispatch switch.
#[derive(Clone)]
pub struct Executors<M, V> {
    pub focus: FocusExecutor<M, V>,
    pub move_by_angle: MoveByAngleExecutor<M>,
    pub freedrive: FreedriveExecutor<M>,
    pub reset: ResetExecutor<M>,
}

impl<M: MotionSystem, V: VisionSystem> Executors<M, V> {
    pub fn new(
        motion: M,
        vision: V,
        services: Services<V>,
        config: Arc<CoordinatorConfig>,
    ) -> Self {
        Self {
            focus: FocusExecutor::new(motion.clone(), vision, services, config.clone()),
            move_by_angle: MoveByAngleExecutor::new(motion.clone(), config.clone()),
            freedrive: FreedriveExecutor::new(motion.clone(), config.clone()),
            reset: ResetExecutor::new(motion, config),
        }
    }
}
