//! Hand-guiding switch.

use std::sync::Arc;

use tokio::time::timeout;
use tracing::info;

use crate::config::CoordinatorConfig;
use crate::error::ActionError;
use crate::lifecycle::{CancelToken, EventSink};
use crate::planning::MotionSystem;

/// Switches the motion stack's hand-guiding mode on or off.
#[derive(Clone)]
pub struct FreedriveExecutor<M> {
    motion: M,
    config: Arc<CoordinatorConfig>,
}

impl<M: MotionSystem> FreedriveExecutor<M> {
    pub fn new(motion: M, config: Arc<CoordinatorConfig>) -> Self {
        Self { motion, config }
    }

    pub async fn run(
        &self,
        enable: bool,
        token: CancelToken,
        _sink: EventSink,
    ) -> Result<String, ActionError> {
        token.check()?;
        info!(enable, "switching freedrive");
        let bound = self.config.service_timeout();
        match timeout(bound, self.motion.set_freedrive(enable)).await {
            Ok(Ok(())) => Ok(if enable {
                "Freedrive enabled".to_owned()
            } else {
                "Freedrive disabled".to_owned()
            }),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(ActionError::Timeout {
                what: "freedrive switch",
                after: bound,
            }),
        }
    }
}
