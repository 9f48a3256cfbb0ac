//! Return-to-home action.

use std::sync::Arc;

use tokio::time::timeout;
use tracing::info;

use crate::actions::cancelable;
use crate::config::CoordinatorConfig;
use crate::error::ActionError;
use crate::lifecycle::{CancelToken, EventSink};
use crate::planning::MotionSystem;

/// Drives the probe back to its default posture.
#[derive(Clone)]
pub struct ResetExecutor<M> {
    motion: M,
    config: Arc<CoordinatorConfig>,
}

impl<M: MotionSystem> ResetExecutor<M> {
    pub fn new(motion: M, config: Arc<CoordinatorConfig>) -> Self {
        Self { motion, config }
    }

    pub async fn run(
        &self,
        mut token: CancelToken,
        _sink: EventSink,
    ) -> Result<String, ActionError> {
        token.check()?;
        info!("reset to default position");
        let bound = self.config.reset_timeout();
        let outcome = cancelable(&mut token, timeout(bound, self.motion.reset_home())).await;
        match outcome {
            Ok(Ok(Ok(()))) => {
                token.check()?;
                Ok("Reset completed".to_owned())
            }
            Ok(Ok(Err(err))) => Err(err.into()),
            Ok(Err(_)) => Err(ActionError::Timeout {
                what: "reset motion",
                after: bound,
            }),
            Err(canceled) => {
                self.motion.halt().await;
                Err(canceled)
            }
        }
    }
}
