//! Latched console services.
//!
//! Both inbound services share one request latch, mirroring the console
//! handshake: raise the outbound flag, pulse apply-config, then wait for
//! the console to mirror the requested state back. The wait rides the
//! readiness signals instead of polling, and the latch is released on
//! every exit so a timed-out request cannot wedge the next one. The idle
//! arbiter tick also drops the latch as a final backstop.

use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use octa_common::consts::BACKGROUND_TIMEOUT;

use crate::error::{ActionError, ServiceError};
use crate::state::ControlContext;
use crate::vision::VisionSystem;

/// Service surface of the coordinator.
#[derive(Debug, Clone)]
pub struct Services<V> {
    ctx: ControlContext,
    vision: V,
}

impl<V: VisionSystem> Services<V> {
    pub fn new(ctx: ControlContext, vision: V) -> Self {
        Self { ctx, vision }
    }

    /// Switch 3D capture on or off and wait for the console to confirm.
    ///
    /// Publishes `scan_3d = enable` on the status, then waits for the
    /// inbound mirror to match within the service bound. Confirmation
    /// pulses apply-config; activation additionally waits out the
    /// capture settle delay before returning.
    pub async fn set_capture_3d(&self, enable: bool) -> Result<(), ServiceError> {
        let bound = self.ctx.config.service_timeout();
        {
            let mut state = self.ctx.state.lock();
            if state.service_latch {
                return Err(ServiceError::Busy);
            }
            state.service_latch = true;
            state.status.scan_3d = enable;
        }
        debug!(enable, "3D capture requested");

        let mut mirror = self.ctx.signals.subscribe_scan_3d();
        // Map the watch::Ref away before matching: the guard it holds is
        // not Send and must not live across the settle-delay await below.
        let confirmed = timeout(bound, mirror.wait_for(|&v| v == enable))
            .await
            .map(|res| res.map(|_| ()));
        match confirmed {
            Ok(Ok(_)) => {
                {
                    let mut state = self.ctx.state.lock();
                    let pulse = self.ctx.config.gate_pulse();
                    state.arm_apply_pulse(Instant::now(), pulse);
                }
                if enable {
                    tokio::time::sleep(self.ctx.config.capture_settle()).await;
                }
                self.ctx.state.lock().service_latch = false;
                Ok(())
            }
            _ => {
                warn!(enable, "3D capture request not confirmed");
                self.ctx.state.lock().service_latch = false;
                Err(ServiceError::NotConfirmed(bound))
            }
        }
    }

    /// Tell the console the focus routine is over and wait for it to
    /// drop its autofocus request.
    ///
    /// Raises `end_state`, pulses apply-config, then waits for the
    /// inbound autofocus mirror to clear within the service bound; on
    /// confirmation `end_state` drops again.
    pub async fn deactivate_focus(&self) -> Result<(), ServiceError> {
        let bound = self.ctx.config.service_timeout();
        {
            let mut state = self.ctx.state.lock();
            if state.service_latch {
                return Err(ServiceError::Busy);
            }
            state.service_latch = true;
            state.status.end_state = true;
            let pulse = self.ctx.config.gate_pulse();
            state.arm_apply_pulse(Instant::now(), pulse);
        }
        debug!("focus deactivation requested");

        let mut mirror = self.ctx.signals.subscribe_autofocus();
        match timeout(bound, mirror.wait_for(|&autofocus| !autofocus)).await {
            Ok(Ok(_)) => {
                let mut state = self.ctx.state.lock();
                state.status.end_state = false;
                state.service_latch = false;
                Ok(())
            }
            _ => {
                warn!("focus deactivation not confirmed");
                self.ctx.state.lock().service_latch = false;
                Err(ServiceError::NotConfirmed(bound))
            }
        }
    }

    /// Record a background reference on the imaging backend.
    pub async fn capture_background(&self) -> Result<(), ActionError> {
        match timeout(BACKGROUND_TIMEOUT, self.vision.capture_background()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(ActionError::Timeout {
                what: "capture_background",
                after: BACKGROUND_TIMEOUT,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    use octa_common::console::ConsoleCommand;

    use crate::config::{CoordinatorConfig, load_config_from_str};
    use crate::error::VisionError;
    use crate::vision::Frame;

    #[derive(Clone)]
    struct NoopVision;

    impl VisionSystem for NoopVision {
        async fn next_frame(&self, last_seq: u64) -> Result<Frame, VisionError> {
            Ok(Frame {
                seq: last_seq + 1,
                points: Vec::new(),
            })
        }

        async fn reconstruct(&self, _frames: &[Frame]) -> Result<Vec<Point3<f64>>, VisionError> {
            Ok(Vec::new())
        }

        async fn capture_background(&self) -> Result<(), VisionError> {
            Ok(())
        }
    }

    fn services(config: CoordinatorConfig) -> (ControlContext, Services<NoopVision>) {
        let ctx = ControlContext::new(config);
        (ctx.clone(), Services::new(ctx, NoopVision))
    }

    #[tokio::test(start_paused = true)]
    async fn capture_activation_confirms_on_mirror() {
        let (ctx, services) = services(CoordinatorConfig::default());

        let call = tokio::spawn({
            let services = services.clone();
            async move { services.set_capture_3d(true).await }
        });
        tokio::task::yield_now().await;
        assert!(ctx.state.lock().status.scan_3d);
        assert!(ctx.state.lock().service_latch);

        let mut cmd = ConsoleCommand::default();
        cmd.scan_3d = true;
        ctx.ingest_command(cmd);

        call.await.unwrap().unwrap();
        let state = ctx.state.lock();
        assert!(state.status.apply_config);
        assert!(!state.service_latch);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_request_times_out_without_confirmation() {
        let (ctx, services) = services(CoordinatorConfig::default());

        let result = services.set_capture_3d(true).await;
        assert!(matches!(result, Err(ServiceError::NotConfirmed(_))));
        // Latch released so the next request is not wedged.
        assert!(!ctx.state.lock().service_latch);
    }

    #[tokio::test(start_paused = true)]
    async fn deactivation_confirms_when_mirror_clears() {
        let (ctx, services) = services(CoordinatorConfig::default());

        let mut cmd = ConsoleCommand::default();
        cmd.scan_3d = true;
        ctx.ingest_command(cmd.clone());

        let call = tokio::spawn({
            let services = services.clone();
            async move { services.set_capture_3d(false).await }
        });
        tokio::task::yield_now().await;

        cmd.scan_3d = false;
        ctx.ingest_command(cmd);

        call.await.unwrap().unwrap();
        assert!(!ctx.state.lock().status.scan_3d);
    }

    #[tokio::test(start_paused = true)]
    async fn latched_service_rejects_a_second_request() {
        let (ctx, services) = services(CoordinatorConfig::default());
        ctx.state.lock().service_latch = true;

        let result = services.set_capture_3d(true).await;
        assert!(matches!(result, Err(ServiceError::Busy)));
        let result = services.deactivate_focus().await;
        assert!(matches!(result, Err(ServiceError::Busy)));
    }

    #[tokio::test(start_paused = true)]
    async fn focus_deactivation_waits_for_autofocus_to_drop() {
        let (ctx, services) = services(CoordinatorConfig::default());

        let mut cmd = ConsoleCommand::default();
        cmd.autofocus = true;
        ctx.ingest_command(cmd.clone());

        let call = tokio::spawn({
            let services = services.clone();
            async move { services.deactivate_focus().await }
        });
        tokio::task::yield_now().await;
        assert!(ctx.state.lock().status.end_state);

        cmd.autofocus = false;
        ctx.ingest_command(cmd);

        call.await.unwrap().unwrap();
        let state = ctx.state.lock();
        assert!(!state.status.end_state);
        assert!(!state.service_latch);
    }

    #[tokio::test(start_paused = true)]
    async fn focus_deactivation_times_out_while_autofocus_is_held() {
        let config = load_config_from_str(
            r#"
[timing]
service_timeout_s = 0.2
"#,
        )
        .unwrap();
        let (ctx, services) = services(config);

        let mut cmd = ConsoleCommand::default();
        cmd.autofocus = true;
        ctx.ingest_command(cmd);

        let result = services.deactivate_focus().await;
        assert!(matches!(result, Err(ServiceError::NotConfirmed(_))));
        // end_state stays raised; the console still owes an acknowledge.
        assert!(ctx.state.lock().status.end_state);
        assert!(!ctx.state.lock().service_latch);
    }

    #[tokio::test]
    async fn background_capture_passes_through() {
        let (_ctx, services) = services(CoordinatorConfig::default());
        services.capture_background().await.unwrap();
    }
}
