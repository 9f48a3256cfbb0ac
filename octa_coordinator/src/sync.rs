//! Console synchronisation.
//!
//! One task owns the console transport: it publishes the status
//! snapshot every period regardless of change, and folds inbound
//! command snapshots into the shared state as they arrive. Change
//! detection only gates the logging, never the publishing, so a console
//! that joins late still sees the current state within one period.

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use octa_common::console::{ConsoleCommand, ProbeStatus};

use crate::error::LinkError;
use crate::state::ControlContext;

/// Transport seam to the operator console.
///
/// `recv_command` must be cancel-safe: the sync loop races it against
/// the publish ticker and drops the losing future.
pub trait ConsoleLink: Clone + Send + Sync + 'static {
    /// Publish one outbound status snapshot.
    fn publish(&self, status: &ProbeStatus) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Receive the next inbound command snapshot.
    fn recv_command(&self) -> impl Future<Output = Result<ConsoleCommand, LinkError>> + Send;
}

/// Publish/receive loop over one console link.
pub struct ConsoleSync<L> {
    ctx: ControlContext,
    link: L,
}

impl<L: ConsoleLink> ConsoleSync<L> {
    pub fn new(ctx: ControlContext, link: L) -> Self {
        Self { ctx, link }
    }

    /// Run until the link closes.
    pub async fn run(self) {
        let mut ticker = interval(self.ctx.config.publish_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_published: Option<ProbeStatus> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let status = self.ctx.state.lock().status.clone();
                    if last_published.as_ref() != Some(&status) {
                        info!(
                            angle = status.angle,
                            circle = status.circle,
                            mode = status.mode.label(),
                            "[publishing] {}",
                            status.message
                        );
                    }
                    match self.link.publish(&status).await {
                        Ok(()) => last_published = Some(status),
                        Err(LinkError::Closed) => {
                            warn!("console link closed; sync stopping");
                            return;
                        }
                        Err(err) => warn!(%err, "status publish failed"),
                    }
                }
                inbound = self.link.recv_command() => {
                    match inbound {
                        Ok(cmd) => {
                            let snapshot = cmd.clone();
                            if self.ctx.ingest_command(cmd) {
                                info!(?snapshot, "console command updated");
                            }
                        }
                        Err(LinkError::Closed) => {
                            warn!("console link closed; sync stopping");
                            return;
                        }
                        Err(err) => warn!(%err, "command receive failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex as TokioMutex;
    use tokio::sync::mpsc;

    #[derive(Clone)]
    struct ChannelLink {
        out: mpsc::UnboundedSender<ProbeStatus>,
        inbound: Arc<TokioMutex<mpsc::UnboundedReceiver<ConsoleCommand>>>,
    }

    impl ConsoleLink for ChannelLink {
        async fn publish(&self, status: &ProbeStatus) -> Result<(), LinkError> {
            self.out.send(status.clone()).map_err(|_| LinkError::Closed)
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

    fn link() -> (
        ChannelLink,
        mpsc::UnboundedReceiver<ProbeStatus>,
        mpsc::UnboundedSender<ConsoleCommand>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let link = ChannelLink {
            out: out_tx,
            inbound: Arc::new(TokioMutex::new(in_rx)),
        };
        (link, out_rx, in_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_every_period() {
        let ctx = ControlContext::new(Default::default());
        let (link, mut out, _in_tx) = link();
        tokio::spawn(ConsoleSync::new(ctx.clone(), link).run());

        tokio::time::sleep(Duration::from_millis(16)).await;
        let mut published = 0;
        while out.try_recv().is_ok() {
            published += 1;
        }
        // First immediate tick plus three periods.
        assert!(published >= 3, "published only {published} snapshots");
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_snapshots_reach_the_shared_state() {
        let ctx = ControlContext::new(Default::default());
        let (link, _out, in_tx) = link();
        tokio::spawn(ConsoleSync::new(ctx.clone(), link).run());

        let mut cmd = ConsoleCommand::default();
        cmd.autofocus = true;
        in_tx.send(cmd).unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;

        assert!(ctx.state.lock().command.autofocus);
        assert!(*ctx.signals.subscribe_autofocus().borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_link_stops_the_task() {
        let ctx = ControlContext::new(Default::default());
        let (link, out, _in_tx) = link();
        let task = tokio::spawn(ConsoleSync::new(ctx, link).run());

        drop(out);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(task.is_finished());
    }
}
