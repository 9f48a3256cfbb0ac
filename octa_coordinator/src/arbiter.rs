//! Control arbiter.
//!
//! One task owns the control law. Every tick it drains the goal
//! lifecycle events and applies their state effects, then folds the
//! latest command snapshot into at most one current action: cancel
//! first, then the scripted full scan, then the manual request flags in
//! fixed priority. Dispatch is rising-edge gated on the current action
//! changing, so a held flag fires once per goal, not once per tick.
//!
//! The arbiter is the only writer of the recipe cursor and the action
//! bookkeeping; executors and services only ever touch their own slice
//! of the shared state.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use octa_common::action::{ActionKind, GoalStatus, UserAction};
use octa_common::consts::ANGLE_EPSILON;
use octa_common::recipe::{FULL_SCAN, RecipeStep, StepAction};

use crate::actions::{Executors, FocusGoal, MoveByAngleGoal};
use crate::lifecycle::{ActionEvent, ActionOutcome, ActiveGoals, CancelReason};
use crate::planning::MotionSystem;
use crate::services::Services;
use crate::state::ControlContext;
use crate::vision::VisionSystem;

/// Tick-driven action arbiter.
pub struct Arbiter<M, V> {
    ctx: ControlContext,
    executors: Executors<M, V>,
    services: Services<V>,
    goals: ActiveGoals,
    events: UnboundedReceiver<ActionEvent>,
    recipe: &'static [RecipeStep],
}

impl<M: MotionSystem, V: VisionSystem> Arbiter<M, V> {
    pub fn new(ctx: ControlContext, motion: M, vision: V) -> Self {
        let services = Services::new(ctx.clone(), vision.clone());
        let executors = Executors::new(motion, vision, services.clone(), ctx.config.clone());
        let (goals, events) = ActiveGoals::channel();
        Self {
            ctx,
            executors,
            services,
            goals,
            events,
            recipe: FULL_SCAN,
        }
    }

    /// Swap the scripted recipe. Tests drive short scripts through the
    /// same player the full scan uses.
    pub fn with_recipe(mut self, recipe: &'static [RecipeStep]) -> Self {
        self.recipe = recipe;
        self
    }

    /// Run the tick loop forever. Late ticks are skipped, not bunched.
    pub async fn run(mut self) {
        let mut ticker = interval(self.ctx.config.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period = ?self.ctx.config.tick(), "arbiter running");
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One arbiter pass: queued lifecycle events first, then the
    /// control-law step on the resulting state.
    pub async fn tick(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply_event(event).await;
        }
        self.step();
    }

    async fn apply_event(&mut self, event: ActionEvent) {
        match event.outcome {
            ActionOutcome::Feedback(text) => {
                debug!(goal = %event.id, "{text}");
                self.ctx.state.lock().append_message(&text);
            }
            ActionOutcome::Terminal(status, text) => {
                let claimed = self.goals.on_terminal(event.kind, event.id);
                info!(
                    goal = %event.id,
                    kind = event.kind.label(),
                    ?status,
                    stale = claimed.is_none(),
                    "goal finished"
                );
                self.ctx.state.lock().append_message(&text);
                // Stale terminals belong to goals preempted out of the
                // slot; their text is kept but their effects are not.
                let Some(handle) = claimed else { return };
                handle.join().await;
                self.finish(event.kind, status).await;
            }
        }
    }

    /// State effects of a tracked goal reaching its terminal state.
    async fn finish(&self, kind: ActionKind, status: GoalStatus) {
        let succeeded = status == GoalStatus::Succeeded;
        match kind {
            ActionKind::Focus => {
                let mut state = self.ctx.state.lock();
                state.current = None;
                state.previous = None;
                // Raised on every terminal; the console acknowledges by
                // dropping its autofocus request.
                state.status.end_state = true;
                if succeeded && state.command.full_scan {
                    state.cursor += 1;
                }
            }
            ActionKind::MoveByAngle => {
                let mut state = self.ctx.state.lock();
                state.current = None;
                state.previous = None;
                if succeeded {
                    let yaw = state.yaw;
                    state.status.circle += if yaw > 0.0 { 1 } else { -1 };
                    state.status.angle += yaw;
                    if state.status.angle.abs() < ANGLE_EPSILON {
                        state.status.circle = 1;
                    }
                    if state.command.full_scan {
                        state.cursor += 1;
                    }
                }
            }
            ActionKind::Reset => {
                {
                    let mut state = self.ctx.state.lock();
                    state.current = None;
                    state.previous = None;
                    let pulse = self.ctx.config.gate_pulse();
                    state.arm_apply_pulse(Instant::now(), pulse);
                }
                if succeeded {
                    match self.services.capture_background().await {
                        Ok(()) => self.ctx.state.lock().append_message("Background Captured"),
                        Err(err) => warn!(%err, "background capture failed"),
                    }
                }
            }
            // The dispatch switch owns the freedrive bookkeeping; the
            // terminal text is all the console needs.
            ActionKind::Freedrive => {}
        }
    }

    /// Synchronous control-law step over the locked state.
    fn step(&mut self) {
        let Self {
            ctx,
            executors,
            goals,
            recipe,
            ..
        } = self;
        let config = ctx.config.as_ref();
        let mut guard = ctx.state.lock();
        let state = &mut *guard;
        let now = Instant::now();
        state.expire_pulses(now);

        // ─── Cancel ─────────────────────────────────────────────────────

        if state.cancel_pending {
            state.cancel_pending = false;
            let canceled = goals.request_cancel_all(CancelReason::Operator);
            let mut lines: Vec<String> = canceled
                .iter()
                .map(|kind| format!("Canceling {} action", kind.label()))
                .collect();
            if state.command.full_scan || state.status.full_scan {
                lines.push("Canceling Full Scan action".to_owned());
                state.status.full_scan = false;
            }
            if !lines.is_empty() {
                info!(?canceled, "cancel requested");
                state.set_message(lines.join("\n"));
            }
            state.cursor = 0;
            state.current = None;
            state.previous = None;
            state.service_latch = false;
            state.settle_until = None;
            state.gate.force_idle();
            return;
        }

        // ─── Scripted full scan ─────────────────────────────────────────

        if state.command.full_scan {
            state.status.full_scan = true;
            let mirror = state.command.scan_trigger;
            state.gate.observe_mirror(mirror);

            if state.cursor >= recipe.len() {
                state.cursor = 0;
                state.status.full_scan = false;
                state.command.full_scan = false;
                state.set_message("Full Scan complete!");
                info!("full scan finished");
                return;
            }

            let step = recipe[state.cursor];
            state.status.mode = step.mode;
            let banner = format!(
                "Step [{}/{}]: {}, {}",
                state.cursor + 1,
                recipe.len(),
                step.action.label(),
                step.mode.label(),
            );
            state.set_message(banner);

            if state.command.mode != step.mode {
                // Console still switching modes; keep pushing the settle
                // window out until the mirror matches.
                state.settle_until = Some(now + config.recipe_settle());
                return;
            }
            if let Some(deadline) = state.settle_until {
                if now < deadline {
                    return;
                }
                state.settle_until = None;
            }

            state.yaw = step.arg;
            state.command.autofocus = step.action == StepAction::Focus;
            state.current = Some(match step.action {
                StepAction::Focus => UserAction::Focus,
                StepAction::MoveByAngle => UserAction::MoveNext,
                StepAction::Scan => UserAction::Scan,
            });
        } else {
            // Manual priority: freedrive, reset, autofocus, then the
            // move family. A latched current action keeps its claim.
            if state.command.freedrive {
                state.current = Some(UserAction::Freedrive);
            } else if state.command.reset {
                state.current = Some(UserAction::Reset);
            } else if state.command.autofocus {
                state.current = Some(UserAction::Focus);
            } else if state.command.next {
                state.current = Some(UserAction::MoveNext);
            } else if state.command.previous {
                state.current = Some(UserAction::MovePrevious);
            } else if state.command.home {
                state.current = Some(UserAction::MoveHome);
            }
        }

        // ─── Dispatch ───────────────────────────────────────────────────

        let edge = state.current != state.previous;
        match state.current {
            Some(UserAction::Freedrive) => {
                if state.command.freedrive {
                    if edge {
                        state.status.angle = 0.0;
                        state.status.circle = 1;
                        state.set_message("[Action] Freedrive Mode ON");
                        let exec = executors.freedrive.clone();
                        let _ = goals.dispatch(ActionKind::Freedrive, move |token, sink| {
                            async move { exec.run(true, token, sink).await }
                        });
                        state.previous = Some(UserAction::Freedrive);
                    }
                } else {
                    state.set_message("[Action] Freedrive Mode OFF");
                    let exec = executors.freedrive.clone();
                    let dispatched = goals.dispatch(ActionKind::Freedrive, move |token, sink| {
                        async move { exec.run(false, token, sink).await }
                    });
                    // A still-running enable goal rejects the disable;
                    // hold the claim and retry next tick.
                    if dispatched.is_some() {
                        state.current = None;
                        state.previous = None;
                    }
                }
            }
            Some(UserAction::Reset) => {
                if edge {
                    state.status.angle = 0.0;
                    state.status.circle = 1;
                    state.set_message(
                        "[Action] Reset to default position. It may take some time please wait.",
                    );
                    let exec = executors.reset.clone();
                    let _ = goals.dispatch(ActionKind::Reset, move |token, sink| async move {
                        exec.run(token, sink).await
                    });
                    state.previous = Some(UserAction::Reset);
                }
            }
            Some(UserAction::Focus) => {
                if state.command.autofocus && !state.status.end_state {
                    if edge {
                        let goal = FocusGoal {
                            angle_tolerance_deg: state.command.angle_tolerance,
                            z_tolerance_mm: state.command.z_tolerance,
                            z_height_px: state.command.z_height,
                        };
                        state.set_message("[Action] Focusing");
                        let exec = executors.focus.clone();
                        let _ = goals.dispatch(ActionKind::Focus, move |token, sink| async move {
                            exec.run(goal, token, sink).await
                        });
                        state.previous = Some(UserAction::Focus);
                    }
                } else if !state.status.end_state {
                    // Autofocus dropped while the goal is live.
                    state.set_message("Canceling Focus action");
                    state.status.end_state = true;
                    goals.request_cancel(ActionKind::Focus, CancelReason::Operator);
                } else if !state.command.autofocus && !goals.is_active(ActionKind::Focus) {
                    // Terminal applied and the request is gone; release
                    // the claim so the idle branch can clear end_state.
                    state.current = None;
                    state.previous = None;
                }
            }
            Some(action) if action.is_move() => {
                if edge {
                    if state.command.next || state.command.previous || state.command.home {
                        let increment = if state.command.num_points == 0 {
                            0.0
                        } else {
                            state.command.angle_limit / f64::from(state.command.num_points)
                        };
                        state.yaw = match action {
                            UserAction::MovePrevious => -increment,
                            UserAction::MoveHome => -state.status.angle,
                            _ => increment,
                        };
                        let verb = match action {
                            UserAction::MovePrevious => "Previous",
                            UserAction::MoveHome => "Home",
                            _ => "Next",
                        };
                        let yaw = state.yaw;
                        state.set_message(format!("[Action] {verb}: {yaw:.1}"));
                    }
                    if state.status.angle.abs() < ANGLE_EPSILON {
                        state.status.circle = 1;
                    }
                    let goal = MoveByAngleGoal {
                        yaw_deg: state.yaw,
                        radius: state.command.radius,
                        angle_deg: state.status.angle,
                    };
                    let exec = executors.move_by_angle.clone();
                    let _ = goals.dispatch(ActionKind::MoveByAngle, move |token, sink| {
                        async move { exec.run(goal, token, sink).await }
                    });
                    state.previous = Some(action);
                }
            }
            Some(UserAction::Scan) => {
                if edge {
                    if state.gate.is_idle() {
                        state.append_message("  [Action] Scanning");
                        let mirror = state.command.scan_trigger;
                        state.gate.begin_capture(mirror);
                        state.arm_scan_pulse(now, config.gate_pulse());
                        state.previous = Some(UserAction::Scan);
                    }
                } else if state.gate.is_idle() {
                    // Mirror flipped; the capture finished.
                    state.previous = None;
                    state.cursor += 1;
                }
            }
            Some(_) | None => {
                // Idle: follow the console, drop leftover handshakes.
                state.gate.force_idle();
                state.status.mode = state.command.mode;
                state.status.scan_3d = false;
                state.service_latch = false;
                if !state.command.autofocus {
                    state.status.end_state = false;
                }
                state.previous = None;
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use nalgebra::Point3;

    use octa_common::console::ConsoleCommand;
    use octa_common::mode::Mode;
    use octa_common::recipe::step;

    use crate::error::{MotionError, VisionError};
    use crate::planning::{Envelope, PlanPipeline, ProbePose, Trajectory};
    use crate::vision::Frame;

    #[derive(Clone, Default)]
    struct InstantRig {
        hold_execute: bool,
    }

    impl MotionSystem for InstantRig {
        async fn current_pose(&self) -> ProbePose {
            ProbePose::default()
        }

        async fn plan(
            &self,
            target: ProbePose,
            _envelope: Envelope,
            pipeline: PlanPipeline,
        ) -> Result<Trajectory, MotionError> {
            Ok(Trajectory {
                pipeline,
                waypoints: vec![ProbePose::default(), target],
            })
        }

        async fn execute(&self, _trajectory: Trajectory) -> Result<(), MotionError> {
            if self.hold_execute {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn halt(&self) {}

        async fn set_freedrive(&self, _enable: bool) -> Result<(), MotionError> {
            Ok(())
        }

        async fn reset_home(&self) -> Result<(), MotionError> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct IdleVision;

    impl VisionSystem for IdleVision {
        async fn next_frame(&self, _last_seq: u64) -> Result<Frame, VisionError> {
            std::future::pending::<()>().await;
            unreachable!()
        }

        async fn reconstruct(&self, _frames: &[Frame]) -> Result<Vec<Point3<f64>>, VisionError> {
            Ok(Vec::new())
        }

        async fn capture_background(&self) -> Result<(), VisionError> {
            Ok(())
        }
    }

    fn harness() -> (ControlContext, Arbiter<InstantRig, IdleVision>) {
        let ctx = ControlContext::new(Default::default());
        let arbiter = Arbiter::new(ctx.clone(), InstantRig::default(), IdleVision);
        (ctx, arbiter)
    }

    fn command(ctx: &ControlContext) -> ConsoleCommand {
        ctx.state.lock().command.clone()
    }

    #[tokio::test(start_paused = true)]
    async fn idle_tick_follows_the_console_mode() {
        let (ctx, mut arbiter) = harness();
        let mut cmd = command(&ctx);
        cmd.mode = Mode::Octa;
        ctx.ingest_command(cmd);

        arbiter.tick().await;
        let state = ctx.state.lock();
        assert_eq!(state.status.mode, Mode::Octa);
        assert_eq!(state.status.message, "idle");
        assert_eq!(state.current, None);
    }

    #[tokio::test(start_paused = true)]
    async fn simultaneous_flags_resolve_by_priority() {
        // Freedrive outranks reset, reset outranks autofocus, autofocus
        // outranks the move family. Strip the winner each round and the
        // runner-up takes the tick.
        let mut cmd = ConsoleCommand::default();
        cmd.freedrive = true;
        cmd.reset = true;
        cmd.autofocus = true;
        cmd.next = true;
        cmd.previous = true;
        cmd.home = true;

        let ladder = [
            (UserAction::Freedrive, "[Action] Freedrive Mode ON"),
            (
                UserAction::Reset,
                "[Action] Reset to default position. It may take some time please wait.",
            ),
            (UserAction::Focus, "[Action] Focusing"),
            (UserAction::MoveNext, "[Action] Next: 0.0"),
        ];
        for (winner, banner) in ladder {
            let (ctx, mut arbiter) = harness();
            ctx.ingest_command(cmd.clone());
            arbiter.tick().await;
            {
                let state = ctx.state.lock();
                assert_eq!(state.previous, Some(winner));
                assert_eq!(state.status.message, banner);
            }
            match winner {
                UserAction::Freedrive => cmd.freedrive = false,
                UserAction::Reset => cmd.reset = false,
                UserAction::Focus => cmd.autofocus = false,
                _ => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn flag_combinations_select_at_most_one_action() {
        // All sixteen request combinations resolve to the single
        // highest-priority action, or stay idle.
        for mask in 0u8..16 {
            let (ctx, mut arbiter) = harness();
            let mut cmd = command(&ctx);
            cmd.freedrive = mask & 1 != 0;
            cmd.reset = mask & 2 != 0;
            cmd.autofocus = mask & 4 != 0;
            cmd.next = mask & 8 != 0;
            ctx.ingest_command(cmd);

            arbiter.tick().await;
            let expected = if mask & 1 != 0 {
                Some(UserAction::Freedrive)
            } else if mask & 2 != 0 {
                Some(UserAction::Reset)
            } else if mask & 4 != 0 {
                Some(UserAction::Focus)
            } else if mask & 8 != 0 {
                Some(UserAction::MoveNext)
            } else {
                None
            };
            assert_eq!(ctx.state.lock().previous, expected, "mask {mask:#06b}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn freedrive_toggles_on_the_flag_edges() {
        let (ctx, mut arbiter) = harness();
        {
            let mut state = ctx.state.lock();
            state.status.angle = 30.0;
            state.status.circle = 2;
        }
        let mut cmd = command(&ctx);
        cmd.freedrive = true;
        ctx.ingest_command(cmd.clone());

        arbiter.tick().await;
        {
            let state = ctx.state.lock();
            assert_eq!(state.status.message, "[Action] Freedrive Mode ON");
            assert_eq!(state.status.angle, 0.0);
            assert_eq!(state.status.circle, 1);
            assert_eq!(state.current, Some(UserAction::Freedrive));
        }

        // Held flag does not re-dispatch.
        tokio::task::yield_now().await;
        arbiter.tick().await;
        assert!(
            ctx.state
                .lock()
                .status
                .message
                .contains("Freedrive enabled")
        );

        cmd.freedrive = false;
        ctx.ingest_command(cmd);
        arbiter.tick().await;
        {
            let state = ctx.state.lock();
            assert_eq!(state.status.message, "[Action] Freedrive Mode OFF");
            assert_eq!(state.current, None);
        }

        tokio::task::yield_now().await;
        arbiter.tick().await;
        assert!(
            ctx.state
                .lock()
                .status
                .message
                .contains("Freedrive disabled")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn move_edge_computes_the_sweep_increment() {
        let (ctx, mut arbiter) = harness();
        let mut cmd = command(&ctx);
        cmd.next = true;
        cmd.angle_limit = 60.0;
        cmd.num_points = 6;
        ctx.ingest_command(cmd);

        arbiter.tick().await;
        let state = ctx.state.lock();
        assert_eq!(state.yaw, 10.0);
        assert_eq!(state.status.message, "[Action] Next: 10.0");
        assert_eq!(state.status.circle, 1);
        assert_eq!(state.previous, Some(UserAction::MoveNext));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_point_count_moves_by_nothing() {
        let (ctx, mut arbiter) = harness();
        let mut cmd = command(&ctx);
        cmd.next = true;
        cmd.angle_limit = 60.0;
        cmd.num_points = 0;
        ctx.ingest_command(cmd);

        arbiter.tick().await;
        assert_eq!(ctx.state.lock().yaw, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn home_move_negates_the_accumulated_angle() {
        let (ctx, mut arbiter) = harness();
        ctx.state.lock().status.angle = 30.0;
        let mut cmd = command(&ctx);
        cmd.home = true;
        ctx.ingest_command(cmd);

        arbiter.tick().await;
        let state = ctx.state.lock();
        assert_eq!(state.yaw, -30.0);
        assert_eq!(state.status.message, "[Action] Home: -30.0");
    }

    #[tokio::test(start_paused = true)]
    async fn move_success_updates_angle_and_circle() {
        let (ctx, mut arbiter) = harness();
        let mut cmd = command(&ctx);
        cmd.next = true;
        cmd.angle_limit = 60.0;
        cmd.num_points = 6;
        ctx.ingest_command(cmd.clone());

        arbiter.tick().await;
        // Drop the flag so the finished move is not immediately re-armed.
        cmd.next = false;
        ctx.ingest_command(cmd);
        tokio::time::sleep(Duration::from_millis(1)).await;
        arbiter.tick().await;

        let state = ctx.state.lock();
        assert_eq!(state.status.angle, 10.0);
        assert_eq!(state.status.circle, 2);
        assert!(state.status.message.contains("Move by angle completed"));
        assert_eq!(state.current, None);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_success_pulses_apply_config_and_captures_background() {
        let (ctx, mut arbiter) = harness();
        let mut cmd = command(&ctx);
        cmd.reset = true;
        ctx.ingest_command(cmd);

        arbiter.tick().await;
        assert!(
            ctx.state
                .lock()
                .status
                .message
                .starts_with("[Action] Reset")
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
        arbiter.tick().await;

        let state = ctx.state.lock();
        assert!(state.status.apply_config);
        assert!(state.status.message.contains("Reset completed"));
        assert!(state.status.message.contains("Background Captured"));
    }

    #[tokio::test(start_paused = true)]
    async fn focus_latch_blocks_redispatch_until_acknowledged() {
        let (ctx, mut arbiter) = harness();
        ctx.state.lock().status.end_state = true;
        let mut cmd = command(&ctx);
        cmd.autofocus = true;
        ctx.ingest_command(cmd.clone());

        arbiter.tick().await;
        {
            let state = ctx.state.lock();
            // Latched end_state blocks the dispatch.
            assert_eq!(state.status.message, "idle");
            assert_eq!(state.current, Some(UserAction::Focus));
        }

        // Console acknowledges by dropping autofocus: claim released,
        // then the idle branch clears the latch.
        cmd.autofocus = false;
        ctx.ingest_command(cmd);
        arbiter.tick().await;
        assert_eq!(ctx.state.lock().current, None);
        arbiter.tick().await;
        assert!(!ctx.state.lock().status.end_state);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_clears_the_recipe_and_reports() {
        let (ctx, mut arbiter) = harness();
        {
            let mut state = ctx.state.lock();
            state.cursor = 5;
            state.status.full_scan = true;
        }
        let mut cmd = command(&ctx);
        cmd.full_scan = true;
        cmd.cancel = true;
        ctx.ingest_command(cmd);

        arbiter.tick().await;
        let state = ctx.state.lock();
        assert_eq!(state.cursor, 0);
        assert!(!state.status.full_scan);
        assert!(!state.cancel_pending);
        assert!(state.status.message.contains("Canceling Full Scan action"));
        assert_eq!(state.current, None);
    }

    // Single-step script: one orbital move in OCT mode.
    static ONE_MOVE: &[RecipeStep] = &[step(StepAction::MoveByAngle, Mode::Oct, 10.0)];

    #[tokio::test(start_paused = true)]
    async fn recipe_waits_for_the_mode_mirror_and_settle() {
        let ctx = ControlContext::new(Default::default());
        let mut arbiter =
            Arbiter::new(ctx.clone(), InstantRig { hold_execute: true }, IdleVision)
                .with_recipe(ONE_MOVE);

        let mut cmd = command(&ctx);
        cmd.full_scan = true;
        ctx.ingest_command(cmd.clone());

        arbiter.tick().await;
        {
            let state = ctx.state.lock();
            assert!(state.status.full_scan);
            assert_eq!(state.status.mode, Mode::Oct);
            assert_eq!(
                state.status.message,
                "Step [1/1]: Move-by-Angle Action, OCT Mode"
            );
            // Mirror mismatch: nothing dispatched yet.
            assert_eq!(state.current, None);
        }

        // Console switches its mode; the settle window still holds the
        // step back.
        cmd.mode = Mode::Oct;
        cmd.full_scan = true;
        ctx.ingest_command(cmd);
        arbiter.tick().await;
        assert_eq!(ctx.state.lock().current, None);

        tokio::time::sleep(Duration::from_millis(150)).await;
        arbiter.tick().await;
        let state = ctx.state.lock();
        assert_eq!(state.current, Some(UserAction::MoveNext));
        assert_eq!(state.yaw, 10.0);
        assert_eq!(state.previous, Some(UserAction::MoveNext));
    }

    // Single-step script: one capture in OCT mode.
    static ONE_SCAN: &[RecipeStep] = &[step(StepAction::Scan, Mode::Oct, 0.0)];

    #[tokio::test(start_paused = true)]
    async fn scan_step_pulses_and_advances_on_the_mirror_flip() {
        let ctx = ControlContext::new(Default::default());
        let mut arbiter =
            Arbiter::new(ctx.clone(), InstantRig::default(), IdleVision).with_recipe(ONE_SCAN);

        let mut cmd = command(&ctx);
        cmd.full_scan = true;
        cmd.mode = Mode::Oct;
        ctx.ingest_command(cmd.clone());

        arbiter.tick().await;
        {
            let state = ctx.state.lock();
            assert!(state.status.scan_trigger);
            assert!(!state.gate.is_idle());
            assert!(state.status.message.contains("[Action] Scanning"));
            assert_eq!(state.cursor, 0);
        }

        // Unchanged mirror keeps the capture in flight.
        arbiter.tick().await;
        assert_eq!(ctx.state.lock().cursor, 0);

        // Console toggles its mirror: capture done, cursor advances.
        cmd.scan_trigger = true;
        ctx.ingest_command(cmd);
        arbiter.tick().await;
        assert_eq!(ctx.state.lock().cursor, 1);

        // Next tick finds the script exhausted.
        arbiter.tick().await;
        let state = ctx.state.lock();
        assert_eq!(state.status.message, "Full Scan complete!");
        assert_eq!(state.cursor, 0);
        assert!(!state.status.full_scan);
        assert!(!state.command.full_scan);
    }

    #[tokio::test(start_paused = true)]
    async fn recipe_completion_is_idempotent() {
        let ctx = ControlContext::new(Default::default());
        let mut arbiter =
            Arbiter::new(ctx.clone(), InstantRig::default(), IdleVision).with_recipe(ONE_SCAN);
        ctx.state.lock().cursor = 1;
        let mut cmd = command(&ctx);
        cmd.full_scan = true;
        cmd.mode = Mode::Oct;
        ctx.ingest_command(cmd);

        arbiter.tick().await;
        {
            let state = ctx.state.lock();
            assert_eq!(state.status.message, "Full Scan complete!");
            assert_eq!(state.cursor, 0);
            assert!(!state.command.full_scan);
        }

        // The cleared local flag keeps the player from restarting.
        arbiter.tick().await;
        assert_eq!(ctx.state.lock().status.message, "Full Scan complete!");
        assert_eq!(ctx.state.lock().cursor, 0);
    }
}
