//! Action goal lifecycle.
//!
//! Every dispatched action becomes one supervised tokio task that emits
//! feedback events while running and exactly one terminal event when
//! done. The arbiter owns the [`ActiveGoals`] table (one slot per
//! [`ActionKind`]), drains the event channel each tick, and joins
//! finished tasks there, so no task is ever detached.
//!
//! Cancellation is cooperative: a goal carries a [`CancelToken`] that it
//! checks at every blocking boundary. Requesting cancel never tears a
//! task down; the goal observes the token and winds down itself.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use octa_common::action::{ActionKind, GoalStatus};

use crate::error::ActionError;

/// Monotonic goal identifier, unique within one coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GoalId(u64);

impl std::fmt::Display for GoalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a goal was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Operator or cancel-branch request.
    Operator,
    /// A newer goal of the same kind took the slot.
    Preempted,
}

/// What a running goal reports back to the arbiter.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Progress text, appended to the console message.
    Feedback(String),
    /// Final status and result text. Emitted exactly once per goal.
    Terminal(GoalStatus, String),
}

/// One lifecycle event on the arbiter's channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub id: GoalId,
    pub kind: ActionKind,
    pub outcome: ActionOutcome,
}

/// Cooperative cancellation handle held by a running goal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<Option<CancelReason>>,
}

impl CancelToken {
    pub fn is_canceled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.rx.borrow()
    }

    /// Boundary check: bail out with `ActionError::Canceled` once a
    /// cancel has been requested.
    pub fn check(&self) -> Result<(), ActionError> {
        if self.is_canceled() {
            Err(ActionError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Resolve once cancellation is requested. A dropped sender counts
    /// as cancellation so a goal can never wait here forever.
    pub async fn canceled(&mut self) {
        let _ = self.rx.wait_for(|reason| reason.is_some()).await;
    }
}

/// Feedback channel handed to an executor.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: GoalId,
    kind: ActionKind,
    tx: mpsc::UnboundedSender<ActionEvent>,
}

impl EventSink {
    pub fn feedback(&self, text: impl Into<String>) {
        let _ = self.tx.send(ActionEvent {
            id: self.id,
            kind: self.kind,
            outcome: ActionOutcome::Feedback(text.into()),
        });
    }
}

/// Live goal bookkeeping: id, cancel line, and the task to join.
#[derive(Debug)]
pub struct ActionHandle {
    pub id: GoalId,
    pub kind: ActionKind,
    cancel: watch::Sender<Option<CancelReason>>,
    task: JoinHandle<()>,
}

impl ActionHandle {
    /// Signal cooperative cancel. The first reason wins; a later request
    /// does not overwrite it.
    pub fn request_cancel(&self, reason: CancelReason) {
        self.cancel.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    /// Await task teardown after its terminal event was consumed.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// How a new goal treats a live goal of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptPolicy {
    /// The new goal is rejected; no task is spawned.
    RejectConcurrent,
    /// The prior goal is canceled and joined before the new one starts.
    PreemptPrior,
}

impl PreemptPolicy {
    pub const fn for_kind(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Focus => Self::PreemptPrior,
            ActionKind::Freedrive | ActionKind::Reset | ActionKind::MoveByAngle => {
                Self::RejectConcurrent
            }
        }
    }
}

/// Per-kind goal table. Owned by the arbiter task; executors never see it.
#[derive(Debug)]
pub struct ActiveGoals {
    events: mpsc::UnboundedSender<ActionEvent>,
    slots: [Option<ActionHandle>; 4],
    next_id: u64,
}

impl ActiveGoals {
    pub fn new(events: mpsc::UnboundedSender<ActionEvent>) -> Self {
        Self {
            events,
            slots: [None, None, None, None],
            next_id: 1,
        }
    }

    /// Table plus the receiving end of its event channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ActionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn is_active(&self, kind: ActionKind) -> bool {
        self.slots[kind as usize].is_some()
    }

    pub fn any_active(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    /// Signal cancel on the live goal of `kind`, if any.
    pub fn request_cancel(&self, kind: ActionKind, reason: CancelReason) -> bool {
        match &self.slots[kind as usize] {
            Some(handle) => {
                handle.request_cancel(reason);
                true
            }
            None => false,
        }
    }

    /// Signal cancel on every live goal. Returns the kinds signaled, in
    /// the fixed routing order of [`ActionKind::ALL`].
    pub fn request_cancel_all(&self, reason: CancelReason) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|kind| self.request_cancel(*kind, reason))
            .collect()
    }

    /// Claim the tracked handle for a terminal event. Returns `None` for
    /// stale terminals whose goal was already preempted out of the slot;
    /// the preempting task joined those itself.
    pub fn on_terminal(&mut self, kind: ActionKind, id: GoalId) -> Option<ActionHandle> {
        let slot = &mut self.slots[kind as usize];
        if slot.as_ref().is_some_and(|handle| handle.id == id) {
            slot.take()
        } else {
            None
        }
    }

    /// Dispatch a goal of `kind` running the future built by `run`.
    ///
    /// Returns `None` when a live goal of the same kind rejects the new
    /// one. Under `PreemptPrior` the live goal is cancel-signaled and the
    /// new task awaits its teardown before the executor future is polled,
    /// so two goals of one kind never run concurrently.
    ///
    /// The spawned wrapper emits exactly one terminal event:
    /// `Ok(text)` becomes Succeeded, `ActionError::Canceled` becomes
    /// Canceled, anything else becomes Aborted with the error text.
    pub fn dispatch<F, Fut>(&mut self, kind: ActionKind, run: F) -> Option<GoalId>
    where
        F: FnOnce(CancelToken, EventSink) -> Fut,
        Fut: Future<Output = Result<String, ActionError>> + Send + 'static,
    {
        let prior = match self.slots[kind as usize].take() {
            Some(handle) => match PreemptPolicy::for_kind(kind) {
                PreemptPolicy::RejectConcurrent => {
                    self.slots[kind as usize] = Some(handle);
                    return None;
                }
                PreemptPolicy::PreemptPrior => {
                    handle.request_cancel(CancelReason::Preempted);
                    Some(handle.task)
                }
            },
            None => None,
        };

        let id = GoalId(self.next_id);
        self.next_id += 1;

        let (cancel_tx, cancel_rx) = watch::channel(None);
        let token = CancelToken { rx: cancel_rx };
        let sink = EventSink {
            id,
            kind,
            tx: self.events.clone(),
        };
        let future = run(token.clone(), sink);
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            if let Some(prior) = prior {
                let _ = prior.await;
            }
            let outcome = match future.await {
                Ok(text) => ActionOutcome::Terminal(GoalStatus::Succeeded, text),
                Err(ActionError::Canceled) => {
                    let text = match token.reason() {
                        Some(CancelReason::Preempted) => "Pre-empted by new goal".to_owned(),
                        _ => "Canceled".to_owned(),
                    };
                    ActionOutcome::Terminal(GoalStatus::Canceled, text)
                }
                Err(err) => ActionOutcome::Terminal(GoalStatus::Aborted, err.to_string()),
            };
            let _ = events.send(ActionEvent { id, kind, outcome });
        });

        self.slots[kind as usize] = Some(ActionHandle {
            id,
            kind,
            cancel: cancel_tx,
            task,
        });
        Some(id)
    }
}
