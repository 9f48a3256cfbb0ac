//! User actions, lifecycle kinds and goal states.

use serde::{Deserialize, Serialize};

/// Action the arbiter has selected as current.
///
/// The three move variants share one lifecycle kind and differ only in
/// how the yaw increment is computed. `Scan` is gate-driven and has no
/// lifecycle goal behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserAction {
    Freedrive,
    Reset,
    Focus,
    MoveNext,
    MovePrevious,
    MoveHome,
    Scan,
}

impl UserAction {
    /// Lifecycle kind dispatched for this action, if any.
    pub const fn kind(self) -> Option<ActionKind> {
        match self {
            Self::Freedrive => Some(ActionKind::Freedrive),
            Self::Reset => Some(ActionKind::Reset),
            Self::Focus => Some(ActionKind::Focus),
            Self::MoveNext | Self::MovePrevious | Self::MoveHome => {
                Some(ActionKind::MoveByAngle)
            }
            Self::Scan => None,
        }
    }

    /// True for the move-by-angle family.
    pub const fn is_move(self) -> bool {
        matches!(self, Self::MoveNext | Self::MovePrevious | Self::MoveHome)
    }
}

/// Kind of a long-running, cancelable goal.
///
/// At most one live goal per kind exists at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionKind {
    Freedrive = 0,
    Reset = 1,
    Focus = 2,
    MoveByAngle = 3,
}

impl ActionKind {
    /// All kinds, in cancel-routing order.
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Focus,
        ActionKind::MoveByAngle,
        ActionKind::Freedrive,
        ActionKind::Reset,
    ];

    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Freedrive),
            1 => Some(Self::Reset),
            2 => Some(Self::Focus),
            3 => Some(Self::MoveByAngle),
            _ => None,
        }
    }

    /// Human-readable label used in console status messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Freedrive => "Freedrive",
            Self::Reset => "Reset",
            Self::Focus => "Focus",
            Self::MoveByAngle => "Move by angle",
        }
    }
}

/// Lifecycle state of one goal.
///
/// `Succeeded`, `Aborted` and `Canceled` are terminal and mutually
/// exclusive; a goal reaches exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GoalStatus {
    /// Proposed, not yet accepted.
    Pending = 0,
    /// Accepted, execution task not yet running.
    Accepted = 1,
    /// Execution task running.
    Executing = 2,
    /// Goal objective met.
    Succeeded = 3,
    /// Timeout, planning failure or execution failure.
    Aborted = 4,
    /// Explicit cancellation honored.
    Canceled = 5,
}

impl GoalStatus {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Accepted),
            2 => Some(Self::Executing),
            3 => Some(Self::Succeeded),
            4 => Some(Self::Aborted),
            5 => Some(Self::Canceled),
            _ => None,
        }
    }

    /// True once the goal can never change state again.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Aborted | Self::Canceled)
    }
}

impl Default for GoalStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_variants_share_one_kind() {
        assert_eq!(UserAction::MoveNext.kind(), Some(ActionKind::MoveByAngle));
        assert_eq!(
            UserAction::MovePrevious.kind(),
            Some(ActionKind::MoveByAngle)
        );
        assert_eq!(UserAction::MoveHome.kind(), Some(ActionKind::MoveByAngle));
    }

    #[test]
    fn scan_has_no_lifecycle_kind() {
        assert_eq!(UserAction::Scan.kind(), None);
    }

    #[test]
    fn action_kind_round_trips_through_u8() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(ActionKind::from_u8(4), None);
    }

    #[test]
    fn terminal_states_are_marked() {
        assert!(!GoalStatus::Pending.is_terminal());
        assert!(!GoalStatus::Accepted.is_terminal());
        assert!(!GoalStatus::Executing.is_terminal());
        assert!(GoalStatus::Succeeded.is_terminal());
        assert!(GoalStatus::Aborted.is_terminal());
        assert!(GoalStatus::Canceled.is_terminal());
    }

    #[test]
    fn goal_status_round_trips_through_u8() {
        for raw in 0..=5u8 {
            let status = GoalStatus::from_u8(raw).unwrap();
            assert_eq!(status as u8, raw);
        }
        assert_eq!(GoalStatus::from_u8(6), None);
    }
}
