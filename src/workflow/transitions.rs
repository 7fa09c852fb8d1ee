// src/workflow/transitions.rs
//
// Central transition table for the outpass lifecycle. Every handler goes
// through `authorize` and `next_status`; status is never assigned anywhere
// else. The role gate is checked before the source-state gate, so a caller
// with the wrong role always sees Unauthorized, never InvalidTransition.
use std::fmt;

use crate::db::models::outpass::OutpassStatus;
use crate::db::models::user::Role;
use crate::workflow::error::OutpassError;

/// Every operation a caller can perform against an outpass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Cancel,
    MarkFeePending,
    MarkFeePaid,
    Approve,
    Reject,
    ScheduleMeeting,
    CancelMeeting,
    Vacate,
    GateCheckout,
    ProcessExitCode,
    ProcessReturnCode,
    MarkReturned,
    Sweep,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create an outpass",
            Action::Cancel => "cancel the outpass",
            Action::MarkFeePending => "mark fees pending",
            Action::MarkFeePaid => "mark fees paid",
            Action::Approve => "approve the outpass",
            Action::Reject => "reject the outpass",
            Action::ScheduleMeeting => "schedule a meeting",
            Action::CancelMeeting => "cancel the meeting",
            Action::Vacate => "release the student for exit",
            Action::GateCheckout => "check the student out",
            Action::ProcessExitCode => "process an exit code",
            Action::ProcessReturnCode => "process a return code",
            Action::MarkReturned => "mark the student returned",
            Action::Sweep => "sweep lapsed outpasses",
        };
        f.write_str(name)
    }
}

/// Which prior statuses admit an action.
enum Sources {
    /// Any status outside the terminal set.
    AnyNonTerminal,
    Only(&'static [OutpassStatus]),
}

impl Action {
    pub fn permitted_roles(self) -> &'static [Role] {
        match self {
            Action::Create | Action::Cancel => &[Role::Parent],
            Action::MarkFeePending | Action::MarkFeePaid => &[Role::Accountant],
            Action::Approve | Action::ScheduleMeeting | Action::CancelMeeting => &[Role::Hm],
            Action::Reject => &[Role::Hm, Role::Warden],
            Action::Vacate => &[Role::Warden],
            Action::GateCheckout | Action::ProcessExitCode | Action::ProcessReturnCode => {
                &[Role::GateStaff]
            }
            Action::MarkReturned => &[Role::Warden, Role::Hm],
            Action::Sweep => &[Role::Admin],
        }
    }

    fn sources(self) -> Sources {
        match self {
            Action::Cancel => Sources::Only(&[
                OutpassStatus::Pending,
                OutpassStatus::FeePending,
                OutpassStatus::Approved,
                OutpassStatus::Meeting,
                OutpassStatus::ReadyForExit,
            ]),
            Action::MarkFeePending
            | Action::MarkFeePaid
            | Action::Approve
            | Action::Reject
            | Action::ScheduleMeeting
            | Action::MarkReturned => Sources::AnyNonTerminal,
            Action::CancelMeeting => Sources::Only(&[OutpassStatus::Meeting]),
            Action::Vacate => Sources::Only(&[OutpassStatus::Approved]),
            Action::GateCheckout | Action::ProcessExitCode => {
                Sources::Only(&[OutpassStatus::ReadyForExit])
            }
            Action::ProcessReturnCode => Sources::Only(&[OutpassStatus::CheckedOut]),
            // Create has no source row; Sweep is a bulk maintenance pass
            // expressed directly in SQL. Neither goes through next_status.
            Action::Create | Action::Sweep => Sources::Only(&[]),
        }
    }

    fn required_label(self) -> String {
        match self.sources() {
            Sources::AnyNonTerminal => "any non-terminal status".to_string(),
            Sources::Only(list) => list
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

/// Role gate. Checked first for every operation.
pub fn authorize(role: Role, action: Action) -> Result<(), OutpassError> {
    if action.permitted_roles().contains(&role) {
        Ok(())
    } else {
        Err(OutpassError::Unauthorized { role, action })
    }
}

/// Source-state gate. Returns the status the outpass moves to; statuses are
/// only ever assigned from this function's result.
pub fn next_status(action: Action, current: OutpassStatus) -> Result<OutpassStatus, OutpassError> {
    let admitted = match action.sources() {
        Sources::AnyNonTerminal => !current.is_terminal(),
        Sources::Only(list) => list.contains(&current),
    };
    if !admitted {
        return Err(OutpassError::InvalidTransition {
            action,
            current,
            required: action.required_label(),
        });
    }

    Ok(match action {
        Action::Cancel => OutpassStatus::Cancelled,
        Action::MarkFeePending => OutpassStatus::FeePending,
        // Fee payment only pulls the request back from FEE_PENDING; a fee
        // settled after the request advanced leaves the status alone.
        Action::MarkFeePaid => {
            if current == OutpassStatus::FeePending {
                OutpassStatus::Pending
            } else {
                current
            }
        }
        Action::Approve => OutpassStatus::Approved,
        Action::Reject => OutpassStatus::Rejected,
        Action::ScheduleMeeting => OutpassStatus::Meeting,
        Action::CancelMeeting => OutpassStatus::Pending,
        Action::Vacate => OutpassStatus::ReadyForExit,
        Action::GateCheckout | Action::ProcessExitCode => OutpassStatus::CheckedOut,
        Action::ProcessReturnCode | Action::MarkReturned => OutpassStatus::Completed,
        Action::Create | Action::Sweep => unreachable!("not single-row transitions"),
    })
}

#[cfg(test)]
mod tests {
    use super::{authorize, next_status, Action};
    use crate::db::models::outpass::OutpassStatus;
    use crate::db::models::user::Role;
    use crate::workflow::error::OutpassError;

    #[test]
    fn vacate_requires_approved() {
        assert_eq!(
            next_status(Action::Vacate, OutpassStatus::Approved).unwrap(),
            OutpassStatus::ReadyForExit
        );

        for current in [
            OutpassStatus::Pending,
            OutpassStatus::FeePending,
            OutpassStatus::Meeting,
            OutpassStatus::ReadyForExit,
            OutpassStatus::CheckedOut,
            OutpassStatus::Completed,
            OutpassStatus::Cancelled,
        ] {
            let err = next_status(Action::Vacate, current).unwrap_err();
            match err {
                OutpassError::InvalidTransition {
                    current: got,
                    required,
                    ..
                } => {
                    assert_eq!(got, current);
                    assert_eq!(required, "APPROVED");
                }
                other => panic!("expected InvalidTransition, got {other:?}"),
            }
        }
    }

    #[test]
    fn lifecycle_round_trip() {
        let mut status = OutpassStatus::Pending;
        status = next_status(Action::Approve, status).unwrap();
        assert_eq!(status, OutpassStatus::Approved);
        status = next_status(Action::Vacate, status).unwrap();
        assert_eq!(status, OutpassStatus::ReadyForExit);
        status = next_status(Action::ProcessExitCode, status).unwrap();
        assert_eq!(status, OutpassStatus::CheckedOut);
        status = next_status(Action::ProcessReturnCode, status).unwrap();
        assert_eq!(status, OutpassStatus::Completed);
        assert!(status.is_terminal());
    }

    #[test]
    fn fee_paid_only_reverts_fee_pending() {
        assert_eq!(
            next_status(Action::MarkFeePaid, OutpassStatus::FeePending).unwrap(),
            OutpassStatus::Pending
        );
        // Status-preserving branch: fee settled after the request advanced.
        assert_eq!(
            next_status(Action::MarkFeePaid, OutpassStatus::Approved).unwrap(),
            OutpassStatus::Approved
        );
        assert_eq!(
            next_status(Action::MarkFeePaid, OutpassStatus::ReadyForExit).unwrap(),
            OutpassStatus::ReadyForExit
        );
    }

    #[test]
    fn meeting_detour_returns_to_pending() {
        let mut status = next_status(Action::ScheduleMeeting, OutpassStatus::Pending).unwrap();
        assert_eq!(status, OutpassStatus::Meeting);
        status = next_status(Action::CancelMeeting, status).unwrap();
        assert_eq!(status, OutpassStatus::Pending);

        assert!(next_status(Action::CancelMeeting, OutpassStatus::Pending).is_err());
    }

    #[test]
    fn cancel_window_closes_at_checkout() {
        for current in [
            OutpassStatus::Pending,
            OutpassStatus::FeePending,
            OutpassStatus::Approved,
            OutpassStatus::Meeting,
            OutpassStatus::ReadyForExit,
        ] {
            assert_eq!(
                next_status(Action::Cancel, current).unwrap(),
                OutpassStatus::Cancelled
            );
        }
        assert!(next_status(Action::Cancel, OutpassStatus::CheckedOut).is_err());
        assert!(next_status(Action::Cancel, OutpassStatus::Completed).is_err());
    }

    #[test]
    fn terminal_statuses_admit_nothing() {
        for terminal in OutpassStatus::TERMINAL {
            for action in [
                Action::Cancel,
                Action::MarkFeePending,
                Action::MarkFeePaid,
                Action::Approve,
                Action::Reject,
                Action::ScheduleMeeting,
                Action::CancelMeeting,
                Action::Vacate,
                Action::GateCheckout,
                Action::ProcessExitCode,
                Action::ProcessReturnCode,
                Action::MarkReturned,
            ] {
                assert!(
                    next_status(action, terminal).is_err(),
                    "{action:?} must be refused on {terminal}"
                );
            }
        }
    }

    #[test]
    fn mark_returned_accepts_overdue() {
        assert_eq!(
            next_status(Action::MarkReturned, OutpassStatus::Overdue).unwrap(),
            OutpassStatus::Completed
        );
        assert_eq!(
            next_status(Action::MarkReturned, OutpassStatus::CheckedOut).unwrap(),
            OutpassStatus::Completed
        );
    }

    #[test]
    fn role_gate_rejects_wrong_roles() {
        let cases = [
            (Action::Create, Role::Warden),
            (Action::Cancel, Role::GateStaff),
            (Action::MarkFeePending, Role::Hm),
            (Action::MarkFeePaid, Role::Parent),
            (Action::Approve, Role::Warden),
            (Action::ScheduleMeeting, Role::Accountant),
            (Action::Vacate, Role::Hm),
            (Action::GateCheckout, Role::Warden),
            (Action::ProcessExitCode, Role::Admin),
            (Action::MarkReturned, Role::GateStaff),
            (Action::Sweep, Role::Hm),
        ];
        for (action, role) in cases {
            assert!(
                matches!(
                    authorize(role, action),
                    Err(OutpassError::Unauthorized { .. })
                ),
                "{role} must not be allowed to {action:?}"
            );
        }
    }

    #[test]
    fn role_gate_admits_the_table() {
        assert!(authorize(Role::Parent, Action::Create).is_ok());
        assert!(authorize(Role::Accountant, Action::MarkFeePaid).is_ok());
        assert!(authorize(Role::Hm, Action::Approve).is_ok());
        assert!(authorize(Role::Hm, Action::Reject).is_ok());
        assert!(authorize(Role::Warden, Action::Reject).is_ok());
        assert!(authorize(Role::Warden, Action::Vacate).is_ok());
        assert!(authorize(Role::GateStaff, Action::ProcessExitCode).is_ok());
        assert!(authorize(Role::Warden, Action::MarkReturned).is_ok());
        assert!(authorize(Role::Hm, Action::MarkReturned).is_ok());
        assert!(authorize(Role::Admin, Action::Sweep).is_ok());
    }
}
