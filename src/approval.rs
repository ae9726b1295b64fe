//! Admin approval queue and the lifecycle of gated actions.
//!
//! ```text
//! created -> pending_review -> approved -> submitted
//!                          \-> rejected
//! ```
//!
//! Every transition goes through [`transition`]; there is no path around
//! `pending_review`, and an approval record is decided at most once.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{ActionStatus, ApprovalStatus, Decision};

/// Tagged payload persisted with a gated action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    MillionMode {
        plan: crate::million_mode::MillionModePlan,
        score: u16,
    },
    DisputeSubmission {
        dispute_id: uuid::Uuid,
        tradeline_ids: Vec<uuid::Uuid>,
    },
}

pub fn can_transition(from: ActionStatus, to: ActionStatus) -> bool {
    matches!(
        (from, to),
        (ActionStatus::Created, ActionStatus::PendingReview)
            | (ActionStatus::PendingReview, ActionStatus::Approved)
            | (ActionStatus::PendingReview, ActionStatus::Rejected)
            | (ActionStatus::Approved, ActionStatus::Submitted)
    )
}

pub fn transition(from: ActionStatus, to: ActionStatus) -> Result<ActionStatus, AppError> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(AppError::Conflict(format!(
            "action cannot move from {} to {}",
            from, to
        )))
    }
}

/// Applies an admin decision to a pending approval.
///
/// Returns the new approval status and the status the related action moves to.
pub fn decide(
    current: ApprovalStatus,
    action_status: ActionStatus,
    decision: Decision,
) -> Result<(ApprovalStatus, ActionStatus), AppError> {
    if current != ApprovalStatus::Pending {
        return Err(AppError::Conflict(format!(
            "approval already {}",
            current
        )));
    }
    let (approval, action_target) = match decision {
        Decision::Approve => (ApprovalStatus::Approved, ActionStatus::Approved),
        Decision::Reject => (ApprovalStatus::Rejected, ActionStatus::Rejected),
    };
    let action = transition(action_status, action_target)?;
    Ok((approval, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ActionStatus; 5] = [
        ActionStatus::Created,
        ActionStatus::PendingReview,
        ActionStatus::Approved,
        ActionStatus::Submitted,
        ActionStatus::Rejected,
    ];

    #[test]
    fn test_happy_path() {
        let s = transition(ActionStatus::Created, ActionStatus::PendingReview).unwrap();
        let s = transition(s, ActionStatus::Approved).unwrap();
        let s = transition(s, ActionStatus::Submitted).unwrap();
        assert_eq!(s, ActionStatus::Submitted);
    }

    #[test]
    fn test_cannot_skip_review() {
        assert!(transition(ActionStatus::Created, ActionStatus::Approved).is_err());
        assert!(transition(ActionStatus::Created, ActionStatus::Submitted).is_err());
        assert!(transition(ActionStatus::Created, ActionStatus::Rejected).is_err());
        assert!(transition(ActionStatus::PendingReview, ActionStatus::Submitted).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!can_transition(ActionStatus::Rejected, to));
            assert!(!can_transition(ActionStatus::Submitted, to));
        }
    }

    #[test]
    fn test_decide_once() {
        let (approval, action) =
            decide(ApprovalStatus::Pending, ActionStatus::PendingReview, Decision::Reject).unwrap();
        assert_eq!(approval, ApprovalStatus::Rejected);
        assert_eq!(action, ActionStatus::Rejected);

        let err = decide(approval, action, Decision::Approve).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[test]
    fn test_payload_is_tagged() {
        let payload = ActionPayload::DisputeSubmission {
            dispute_id: uuid::Uuid::nil(),
            tradeline_ids: vec![],
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "dispute_submission");
    }
}
