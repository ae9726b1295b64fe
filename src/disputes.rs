//! Credit report disputes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{ActionStatus, Dispute, DisputeStatus, NewDispute, Tradeline};

pub const MAX_REASON_LEN: usize = 2_000;

/// Builds a draft dispute over tradelines the user owns.
pub fn new_draft(
    user_id: Uuid,
    request: &NewDispute,
    owned: &[Tradeline],
    now: DateTime<Utc>,
) -> Result<Dispute, AppError> {
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest("reason is required".to_string()));
    }
    if reason.len() > MAX_REASON_LEN {
        return Err(AppError::BadRequest(format!(
            "reason exceeds {} characters",
            MAX_REASON_LEN
        )));
    }
    if request.tradeline_ids.is_empty() {
        return Err(AppError::BadRequest(
            "at least one tradeline is required".to_string(),
        ));
    }

    let owned_ids: HashSet<Uuid> = owned
        .iter()
        .filter(|t| t.user_id == user_id)
        .map(|t| t.id)
        .collect();
    let mut tradeline_ids = Vec::with_capacity(request.tradeline_ids.len());
    for id in &request.tradeline_ids {
        if !owned_ids.contains(id) {
            return Err(AppError::BadRequest(format!("unknown tradeline {}", id)));
        }
        if !tradeline_ids.contains(id) {
            tradeline_ids.push(*id);
        }
    }

    Ok(Dispute {
        id: Uuid::new_v4(),
        user_id,
        tradeline_ids,
        bureau: request.bureau.as_str().to_string(),
        reason: reason.to_string(),
        status: DisputeStatus::Draft.as_str().to_string(),
        action_id: None,
        created_at: now,
        submitted_at: None,
    })
}

/// Only drafts may enter review.
pub fn ensure_submittable(dispute: &Dispute) -> Result<(), AppError> {
    let status: DisputeStatus = dispute.status.parse()?;
    if status != DisputeStatus::Draft {
        return Err(AppError::Conflict(format!(
            "dispute is {}, only draft disputes can be submitted",
            status
        )));
    }
    Ok(())
}

/// Dispute status that mirrors a gated action status.
pub fn status_for_action(action: ActionStatus) -> Option<DisputeStatus> {
    match action {
        ActionStatus::Created => None,
        ActionStatus::PendingReview | ActionStatus::Approved => Some(DisputeStatus::PendingReview),
        ActionStatus::Submitted => Some(DisputeStatus::Submitted),
        ActionStatus::Rejected => Some(DisputeStatus::Rejected),
    }
}

/// Tradelines referenced by a dispute in review or submitted cannot change.
pub fn locks_tradelines(dispute: &Dispute) -> bool {
    matches!(
        dispute.status.parse::<DisputeStatus>(),
        Ok(DisputeStatus::PendingReview | DisputeStatus::Submitted)
    )
}
