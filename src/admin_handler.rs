use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{AdminApproval, AdminDecisionRequest, ApprovalQuery};
use crate::workflows::{self, DecisionOutcome};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// GET /api/v1/admin/approvals?status=pending
pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ApprovalQuery>,
) -> Result<Json<Vec<AdminApproval>>, AppError> {
    validate_admin_key(&state, &headers)?;
    Ok(Json(state.storage.list_approvals(query.status).await?))
}

/// POST /api/v1/admin/approvals/:approval_id/decision
///
/// Approves or rejects a pending review. A decided approval cannot be
/// decided again (409).
pub async fn decide_approval(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(approval_id): Path<Uuid>,
    Json(request): Json<AdminDecisionRequest>,
) -> Result<Json<DecisionOutcome>, AppError> {
    validate_admin_key(&state, &headers)?;

    if matches!(&request.notes, Some(notes) if notes.len() > 4_000) {
        return Err(AppError::BadRequest("notes exceed 4000 characters".to_string()));
    }

    let decided = workflows::decide_approval(&state.storage, approval_id, &request, Utc::now()).await?;
    Ok(Json(decided))
}

/// Validate the admin key from the X-Admin-Key header
fn validate_admin_key(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let key = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Admin-Key header".to_string()))?;

    if !constant_time_compare(key, &state.config.admin_api_key) {
        tracing::warn!("Invalid admin key received");
        return Err(AppError::Unauthorized("Invalid admin key".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("s3cret-key", "s3cret-key"));
        assert!(!constant_time_compare("s3cret-key", "s3cret-kez"));
        assert!(!constant_time_compare("short", "longer-key"));
    }
}
