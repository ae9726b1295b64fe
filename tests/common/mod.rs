//! In-memory stores shared by the workflow tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use credit_funding_api::approval;
use credit_funding_api::consent::new_consent;
use credit_funding_api::disputes;
use credit_funding_api::errors::AppError;
use credit_funding_api::models::*;
use credit_funding_api::rate_limit::RateLimiter;
use credit_funding_api::workflows::{CreditDataSource, GateStore, ProjectionStore, ReviewRequest};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

#[derive(Default)]
pub struct MemoryStore {
    pub tradelines: Mutex<Vec<Tradeline>>,
    pub scores: Mutex<Vec<ScoreHistoryEntry>>,
    pub inquiries: Mutex<Vec<CreditInquiry>>,
    pub projections: Mutex<HashMap<(Uuid, i64), FundingProjectionRow>>,
    pub consents: Mutex<Vec<Consent>>,
    pub actions: Mutex<Vec<GatedAction>>,
    pub approvals: Mutex<Vec<AdminApproval>>,
    pub disputes: Mutex<Vec<Dispute>>,
    pub audit: Mutex<Vec<AuditEntry>>,
    pub fail_audit: AtomicBool,
}

impl MemoryStore {
    pub fn add_score(&self, user_id: Uuid, score: i32, bureau: Bureau, recorded_at: DateTime<Utc>) {
        self.scores.lock().unwrap().push(ScoreHistoryEntry {
            id: Uuid::new_v4(),
            user_id,
            score,
            bureau: bureau.as_str().to_string(),
            recorded_at,
            source: "test".to_string(),
        });
    }

    pub fn add_tradeline(&self, user_id: Uuid, limit: i64, balance: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.tradelines.lock().unwrap().push(Tradeline {
            id,
            user_id,
            creditor_name: "Test Bank".to_string(),
            account_type: "revolving".to_string(),
            credit_limit: Some(limit),
            current_balance: balance,
            payment_status: "current".to_string(),
            is_negative: false,
            opened_on: Some(fixed_now().date_naive() - chrono::Duration::days(5 * 365)),
            source: "manual".to_string(),
            created_at: fixed_now(),
        });
        id
    }

    pub fn sign(&self, user_id: Uuid, consent_type: ConsentType) -> Uuid {
        let consent = new_consent(
            user_id,
            consent_type,
            "I authorize this action and understand it will be reviewed.",
            Some("integration-test".to_string()),
            fixed_now(),
        )
        .unwrap();
        let id = consent.id;
        self.consents.lock().unwrap().push(consent);
        id
    }

    pub fn action_count(&self) -> usize {
        self.actions.lock().unwrap().len()
    }

    pub fn approval_count(&self) -> usize {
        self.approvals.lock().unwrap().len()
    }
}

impl CreditDataSource for MemoryStore {
    async fn tradelines(&self, user_id: Uuid) -> Result<Vec<Tradeline>, AppError> {
        Ok(self.tradelines.lock().unwrap().iter().filter(|t| t.user_id == user_id).cloned().collect())
    }

    async fn score_history(&self, user_id: Uuid) -> Result<Vec<ScoreHistoryEntry>, AppError> {
        Ok(self.scores.lock().unwrap().iter().filter(|s| s.user_id == user_id).cloned().collect())
    }

    async fn inquiries(&self, user_id: Uuid) -> Result<Vec<CreditInquiry>, AppError> {
        Ok(self.inquiries.lock().unwrap().iter().filter(|i| i.user_id == user_id).cloned().collect())
    }
}

impl ProjectionStore for MemoryStore {
    async fn upsert_projections(&self, rows: &[FundingProjectionRow]) -> Result<(), AppError> {
        let mut projections = self.projections.lock().unwrap();
        for row in rows {
            projections.insert((row.user_id, row.target_amount), row.clone());
        }
        Ok(())
    }
}

impl GateStore for MemoryStore {
    async fn find_consent(&self, consent_id: Uuid) -> Result<Option<Consent>, AppError> {
        Ok(self.consents.lock().unwrap().iter().find(|c| c.id == consent_id).cloned())
    }

    async fn open_review(&self, review: ReviewRequest) -> Result<(), AppError> {
        if let Some(dispute_id) = review.dispute_id {
            let mut disputes = self.disputes.lock().unwrap();
            let dispute = disputes
                .iter_mut()
                .find(|d| d.id == dispute_id && d.status == "draft")
                .ok_or_else(|| AppError::Conflict("dispute is no longer a draft".to_string()))?;
            dispute.status = DisputeStatus::PendingReview.as_str().to_string();
            dispute.action_id = Some(review.action.id);
        }
        self.actions.lock().unwrap().push(review.action);
        self.approvals.lock().unwrap().push(review.approval);
        Ok(())
    }

    async fn find_action(&self, user_id: Uuid, action_id: Uuid) -> Result<Option<GatedAction>, AppError> {
        Ok(self
            .actions
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == action_id && a.user_id == user_id)
            .cloned())
    }

    async fn find_dispute(&self, user_id: Uuid, dispute_id: Uuid) -> Result<Option<Dispute>, AppError> {
        Ok(self
            .disputes
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == dispute_id && d.user_id == user_id)
            .cloned())
    }

    async fn complete_submission(&self, action: &GatedAction, now: DateTime<Utc>) -> Result<GatedAction, AppError> {
        let mut actions = self.actions.lock().unwrap();
        let stored = actions
            .iter_mut()
            .find(|a| a.id == action.id && a.status == "approved")
            .ok_or_else(|| AppError::Conflict("action is not approved".to_string()))?;
        stored.status = ActionStatus::Submitted.as_str().to_string();
        stored.updated_at = Some(now);

        for dispute in self.disputes.lock().unwrap().iter_mut() {
            if dispute.action_id == Some(action.id) {
                dispute.status = DisputeStatus::Submitted.as_str().to_string();
                dispute.submitted_at = Some(now);
            }
        }
        Ok(stored.clone())
    }

    async fn decide(
        &self,
        approval_id: Uuid,
        request: &AdminDecisionRequest,
        now: DateTime<Utc>,
    ) -> Result<AdminApproval, AppError> {
        let mut approvals = self.approvals.lock().unwrap();
        let approval_row = approvals
            .iter_mut()
            .find(|a| a.id == approval_id)
            .ok_or_else(|| AppError::NotFound("approval not found".to_string()))?;

        let mut actions = self.actions.lock().unwrap();
        let action = actions
            .iter_mut()
            .find(|a| a.id == approval_row.related_action_id)
            .ok_or_else(|| AppError::InternalError("orphaned approval".to_string()))?;

        let (approval_status, action_status) = approval::decide(
            approval_row.status.parse()?,
            action.status.parse()?,
            request.decision,
        )?;

        approval_row.status = approval_status.as_str().to_string();
        approval_row.decided_at = Some(now);
        approval_row.decided_by = request.decided_by.clone();
        approval_row.notes = request.notes.clone();
        action.status = action_status.as_str().to_string();
        action.updated_at = Some(now);

        if let Some(status) = disputes::status_for_action(action_status) {
            for dispute in self.disputes.lock().unwrap().iter_mut() {
                if dispute.action_id == Some(action.id) {
                    dispute.status = status.as_str().to_string();
                }
            }
        }
        Ok(approval_row.clone())
    }

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), AppError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(AppError::InternalError("audit table unavailable".to_string()));
        }
        self.audit.lock().unwrap().push(entry);
        Ok(())
    }
}

/// Allows the first `max` calls, counting every attempt.
pub struct CountingLimiter {
    pub max: u32,
    pub calls: AtomicU32,
}

impl CountingLimiter {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            calls: AtomicU32::new(0),
        }
    }
}

impl RateLimiter for CountingLimiter {
    async fn allow(&self, _user_id: Uuid, _operation: &str, _now: DateTime<Utc>) -> Result<bool, AppError> {
        Ok(self.calls.fetch_add(1, Ordering::SeqCst) < self.max)
    }
}
