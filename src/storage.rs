//! Postgres persistence for credit records, projections, consents and the
//! review queue.
//!
//! Enum-valued columns are plain text and parsed with `FromStr` on the way
//! out. Status changes are scoped by the expected current status so a
//! concurrent writer cannot skip a step.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::approval;
use crate::disputes;
use crate::errors::{AppError, ResultExt};
use crate::models::{
    ActionKind, ActionStatus, AdminApproval, AdminDecisionRequest, ApprovalStatus, AuditEntry,
    Consent, CreditInquiry, Dispute, FundingProjectionRow, GatedAction, ScoreHistoryEntry,
    Tradeline,
};
use crate::workflows::{CreditDataSource, GateStore, ProjectionStore, ReviewRequest};

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert_tradeline(&self, tradeline: &Tradeline) -> Result<Tradeline, AppError> {
        sqlx::query_as::<_, Tradeline>(
            r#"
            INSERT INTO tradelines (
                id, user_id, creditor_name, account_type, credit_limit, current_balance,
                payment_status, is_negative, opened_on, source, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(tradeline.id)
        .bind(tradeline.user_id)
        .bind(&tradeline.creditor_name)
        .bind(&tradeline.account_type)
        .bind(tradeline.credit_limit)
        .bind(tradeline.current_balance)
        .bind(&tradeline.payment_status)
        .bind(tradeline.is_negative)
        .bind(tradeline.opened_on)
        .bind(&tradeline.source)
        .bind(tradeline.created_at)
        .fetch_one(&self.pool)
        .await
        .context("inserting tradeline")
    }

    /// Deletes a tradeline unless a dispute in review or submitted references it.
    pub async fn delete_tradeline(&self, user_id: Uuid, tradeline_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let referencing = sqlx::query_as::<_, Dispute>(
            r#"
            SELECT * FROM disputes
            WHERE user_id = $1 AND $2 = ANY(tradeline_ids)
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(tradeline_id)
        .fetch_all(&mut *tx)
        .await
        .context("loading disputes for tradeline")?;

        if let Some(dispute) = referencing.iter().find(|d| disputes::locks_tradelines(d)) {
            return Err(AppError::Conflict(format!(
                "Tradeline is referenced by dispute {} ({})",
                dispute.id, dispute.status
            )));
        }

        let result = sqlx::query("DELETE FROM tradelines WHERE id = $1 AND user_id = $2")
            .bind(tradeline_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("deleting tradeline")?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Tradeline {} not found",
                tradeline_id
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_score(&self, entry: &ScoreHistoryEntry) -> Result<ScoreHistoryEntry, AppError> {
        sqlx::query_as::<_, ScoreHistoryEntry>(
            r#"
            INSERT INTO score_history (id, user_id, score, bureau, recorded_at, source)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.score)
        .bind(&entry.bureau)
        .bind(entry.recorded_at)
        .bind(&entry.source)
        .fetch_one(&self.pool)
        .await
        .context("inserting score history entry")
    }

    pub async fn insert_inquiry(&self, inquiry: &CreditInquiry) -> Result<CreditInquiry, AppError> {
        sqlx::query_as::<_, CreditInquiry>(
            r#"
            INSERT INTO credit_inquiries (id, user_id, bureau, creditor_name, inquired_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(inquiry.id)
        .bind(inquiry.user_id)
        .bind(&inquiry.bureau)
        .bind(&inquiry.creditor_name)
        .bind(inquiry.inquired_at)
        .fetch_one(&self.pool)
        .await
        .context("inserting credit inquiry")
    }

    pub async fn list_projections(&self, user_id: Uuid) -> Result<Vec<FundingProjectionRow>, AppError> {
        sqlx::query_as::<_, FundingProjectionRow>(
            "SELECT * FROM funding_projections WHERE user_id = $1 ORDER BY target_amount",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("loading funding projections")
    }

    pub async fn insert_consent(&self, consent: &Consent) -> Result<Consent, AppError> {
        sqlx::query_as::<_, Consent>(
            r#"
            INSERT INTO consents (id, user_id, consent_type, text_snapshot, text_sha256, signed_at, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(consent.id)
        .bind(consent.user_id)
        .bind(&consent.consent_type)
        .bind(&consent.text_snapshot)
        .bind(&consent.text_sha256)
        .bind(consent.signed_at)
        .bind(&consent.user_agent)
        .fetch_one(&self.pool)
        .await
        .context("inserting consent")
    }

    pub async fn insert_dispute(&self, dispute: &Dispute) -> Result<Dispute, AppError> {
        sqlx::query_as::<_, Dispute>(
            r#"
            INSERT INTO disputes (id, user_id, tradeline_ids, bureau, reason, status, action_id, created_at, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(dispute.id)
        .bind(dispute.user_id)
        .bind(&dispute.tradeline_ids)
        .bind(&dispute.bureau)
        .bind(&dispute.reason)
        .bind(&dispute.status)
        .bind(dispute.action_id)
        .bind(dispute.created_at)
        .bind(dispute.submitted_at)
        .fetch_one(&self.pool)
        .await
        .context("inserting dispute")
    }

    /// Approval queue, oldest first.
    pub async fn list_approvals(&self, status: Option<ApprovalStatus>) -> Result<Vec<AdminApproval>, AppError> {
        sqlx::query_as::<_, AdminApproval>(
            r#"
            SELECT * FROM admin_approvals
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at
            LIMIT 500
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .context("listing approvals")
    }
}

impl CreditDataSource for PgStorage {
    async fn tradelines(&self, user_id: Uuid) -> Result<Vec<Tradeline>, AppError> {
        sqlx::query_as::<_, Tradeline>(
            "SELECT * FROM tradelines WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("loading tradelines")
    }

    async fn score_history(&self, user_id: Uuid) -> Result<Vec<ScoreHistoryEntry>, AppError> {
        sqlx::query_as::<_, ScoreHistoryEntry>(
            "SELECT * FROM score_history WHERE user_id = $1 ORDER BY recorded_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("loading score history")
    }

    async fn inquiries(&self, user_id: Uuid) -> Result<Vec<CreditInquiry>, AppError> {
        sqlx::query_as::<_, CreditInquiry>(
            "SELECT * FROM credit_inquiries WHERE user_id = $1 ORDER BY inquired_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("loading credit inquiries")
    }
}

impl ProjectionStore for PgStorage {
    async fn upsert_projections(&self, rows: &[FundingProjectionRow]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO funding_projections (
                    user_id, target_amount, target_month, probability, confidence,
                    requirements, assumptions, calculated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (user_id, target_amount) DO UPDATE
                SET target_month = EXCLUDED.target_month,
                    probability = EXCLUDED.probability,
                    confidence = EXCLUDED.confidence,
                    requirements = EXCLUDED.requirements,
                    assumptions = EXCLUDED.assumptions,
                    calculated_at = EXCLUDED.calculated_at
                "#,
            )
            .bind(row.user_id)
            .bind(row.target_amount)
            .bind(&row.target_month)
            .bind(row.probability)
            .bind(&row.confidence)
            .bind(&row.requirements)
            .bind(&row.assumptions)
            .bind(row.calculated_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("upserting projection for {}", row.target_amount))?;
        }

        tx.commit().await?;
        Ok(())
    }
}

impl GateStore for PgStorage {
    async fn find_consent(&self, consent_id: Uuid) -> Result<Option<Consent>, AppError> {
        sqlx::query_as::<_, Consent>("SELECT * FROM consents WHERE id = $1")
            .bind(consent_id)
            .fetch_optional(&self.pool)
            .await
            .context("loading consent")
    }

    async fn open_review(&self, review: ReviewRequest) -> Result<(), AppError> {
        let ReviewRequest {
            action,
            approval,
            dispute_id,
        } = review;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO gated_actions (id, user_id, action_type, consent_id, status, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(action.id)
        .bind(action.user_id)
        .bind(&action.action_type)
        .bind(action.consent_id)
        .bind(ActionStatus::Created.as_str())
        .bind(&action.payload)
        .bind(action.created_at)
        .execute(&mut *tx)
        .await
        .context("inserting gated action")?;

        let moved = sqlx::query(
            r#"
            UPDATE gated_actions
            SET status = $2, updated_at = $3
            WHERE id = $1 AND status = 'created'
            "#,
        )
        .bind(action.id)
        .bind(&action.status)
        .bind(action.created_at)
        .execute(&mut *tx)
        .await
        .context("moving action to review")?;

        if moved.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Action {} left created state concurrently",
                action.id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO admin_approvals (id, requested_by, related_action_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(approval.id)
        .bind(approval.requested_by)
        .bind(approval.related_action_id)
        .bind(&approval.status)
        .bind(approval.created_at)
        .execute(&mut *tx)
        .await
        .context("inserting admin approval")?;

        if let Some(dispute_id) = dispute_id {
            let result = sqlx::query(
                r#"
                UPDATE disputes
                SET status = 'pending_review', action_id = $2
                WHERE id = $1 AND user_id = $3 AND status = 'draft'
                "#,
            )
            .bind(dispute_id)
            .bind(action.id)
            .bind(action.user_id)
            .execute(&mut *tx)
            .await
            .context("moving dispute to review")?;

            if result.rows_affected() == 0 {
                return Err(AppError::Conflict(format!(
                    "Dispute {} is no longer a draft",
                    dispute_id
                )));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_action(&self, user_id: Uuid, action_id: Uuid) -> Result<Option<GatedAction>, AppError> {
        sqlx::query_as::<_, GatedAction>(
            "SELECT * FROM gated_actions WHERE id = $1 AND user_id = $2",
        )
        .bind(action_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading gated action")
    }

    async fn find_dispute(&self, user_id: Uuid, dispute_id: Uuid) -> Result<Option<Dispute>, AppError> {
        sqlx::query_as::<_, Dispute>("SELECT * FROM disputes WHERE id = $1 AND user_id = $2")
            .bind(dispute_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("loading dispute")
    }

    async fn complete_submission(&self, action: &GatedAction, now: DateTime<Utc>) -> Result<GatedAction, AppError> {
        let mut tx = self.pool.begin().await?;

        let submitted = sqlx::query_as::<_, GatedAction>(
            r#"
            UPDATE gated_actions
            SET status = 'submitted', updated_at = $2
            WHERE id = $1 AND status = 'approved'
            RETURNING *
            "#,
        )
        .bind(action.id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .context("marking action submitted")?
        .ok_or_else(|| AppError::Conflict(format!("Action {} is not approved", action.id)))?;

        if action.action_type.parse::<ActionKind>()? == ActionKind::DisputeSubmission {
            sqlx::query(
                r#"
                UPDATE disputes
                SET status = 'submitted', submitted_at = $2
                WHERE action_id = $1 AND status = 'pending_review'
                "#,
            )
            .bind(action.id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("marking dispute submitted")?;
        }

        tx.commit().await?;
        Ok(submitted)
    }

    async fn decide(
        &self,
        approval_id: Uuid,
        request: &AdminDecisionRequest,
        now: DateTime<Utc>,
    ) -> Result<AdminApproval, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, AdminApproval>(
            "SELECT * FROM admin_approvals WHERE id = $1 FOR UPDATE",
        )
        .bind(approval_id)
        .fetch_optional(&mut *tx)
        .await
        .context("locking approval")?
        .ok_or_else(|| AppError::NotFound(format!("Approval {} not found", approval_id)))?;

        let action_status: String = sqlx::query_scalar(
            "SELECT status FROM gated_actions WHERE id = $1 FOR UPDATE",
        )
        .bind(current.related_action_id)
        .fetch_one(&mut *tx)
        .await
        .context("locking related action")?;

        let (approval_status, action_status) = approval::decide(
            current.status.parse()?,
            action_status.parse()?,
            request.decision,
        )?;

        let decided = sqlx::query_as::<_, AdminApproval>(
            r#"
            UPDATE admin_approvals
            SET status = $2, decided_at = $3, decided_by = $4, notes = $5
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(approval_id)
        .bind(approval_status.as_str())
        .bind(now)
        .bind(&request.decided_by)
        .bind(&request.notes)
        .fetch_one(&mut *tx)
        .await
        .context("recording decision")?;

        sqlx::query("UPDATE gated_actions SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(current.related_action_id)
            .bind(action_status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("updating action status")?;

        if let Some(dispute_status) = disputes::status_for_action(action_status) {
            sqlx::query("UPDATE disputes SET status = $2 WHERE action_id = $1")
                .bind(current.related_action_id)
                .bind(dispute_status.as_str())
                .execute(&mut *tx)
                .await
                .context("updating dispute status")?;
        }

        tx.commit().await?;
        Ok(decided)
    }

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (user_id, event, action_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.event)
        .bind(entry.action_id)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .context("writing audit entry")?;
        Ok(())
    }
}
