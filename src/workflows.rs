//! Request-level flows that tie the pure funding engine to storage, the
//! consent/approval gate, rate limiting and admin notification.
//!
//! Flows are generic over the store traits below so the same code runs against
//! Postgres in production and in-memory stores in tests. Current time is always
//! passed in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::approval::{self, ActionPayload};
use crate::catalog::FUNDING_CATALOG;
use crate::consent::require_consent;
use crate::disputes;
use crate::errors::AppError;
use crate::million_mode::{build_sequence, MillionModePlan};
use crate::models::{
    ActionKind, ActionStatus, AdminApproval, AdminDecisionRequest, ApprovalStatus, AuditEntry,
    Consent, ConsentType, CreditInquiry, Dispute, FundingProjectionRow, GatedAction, ScoreDisplay,
    ScoreHistoryEntry, Tradeline,
};
use crate::notifier::AdminNotifier;
use crate::profile::{derive_profile, ProfileReading};
use crate::rate_limit::RateLimiter;
use crate::timeline::{project_timeline, resolve_targets, FundingProjection};

pub const MILLION_MODE_OPERATION: &str = "million_mode";
pub const DISPUTE_SUBMISSION_OPERATION: &str = "dispute_submission";

/// Read access to a user's credit records.
#[allow(async_fn_in_trait)]
pub trait CreditDataSource {
    async fn tradelines(&self, user_id: Uuid) -> Result<Vec<Tradeline>, AppError>;
    async fn score_history(&self, user_id: Uuid) -> Result<Vec<ScoreHistoryEntry>, AppError>;
    async fn inquiries(&self, user_id: Uuid) -> Result<Vec<CreditInquiry>, AppError>;
}

#[allow(async_fn_in_trait)]
pub trait ProjectionStore {
    /// Inserts or replaces projections keyed by (user_id, target_amount).
    async fn upsert_projections(&self, rows: &[FundingProjectionRow]) -> Result<(), AppError>;
}

/// A gated action together with the approval that reviews it.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub action: GatedAction,
    pub approval: AdminApproval,
    /// Draft dispute that moves to review alongside the action.
    pub dispute_id: Option<Uuid>,
}

/// Storage behind the consent/approval gate.
#[allow(async_fn_in_trait)]
pub trait GateStore {
    async fn find_consent(&self, consent_id: Uuid) -> Result<Option<Consent>, AppError>;
    /// Writes the action and its approval (and dispute status, if any) atomically.
    async fn open_review(&self, review: ReviewRequest) -> Result<(), AppError>;
    async fn find_action(&self, user_id: Uuid, action_id: Uuid) -> Result<Option<GatedAction>, AppError>;
    async fn find_dispute(&self, user_id: Uuid, dispute_id: Uuid) -> Result<Option<Dispute>, AppError>;
    /// Moves an approved action (and its dispute) to submitted.
    async fn complete_submission(&self, action: &GatedAction, now: DateTime<Utc>) -> Result<GatedAction, AppError>;
    /// Applies an admin decision using [`approval::decide`].
    async fn decide(
        &self,
        approval_id: Uuid,
        request: &AdminDecisionRequest,
        now: DateTime<Utc>,
    ) -> Result<AdminApproval, AppError>;
    async fn record_audit(&self, entry: AuditEntry) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TimelineOutcome {
    Measured {
        score_display: ScoreDisplay,
        projections: Vec<FundingProjection>,
    },
    /// No score history. Nothing was computed or stored.
    InsufficientData { score_display: ScoreDisplay },
}

/// Result of opening a review for a gated action.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub action_id: Uuid,
    pub approval_id: Uuid,
    pub status: ActionStatus,
    /// Secondary writes (audit, notification) that failed.
    pub warnings: Vec<String>,
}

/// An admin decision plus any audit write that failed.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    #[serde(flatten)]
    pub approval: AdminApproval,
    pub warnings: Vec<String>,
}

/// A submitted action plus any audit write that failed.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    #[serde(flatten)]
    pub action: GatedAction,
    pub warnings: Vec<String>,
}

/// The queued plan. Failed secondary writes are appended to `plan.warnings`.
#[derive(Debug, Clone, Serialize)]
pub struct MillionModeOutcome {
    #[serde(flatten)]
    pub plan: MillionModePlan,
    pub action_id: Uuid,
    pub approval_id: Uuid,
    pub status: ActionStatus,
}

pub async fn load_profile<S: CreditDataSource>(
    store: &S,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ProfileReading, AppError> {
    let tradelines = store.tradelines(user_id).await?;
    let history = store.score_history(user_id).await?;
    let inquiries = store.inquiries(user_id).await?;
    Ok(derive_profile(&tradelines, &history, &inquiries, now))
}

/// Recomputes and upserts a user's funding timeline.
pub async fn recalculate_timeline<S>(
    store: &S,
    user_id: Uuid,
    targets: Option<&[i64]>,
    now: DateTime<Utc>,
) -> Result<TimelineOutcome, AppError>
where
    S: CreditDataSource + ProjectionStore,
{
    let targets = resolve_targets(targets)?;
    let reading = load_profile(store, user_id, now).await?;

    let Some(profile) = reading.profile() else {
        tracing::info!(%user_id, "No score history, timeline unavailable");
        return Ok(TimelineOutcome::InsufficientData {
            score_display: reading.score_display(),
        });
    };

    let projections = project_timeline(profile, &targets, now);
    let rows: Vec<FundingProjectionRow> = projections
        .iter()
        .cloned()
        .map(|p| p.into_row(user_id, now))
        .collect();
    store.upsert_projections(&rows).await?;

    tracing::info!(%user_id, count = rows.len(), "Funding timeline recalculated");
    Ok(TimelineOutcome::Measured {
        score_display: reading.score_display(),
        projections,
    })
}

async fn enforce_rate_limit<L: RateLimiter>(
    limiter: &L,
    user_id: Uuid,
    operation: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if limiter.allow(user_id, operation, now).await? {
        Ok(())
    } else {
        Err(AppError::TooManyRequests(format!(
            "{} limit reached, try again later",
            operation
        )))
    }
}

async fn check_consent<S: GateStore>(
    store: &S,
    user_id: Uuid,
    consent_id: Uuid,
    expected: ConsentType,
) -> Result<Uuid, AppError> {
    let consent = store.find_consent(consent_id).await?;
    require_consent(consent.as_ref(), user_id, expected).map_err(|rejection| {
        tracing::warn!(%user_id, %consent_id, %rejection, "Consent check failed");
        AppError::from(rejection)
    })
}

fn review_request(
    user_id: Uuid,
    kind: ActionKind,
    consent_id: Uuid,
    payload: &ActionPayload,
    dispute_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<ReviewRequest, AppError> {
    let status = approval::transition(ActionStatus::Created, ActionStatus::PendingReview)?;
    let action_id = Uuid::new_v4();

    Ok(ReviewRequest {
        action: GatedAction {
            id: action_id,
            user_id,
            action_type: kind.as_str().to_string(),
            consent_id,
            status: status.as_str().to_string(),
            payload: serde_json::to_value(payload)?,
            created_at: now,
            updated_at: None,
        },
        approval: AdminApproval {
            id: Uuid::new_v4(),
            requested_by: user_id,
            related_action_id: action_id,
            status: ApprovalStatus::Pending.as_str().to_string(),
            decided_at: None,
            decided_by: None,
            notes: None,
            created_at: now,
        },
        dispute_id,
    })
}

const AUDIT_WARNING: &str = "Audit record could not be written";

/// Writes an audit entry. A failed write is logged and pushed onto `warnings`.
async fn write_audit<S: GateStore>(store: &S, audit: AuditEntry, warnings: &mut Vec<String>) {
    let action_id = audit.action_id;
    if let Err(e) = store.record_audit(audit).await {
        tracing::warn!(?action_id, "Audit write failed: {}", e);
        warnings.push(AUDIT_WARNING.to_string());
    }
}

/// Audit and notification after the review is open. Failures become warnings.
async fn after_review_opened<S: GateStore>(
    store: &S,
    notifier: Option<&AdminNotifier>,
    review: &ReviewRequest,
    kind: ActionKind,
    details: serde_json::Value,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let action = &review.action;

    let audit = AuditEntry {
        user_id: action.user_id,
        event: format!("{}_review_requested", kind),
        action_id: Some(action.id),
        details,
        created_at: now,
    };
    write_audit(store, audit, &mut warnings).await;

    if let Some(notifier) = notifier {
        if let Err(e) = notifier
            .review_requested(kind, action.id, review.approval.id, action.user_id)
            .await
        {
            tracing::warn!(action_id = %action.id, "Admin notification failed: {}", e);
            warnings.push("Admin notification could not be sent".to_string());
        }
    }
    warnings
}

/// Builds a Million Mode plan and queues it for admin review.
///
/// Order of checks: rate limit, consent, profile. Any failure returns before
/// anything is written. On success exactly one action and one approval exist
/// for this call; the plan itself is never executed here.
pub async fn activate_million_mode<S, L>(
    store: &S,
    limiter: &L,
    notifier: Option<&AdminNotifier>,
    user_id: Uuid,
    consent_id: Uuid,
    max_hard_pulls_48h: u32,
    now: DateTime<Utc>,
) -> Result<MillionModeOutcome, AppError>
where
    S: CreditDataSource + GateStore,
    L: RateLimiter,
{
    enforce_rate_limit(limiter, user_id, MILLION_MODE_OPERATION, now).await?;
    let consent_id = check_consent(store, user_id, consent_id, ConsentType::MillionMode).await?;

    let reading = load_profile(store, user_id, now).await?;
    let profile = reading.profile().ok_or_else(|| {
        AppError::Unprocessable(
            "No score history on file; add a credit score before activating Million Mode"
                .to_string(),
        )
    })?;

    let plan = build_sequence(profile, FUNDING_CATALOG, max_hard_pulls_48h, now)?;
    let payload = ActionPayload::MillionMode {
        plan: plan.clone(),
        score: profile.score,
    };
    let review = review_request(user_id, ActionKind::MillionMode, consent_id, &payload, None, now)?;
    store.open_review(review.clone()).await?;

    tracing::info!(
        %user_id,
        action_id = %review.action.id,
        steps = plan.sequence.len(),
        projected_total = plan.projected_total,
        "Million Mode plan queued for admin review"
    );

    let details = json!({
        "consent_id": consent_id,
        "projected_total": plan.projected_total,
        "steps": plan.sequence.len(),
        "risk_level": plan.risk_level,
    });
    let side_effect_warnings =
        after_review_opened(store, notifier, &review, ActionKind::MillionMode, details, now).await;

    let mut plan = plan;
    plan.warnings.extend(side_effect_warnings);
    Ok(MillionModeOutcome {
        plan,
        action_id: review.action.id,
        approval_id: review.approval.id,
        status: ActionStatus::PendingReview,
    })
}

/// Queues a draft dispute for admin review.
pub async fn request_dispute_submission<S, L>(
    store: &S,
    limiter: &L,
    notifier: Option<&AdminNotifier>,
    user_id: Uuid,
    dispute_id: Uuid,
    consent_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome, AppError>
where
    S: GateStore,
    L: RateLimiter,
{
    enforce_rate_limit(limiter, user_id, DISPUTE_SUBMISSION_OPERATION, now).await?;
    let consent_id =
        check_consent(store, user_id, consent_id, ConsentType::DisputeSubmission).await?;

    let dispute = store
        .find_dispute(user_id, dispute_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Dispute {} not found", dispute_id)))?;
    disputes::ensure_submittable(&dispute)?;

    let payload = ActionPayload::DisputeSubmission {
        dispute_id,
        tradeline_ids: dispute.tradeline_ids.clone(),
    };
    let review = review_request(
        user_id,
        ActionKind::DisputeSubmission,
        consent_id,
        &payload,
        Some(dispute_id),
        now,
    )?;
    store.open_review(review.clone()).await?;

    tracing::info!(%user_id, %dispute_id, action_id = %review.action.id, "Dispute queued for admin review");

    let details = json!({
        "consent_id": consent_id,
        "dispute_id": dispute_id,
        "tradelines": dispute.tradeline_ids.len(),
    });
    let warnings = after_review_opened(
        store,
        notifier,
        &review,
        ActionKind::DisputeSubmission,
        details,
        now,
    )
    .await;

    Ok(ReviewOutcome {
        action_id: review.action.id,
        approval_id: review.approval.id,
        status: ActionStatus::PendingReview,
        warnings,
    })
}

/// Records an admin decision on a pending approval.
pub async fn decide_approval<S: GateStore>(
    store: &S,
    approval_id: Uuid,
    request: &AdminDecisionRequest,
    now: DateTime<Utc>,
) -> Result<DecisionOutcome, AppError> {
    let decided = store.decide(approval_id, request, now).await?;

    tracing::info!(
        %approval_id,
        action_id = %decided.related_action_id,
        status = %decided.status,
        "Admin decision recorded"
    );

    let audit = AuditEntry {
        user_id: decided.requested_by,
        event: format!("approval_{}", decided.status),
        action_id: Some(decided.related_action_id),
        details: json!({
            "approval_id": approval_id,
            "decided_by": decided.decided_by,
            "notes": decided.notes,
        }),
        created_at: now,
    };
    let mut warnings = Vec::new();
    write_audit(store, audit, &mut warnings).await;
    Ok(DecisionOutcome {
        approval: decided,
        warnings,
    })
}

/// Marks an approved action as submitted. The consent it references must
/// still pass the gate.
pub async fn submit_action<S: GateStore>(
    store: &S,
    user_id: Uuid,
    action_id: Uuid,
    now: DateTime<Utc>,
) -> Result<SubmissionOutcome, AppError> {
    let action = store
        .find_action(user_id, action_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Action {} not found", action_id)))?;

    let kind: ActionKind = action.action_type.parse()?;
    check_consent(store, user_id, action.consent_id, kind.required_consent()).await?;

    let current: ActionStatus = action.status.parse()?;
    approval::transition(current, ActionStatus::Submitted)?;

    let submitted = store.complete_submission(&action, now).await?;
    tracing::info!(%user_id, %action_id, kind = %kind, "Gated action submitted");

    let audit = AuditEntry {
        user_id,
        event: format!("{}_submitted", kind),
        action_id: Some(action_id),
        details: json!({ "consent_id": action.consent_id }),
        created_at: now,
    };
    let mut warnings = Vec::new();
    write_audit(store, audit, &mut warnings).await;
    Ok(SubmissionOutcome {
        action: submitted,
        warnings,
    })
}
