use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

/// Declares a unit enum stored as snake_case text in Postgres and JSON.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::InternalError(format!(
                        "unknown {} value '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum! {
    /// Credit reporting agency.
    pub enum Bureau {
        Experian => "experian",
        Equifax => "equifax",
        Transunion => "transunion",
    }
}

text_enum! {
    pub enum Confidence {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

text_enum! {
    pub enum RiskLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

text_enum! {
    /// What a signed consent authorizes.
    pub enum ConsentType {
        MillionMode => "million_mode",
        DisputeSubmission => "dispute_submission",
        DataProcessing => "data_processing",
    }
}

text_enum! {
    /// High-risk actions that go through admin review.
    pub enum ActionKind {
        MillionMode => "million_mode",
        DisputeSubmission => "dispute_submission",
    }
}

text_enum! {
    pub enum ActionStatus {
        Created => "created",
        PendingReview => "pending_review",
        Approved => "approved",
        Submitted => "submitted",
        Rejected => "rejected",
    }
}

text_enum! {
    pub enum ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    pub enum DisputeStatus {
        Draft => "draft",
        PendingReview => "pending_review",
        Submitted => "submitted",
        Rejected => "rejected",
    }
}

text_enum! {
    pub enum TradelineSource {
        Manual => "manual",
        ReportExtraction => "report_extraction",
    }
}

text_enum! {
    pub enum Decision {
        Approve => "approve",
        Reject => "reject",
    }
}

impl ActionKind {
    /// The consent type that must back this action.
    pub fn required_consent(&self) -> ConsentType {
        match self {
            ActionKind::MillionMode => ConsentType::MillionMode,
            ActionKind::DisputeSubmission => ConsentType::DisputeSubmission,
        }
    }
}

// ============ Database Models ============

/// A single credit account from a credit report or manual entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tradeline {
    pub id: Uuid,
    pub user_id: Uuid,
    pub creditor_name: String,
    /// Free text such as "revolving", "installment", "mortgage".
    pub account_type: String,
    /// Credit limit in whole dollars. Installment loans usually have none.
    pub credit_limit: Option<i64>,
    pub current_balance: i64,
    pub payment_status: String,
    pub is_negative: bool,
    pub opened_on: Option<NaiveDate>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only score observation from one bureau.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub score: i32,
    pub bureau: String,
    pub recorded_at: DateTime<Utc>,
    pub source: String,
}

/// Hard inquiry on the user's file.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreditInquiry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bureau: String,
    pub creditor_name: String,
    pub inquired_at: DateTime<Utc>,
}

/// Stored projection, unique per (user_id, target_amount).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FundingProjectionRow {
    pub user_id: Uuid,
    pub target_amount: i64,
    pub target_month: String,
    pub probability: i32,
    pub confidence: String,
    pub requirements: Vec<String>,
    pub assumptions: Vec<String>,
    pub calculated_at: DateTime<Utc>,
}

/// Signed consent snapshot. Never updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Consent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub consent_type: String,
    pub text_snapshot: String,
    /// SHA-256 of `text_snapshot`, hex encoded.
    pub text_sha256: String,
    pub signed_at: DateTime<Utc>,
    pub user_agent: Option<String>,
}

/// A high-risk action waiting on, or past, admin review.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GatedAction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action_type: String,
    pub consent_id: Uuid,
    pub status: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdminApproval {
    pub id: Uuid,
    pub requested_by: Uuid,
    pub related_action_id: Uuid,
    pub status: String,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Dispute {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tradeline_ids: Vec<Uuid>,
    pub bureau: String,
    pub reason: String,
    pub status: String,
    pub action_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Audit trail entry. Written best-effort after the primary operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: Uuid,
    pub event: String,
    pub action_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ============ Request Models ============

#[derive(Debug, Clone, Deserialize)]
pub struct NewTradeline {
    pub creditor_name: String,
    pub account_type: String,
    pub credit_limit: Option<i64>,
    pub current_balance: i64,
    pub payment_status: String,
    #[serde(default)]
    pub is_negative: bool,
    pub opened_on: Option<NaiveDate>,
    pub source: Option<TradelineSource>,
}

impl NewTradeline {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.creditor_name.trim().is_empty() {
            return Err(AppError::BadRequest("creditor_name is required".to_string()));
        }
        if self.account_type.trim().is_empty() {
            return Err(AppError::BadRequest("account_type is required".to_string()));
        }
        if self.current_balance < 0 {
            return Err(AppError::BadRequest(
                "current_balance cannot be negative".to_string(),
            ));
        }
        if matches!(self.credit_limit, Some(limit) if limit < 0) {
            return Err(AppError::BadRequest(
                "credit_limit cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewScoreEntry {
    pub score: i32,
    pub bureau: Bureau,
    pub recorded_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl NewScoreEntry {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(300..=850).contains(&self.score) {
            return Err(AppError::BadRequest(format!(
                "score must be between 300 and 850, got {}",
                self.score
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInquiry {
    pub bureau: Bureau,
    pub creditor_name: String,
    pub inquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbabilityRequest {
    pub score: i32,
    pub target_amount: i64,
    pub months_available: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineRequest {
    /// Overrides the default target ladder.
    pub targets: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewConsent {
    pub consent_type: ConsentType,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatedActionRequest {
    pub consent_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDispute {
    pub tradeline_ids: Vec<Uuid>,
    pub bureau: Bureau,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminDecisionRequest {
    pub decision: Decision,
    pub notes: Option<String>,
    pub decided_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalQuery {
    pub status: Option<ApprovalStatus>,
}

// ============ Response Models ============

/// A score as shown to the user. `measured: false` marks a placeholder
/// that must never be presented as a real reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDisplay {
    pub value: u16,
    pub measured: bool,
}

/// Placeholder shown while a user has no score history.
pub const DISPLAY_PLACEHOLDER_SCORE: u16 = 580;

impl ScoreDisplay {
    pub fn measured(score: u16) -> Self {
        Self {
            value: score,
            measured: true,
        }
    }

    pub fn placeholder() -> Self {
        Self {
            value: DISPLAY_PLACEHOLDER_SCORE,
            measured: false,
        }
    }
}
