use crate::calculator::{self, ProbabilityResult};
use crate::config::Config;
use crate::consent::new_consent;
use crate::disputes;
use crate::errors::AppError;
use crate::models::*;
use crate::notifier::AdminNotifier;
use crate::profile::{ProfileReading, MAX_SCORE, MIN_SCORE};
use crate::rate_limit::RateLimitBackend;
use crate::storage::PgStorage;
use crate::timeline::MAX_TARGET_AMOUNT;
use crate::workflows::{
    self, CreditDataSource, MillionModeOutcome, ReviewOutcome, SubmissionOutcome, TimelineOutcome,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Postgres-backed stores.
    pub storage: PgStorage,
    /// Application configuration.
    pub config: Config,
    /// Limits Million Mode activations per user.
    pub million_mode_limiter: RateLimitBackend,
    /// Limits dispute submission requests per user.
    pub dispute_limiter: RateLimitBackend,
    /// Admin notification client (optional).
    pub notifier: Option<AdminNotifier>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "credit-funding-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/funding/probability
///
/// Stateless single-target approval estimate.
pub async fn calculate_probability(
    Json(request): Json<ProbabilityRequest>,
) -> Result<Json<ProbabilityResult>, AppError> {
    if !(i32::from(MIN_SCORE)..=i32::from(MAX_SCORE)).contains(&request.score) {
        return Err(AppError::BadRequest(format!(
            "score must be between {} and {}",
            MIN_SCORE, MAX_SCORE
        )));
    }
    if request.target_amount <= 0 || request.target_amount > MAX_TARGET_AMOUNT {
        return Err(AppError::BadRequest(format!(
            "target_amount must be between 1 and {}",
            MAX_TARGET_AMOUNT
        )));
    }

    Ok(Json(calculator::calculate_probability(
        request.score,
        request.target_amount,
        request.months_available,
    )))
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub reading: ProfileReading,
    pub score_display: ScoreDisplay,
}

/// GET /api/v1/users/:user_id/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, AppError> {
    let reading = workflows::load_profile(&state.storage, user_id, Utc::now()).await?;
    Ok(Json(ProfileResponse {
        score_display: reading.score_display(),
        reading,
    }))
}

/// GET /api/v1/users/:user_id/tradelines
pub async fn list_tradelines(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Tradeline>>, AppError> {
    Ok(Json(state.storage.tradelines(user_id).await?))
}

/// POST /api/v1/users/:user_id/tradelines
pub async fn add_tradeline(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<NewTradeline>,
) -> Result<(StatusCode, Json<Tradeline>), AppError> {
    request.validate()?;

    let tradeline = Tradeline {
        id: Uuid::new_v4(),
        user_id,
        creditor_name: request.creditor_name.trim().to_string(),
        account_type: request.account_type.trim().to_lowercase(),
        credit_limit: request.credit_limit,
        current_balance: request.current_balance,
        payment_status: request.payment_status,
        is_negative: request.is_negative,
        opened_on: request.opened_on,
        source: request
            .source
            .unwrap_or(TradelineSource::Manual)
            .as_str()
            .to_string(),
        created_at: Utc::now(),
    };
    let stored = state.storage.insert_tradeline(&tradeline).await?;

    tracing::info!(%user_id, tradeline_id = %stored.id, "Tradeline added");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// DELETE /api/v1/users/:user_id/tradelines/:tradeline_id
pub async fn delete_tradeline(
    State(state): State<Arc<AppState>>,
    Path((user_id, tradeline_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.storage.delete_tradeline(user_id, tradeline_id).await?;
    tracing::info!(%user_id, %tradeline_id, "Tradeline deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/users/:user_id/scores
pub async fn add_score(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<NewScoreEntry>,
) -> Result<(StatusCode, Json<ScoreHistoryEntry>), AppError> {
    request.validate()?;

    let entry = ScoreHistoryEntry {
        id: Uuid::new_v4(),
        user_id,
        score: request.score,
        bureau: request.bureau.as_str().to_string(),
        recorded_at: request.recorded_at.unwrap_or_else(Utc::now),
        source: request.source.unwrap_or_else(|| "manual".to_string()),
    };
    let stored = state.storage.insert_score(&entry).await?;

    tracing::info!(%user_id, bureau = %stored.bureau, "Score recorded");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// POST /api/v1/users/:user_id/inquiries
pub async fn add_inquiry(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<NewInquiry>,
) -> Result<(StatusCode, Json<CreditInquiry>), AppError> {
    if request.creditor_name.trim().is_empty() {
        return Err(AppError::BadRequest("creditor_name is required".to_string()));
    }
    if request.inquired_at > Utc::now() {
        return Err(AppError::BadRequest(
            "inquired_at cannot be in the future".to_string(),
        ));
    }

    let inquiry = CreditInquiry {
        id: Uuid::new_v4(),
        user_id,
        bureau: request.bureau.as_str().to_string(),
        creditor_name: request.creditor_name.trim().to_string(),
        inquired_at: request.inquired_at,
    };
    let stored = state.storage.insert_inquiry(&inquiry).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// POST /api/v1/users/:user_id/funding-timeline
///
/// Recomputes projections and upserts them. An empty body uses the default
/// target ladder; a body that does not parse is a 400.
pub async fn recalculate_timeline(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<TimelineOutcome>, AppError> {
    let request = parse_timeline_request(&body)?;
    let outcome = workflows::recalculate_timeline(
        &state.storage,
        user_id,
        request.targets.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(outcome))
}

fn parse_timeline_request(body: &[u8]) -> Result<TimelineRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TimelineRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid timeline request: {}", e)))
}

/// GET /api/v1/users/:user_id/funding-timeline
pub async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<FundingProjectionRow>>, AppError> {
    Ok(Json(state.storage.list_projections(user_id).await?))
}

/// POST /api/v1/users/:user_id/consents
///
/// Stores the exact text the user signed plus its digest.
pub async fn record_consent(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<NewConsent>,
) -> Result<(StatusCode, Json<Consent>), AppError> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.chars().take(512).collect::<String>());

    let consent = new_consent(
        user_id,
        request.consent_type,
        &request.text,
        user_agent,
        Utc::now(),
    )?;
    let stored = state.storage.insert_consent(&consent).await?;

    tracing::info!(%user_id, consent_id = %stored.id, consent_type = %stored.consent_type, "Consent recorded");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// POST /api/v1/users/:user_id/million-mode
///
/// Builds the funding sequence and queues it for admin review. Nothing is
/// submitted to any lender here.
pub async fn activate_million_mode(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<GatedActionRequest>,
) -> Result<(StatusCode, Json<MillionModeOutcome>), AppError> {
    let outcome = workflows::activate_million_mode(
        &state.storage,
        &state.million_mode_limiter,
        state.notifier.as_ref(),
        user_id,
        request.consent_id,
        state.config.max_hard_pulls_48h,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// POST /api/v1/users/:user_id/disputes
pub async fn create_dispute(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<NewDispute>,
) -> Result<(StatusCode, Json<Dispute>), AppError> {
    let owned = state.storage.tradelines(user_id).await?;
    let dispute = disputes::new_draft(user_id, &request, &owned, Utc::now())?;
    let stored = state.storage.insert_dispute(&dispute).await?;

    tracing::info!(%user_id, dispute_id = %stored.id, "Dispute draft created");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// POST /api/v1/users/:user_id/disputes/:dispute_id/submit
pub async fn submit_dispute(
    State(state): State<Arc<AppState>>,
    Path((user_id, dispute_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<GatedActionRequest>,
) -> Result<(StatusCode, Json<ReviewOutcome>), AppError> {
    let outcome = workflows::request_dispute_submission(
        &state.storage,
        &state.dispute_limiter,
        state.notifier.as_ref(),
        user_id,
        dispute_id,
        request.consent_id,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// POST /api/v1/users/:user_id/actions/:action_id/submit
///
/// Executes an action after admin approval.
pub async fn submit_action(
    State(state): State<Arc<AppState>>,
    Path((user_id, action_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SubmissionOutcome>, AppError> {
    let outcome = workflows::submit_action(&state.storage, user_id, action_id, Utc::now()).await?;
    Ok(Json(outcome))
}
