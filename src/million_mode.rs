//! Million Mode: eligibility filter and hard-pull throttled scheduling over
//! the funding catalog.
//!
//! Everything here is a plan. Nothing in this module submits an application;
//! execution sits behind admin approval.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::calculator::calculate_probability;
use crate::catalog::FundingProduct;
use crate::errors::AppError;
use crate::models::RiskLevel;
use crate::profile::CreditProfile;

/// Products stay eligible this many points below their minimum.
pub const SCORE_GRACE_POINTS: i32 = 20;
pub const THROTTLE_WINDOW_HOURS: i64 = 48;
pub const STEP_GAP_HOURS: i64 = 4;

const LOW_RISK_SCORE: u16 = 720;
const MEDIUM_RISK_SCORE: u16 = 680;

pub const LOW_SCORE_WARNING: &str = "Score below 680 may reduce approvals";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStep {
    pub order: u32,
    pub provider: String,
    pub product: String,
    pub expected_amount: i64,
    pub timing: String,
    pub min_score: u16,
    pub risk_level: RiskLevel,
    pub requirements: Vec<String>,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MillionModePlan {
    pub sequence: Vec<SequenceStep>,
    pub projected_total: i64,
    pub risk_level: RiskLevel,
    pub warnings: Vec<String>,
    pub estimated_duration_days: u32,
    /// Mean approval probability across the sequence; absent when empty.
    pub approval_probability: Option<u8>,
    pub max_hard_pulls_48h: u32,
}

pub fn is_eligible(score: u16, product: &FundingProduct) -> bool {
    i32::from(score) >= i32::from(product.min_score) - SCORE_GRACE_POINTS
}

/// Stable filter: eligible products keep their catalog order.
pub fn eligible_products<'a>(score: u16, catalog: &'a [FundingProduct]) -> Vec<&'a FundingProduct> {
    catalog.iter().filter(|p| is_eligible(score, p)).collect()
}

pub fn risk_level_for(score: u16) -> RiskLevel {
    if score >= LOW_RISK_SCORE {
        RiskLevel::Low
    } else if score >= MEDIUM_RISK_SCORE {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Start times for `steps` applications under a hard-pull cap.
///
/// Inside a window, starts are spaced `STEP_GAP_HOURS` apart. After `cap`
/// starts the next one opens a new window `THROTTLE_WINDOW_HOURS` after the
/// previous window start, or at the next gap slot if that is later.
pub fn schedule(steps: usize, cap: u32, start: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>, AppError> {
    if cap == 0 {
        return Err(AppError::BadRequest(
            "max hard pulls per 48 hours must be at least 1".to_string(),
        ));
    }

    let window = Duration::hours(THROTTLE_WINDOW_HOURS);
    let gap = Duration::hours(STEP_GAP_HOURS);

    let mut times = Vec::with_capacity(steps);
    let mut window_start = start;
    let mut cursor = start;
    let mut in_window: u32 = 0;

    for _ in 0..steps {
        if in_window == cap {
            window_start = (window_start + window).max(cursor);
            cursor = window_start;
            in_window = 0;
        }
        times.push(cursor);
        cursor += gap;
        in_window += 1;
    }
    Ok(times)
}

/// Days from `now` through the day of the last scheduled start.
pub fn estimated_duration_days(now: DateTime<Utc>, times: &[DateTime<Utc>]) -> u32 {
    let Some(last) = times.iter().max() else {
        return 0;
    };
    let hours = (*last - now).num_hours().max(0);
    ((hours + 23) / 24) as u32 + 1
}

/// Mean of the single-target probabilities of each step, where the months
/// available for a step is how far out it is scheduled.
pub fn sequence_approval_probability(score: u16, steps: &[SequenceStep], now: DateTime<Utc>) -> Option<u8> {
    if steps.is_empty() {
        return None;
    }
    let total: u32 = steps
        .iter()
        .map(|step| {
            let months_out = ((step.scheduled_at - now).num_days().max(0) / 30) as u32;
            u32::from(calculate_probability(i32::from(score), step.expected_amount, months_out).probability)
        })
        .sum();
    Some((f64::from(total) / steps.len() as f64).round() as u8)
}

pub fn build_sequence(
    profile: &CreditProfile,
    catalog: &[FundingProduct],
    max_hard_pulls_48h: u32,
    now: DateTime<Utc>,
) -> Result<MillionModePlan, AppError> {
    let eligible = eligible_products(profile.score, catalog);
    let times = schedule(eligible.len(), max_hard_pulls_48h, now)?;

    let sequence: Vec<SequenceStep> = eligible
        .iter()
        .zip(times.iter())
        .map(|(product, &scheduled_at)| SequenceStep {
            order: product.order,
            provider: product.provider.to_string(),
            product: product.product.to_string(),
            expected_amount: product.expected_amount,
            timing: product.timing.to_string(),
            min_score: product.min_score,
            risk_level: product.risk_level,
            requirements: product.requirements.iter().map(|r| r.to_string()).collect(),
            scheduled_at,
        })
        .collect();

    let mut warnings = Vec::new();
    if profile.score < MEDIUM_RISK_SCORE {
        warnings.push(LOW_SCORE_WARNING.to_string());
    }
    let skipped = catalog.len() - sequence.len();
    if skipped > 0 {
        warnings.push(format!(
            "{} step(s) skipped: score below product minimum",
            skipped
        ));
    }

    Ok(MillionModePlan {
        projected_total: sequence.iter().map(|s| s.expected_amount).sum(),
        risk_level: risk_level_for(profile.score),
        estimated_duration_days: estimated_duration_days(now, &times),
        approval_probability: sequence_approval_probability(profile.score, &sequence, now),
        warnings,
        sequence,
        max_hard_pulls_48h,
    })
}
