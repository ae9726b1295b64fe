//! Funding timeline projection across a ladder of target amounts.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::calculator::{clamp_probability, confidence_for};
use crate::errors::AppError;
use crate::models::{Confidence, FundingProjectionRow};
use crate::profile::CreditProfile;

pub const DEFAULT_TARGETS: [i64; 7] = [
    10_000, 25_000, 50_000, 100_000, 250_000, 500_000, 1_000_000,
];

pub const MAX_TARGET_AMOUNT: i64 = 10_000_000;
pub const MAX_TARGETS: usize = 20;

/// Points of score improvement assumed per month.
const POINTS_PER_MONTH: i32 = 15;
/// Projections never land sooner than this.
const MIN_LEAD_MONTHS: u32 = 3;

/// Required score by target amount, highest threshold first.
const REQUIRED_SCORE: &[(i64, i32)] = &[
    (500_000, 750),
    (250_000, 720),
    (100_000, 700),
    (50_000, 680),
    (25_000, 650),
];
const REQUIRED_SCORE_FLOOR: i32 = 620;

/// A minimum number of months forced by a profile or target constraint.
struct MonthFloor {
    months: u32,
    applies: fn(&CreditProfile, i64) -> bool,
    requirement: &'static str,
}

const MONTH_FLOORS: &[MonthFloor] = &[
    MonthFloor {
        months: 2,
        applies: |p, _| p.utilization > 30,
        requirement: "Reduce credit utilization below 30%",
    },
    MonthFloor {
        months: 6,
        applies: |p, t| t >= 50_000 && p.total_accounts < 3,
        requirement: "Establish at least 3 open accounts",
    },
    MonthFloor {
        months: 6,
        applies: |_, t| t >= 100_000,
        requirement: "Register a business entity",
    },
    MonthFloor {
        months: 12,
        applies: |_, t| t >= 250_000,
        requirement: "Prepare 2 years of business financial statements",
    },
    MonthFloor {
        months: 18,
        applies: |_, t| t >= 500_000,
        requirement: "Secure collateral or a personal guarantor",
    },
];

const BASE_ASSUMPTIONS: &[&str] = &[
    "Score improves about 15 points per month",
    "All accounts paid on time during the projection",
    "No new negative items are reported",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingProjection {
    pub target_amount: i64,
    pub target_month: String,
    pub months_needed: u32,
    pub required_score: i32,
    pub probability: u8,
    pub confidence: Confidence,
    pub requirements: Vec<String>,
    pub assumptions: Vec<String>,
}

impl FundingProjection {
    pub fn into_row(self, user_id: uuid::Uuid, calculated_at: DateTime<Utc>) -> FundingProjectionRow {
        FundingProjectionRow {
            user_id,
            target_amount: self.target_amount,
            target_month: self.target_month,
            probability: i32::from(self.probability),
            confidence: self.confidence.as_str().to_string(),
            requirements: self.requirements,
            assumptions: self.assumptions,
            calculated_at,
        }
    }
}

pub fn required_score(target_amount: i64) -> i32 {
    REQUIRED_SCORE
        .iter()
        .find(|(threshold, _)| target_amount >= *threshold)
        .map(|(_, score)| *score)
        .unwrap_or(REQUIRED_SCORE_FLOOR)
}

/// Validates caller-supplied targets; `None` selects the default ladder.
/// Duplicates are collapsed so each target maps to a single projection.
pub fn resolve_targets(targets: Option<&[i64]>) -> Result<Vec<i64>, AppError> {
    let Some(targets) = targets else {
        return Ok(DEFAULT_TARGETS.to_vec());
    };
    if targets.is_empty() {
        return Err(AppError::BadRequest("targets cannot be empty".to_string()));
    }
    if targets.len() > MAX_TARGETS {
        return Err(AppError::BadRequest(format!(
            "at most {} targets allowed",
            MAX_TARGETS
        )));
    }
    if let Some(bad) = targets
        .iter()
        .find(|t| **t <= 0 || **t > MAX_TARGET_AMOUNT)
    {
        return Err(AppError::BadRequest(format!(
            "target amount {} must be between 1 and {}",
            bad, MAX_TARGET_AMOUNT
        )));
    }

    let mut resolved = targets.to_vec();
    resolved.sort_unstable();
    resolved.dedup();
    Ok(resolved)
}

pub fn months_needed(profile: &CreditProfile, target_amount: i64) -> (u32, Vec<String>) {
    let gap = (required_score(target_amount) - i32::from(profile.score)).max(0);
    let mut months = ((gap + POINTS_PER_MONTH - 1) / POINTS_PER_MONTH) as u32;
    let mut requirements = Vec::new();

    if gap > 0 {
        requirements.push(format!(
            "Raise score to {}",
            required_score(target_amount)
        ));
    }
    for floor in MONTH_FLOORS {
        if (floor.applies)(profile, target_amount) {
            months = months.max(floor.months);
            requirements.push(floor.requirement.to_string());
        }
    }
    (months, requirements)
}

pub fn timeline_probability(profile: &CreditProfile, target_amount: i64) -> u8 {
    let score = i32::from(profile.score);
    let required = required_score(target_amount);
    let target = target_amount as f64;

    let raw = if score >= required {
        85.0 - target / 50_000.0
    } else if required - score <= 50 {
        65.0 - target / 50_000.0
    } else if required - score <= 100 {
        45.0 - target / 50_000.0
    } else {
        25.0 - target / 100_000.0
    };
    let raw = raw - 10.0 * f64::from(profile.negative_items);

    // Round before clamping so very large targets cannot overflow the i32 cast
    let rounded = raw.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
    clamp_probability(rounded)
}

pub fn target_month_label(now: DateTime<Utc>, months_needed: u32) -> String {
    let lead = months_needed.max(MIN_LEAD_MONTHS);
    now.checked_add_months(Months::new(lead))
        .unwrap_or(now)
        .format("%B %Y")
        .to_string()
}

/// One projection per target, in the order given.
pub fn project_timeline(
    profile: &CreditProfile,
    targets: &[i64],
    now: DateTime<Utc>,
) -> Vec<FundingProjection> {
    targets
        .iter()
        .map(|&target_amount| {
            let (months, requirements) = months_needed(profile, target_amount);
            let probability = timeline_probability(profile, target_amount);
            let mut assumptions: Vec<String> =
                BASE_ASSUMPTIONS.iter().map(|a| a.to_string()).collect();
            if profile.utilization > 30 {
                assumptions.push("Utilization is paid down below 30%".to_string());
            }

            FundingProjection {
                target_amount,
                target_month: target_month_label(now, months),
                months_needed: months,
                required_score: required_score(target_amount),
                probability,
                confidence: confidence_for(probability),
                requirements,
                assumptions,
            }
        })
        .collect()
}
