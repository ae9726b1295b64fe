//! Funding probability for a single target amount.

use serde::{Deserialize, Serialize};

use crate::models::Confidence;

pub const MIN_PROBABILITY: i32 = 5;
pub const MAX_PROBABILITY: i32 = 95;

/// Base probability by score, highest tier first.
const SCORE_TIERS: &[(i32, i32)] = &[(750, 95), (720, 85), (680, 70), (640, 50), (600, 30)];
const BASE_BELOW_TIERS: i32 = 15;

/// Deduction tier applied when the target exceeds `threshold`.
struct AmountTier {
    threshold: i64,
    deduction: i32,
    min_score: i32,
    requirements: &'static [&'static str],
}

/// Checked in order; only the first matching tier deducts.
const AMOUNT_TIERS: &[AmountTier] = &[
    AmountTier {
        threshold: 100_000,
        deduction: 25,
        min_score: 720,
        requirements: &[
            "Business entity registration",
            "2 years of tax returns",
            "12 months of bank statements",
        ],
    },
    AmountTier {
        threshold: 50_000,
        deduction: 15,
        min_score: 680,
        requirements: &["Income verification", "6 months of bank statements"],
    },
    AmountTier {
        threshold: 25_000,
        deduction: 10,
        min_score: 640,
        requirements: &["Proof of income"],
    },
];

const SHORT_RUNWAY_MONTHS: u32 = 3;
const SHORT_RUNWAY_SCORE: i32 = 680;
const SHORT_RUNWAY_DEDUCTION: i32 = 20;
const SCORE_IMPROVEMENT_NEEDED: &str = "Score improvement needed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbabilityResult {
    pub probability: u8,
    pub confidence: Confidence,
    pub requirements: Vec<String>,
}

pub fn base_probability(score: i32) -> i32 {
    SCORE_TIERS
        .iter()
        .find(|(min, _)| score >= *min)
        .map(|(_, base)| *base)
        .unwrap_or(BASE_BELOW_TIERS)
}

pub fn confidence_for(probability: u8) -> Confidence {
    match probability {
        70.. => Confidence::High,
        40..=69 => Confidence::Medium,
        _ => Confidence::Low,
    }
}

pub fn clamp_probability(raw: i32) -> u8 {
    raw.clamp(MIN_PROBABILITY, MAX_PROBABILITY) as u8
}

/// Probability of being approved for `target_amount` within `months_available`.
///
/// Deductions are additive. The minimum-score notes are informational and do
/// not change the number.
pub fn calculate_probability(score: i32, target_amount: i64, months_available: u32) -> ProbabilityResult {
    let mut probability = base_probability(score);
    let mut requirements: Vec<String> = Vec::new();

    let tier = AMOUNT_TIERS.iter().find(|t| target_amount > t.threshold);
    if let Some(tier) = tier {
        probability -= tier.deduction;
        requirements.extend(tier.requirements.iter().map(|r| r.to_string()));
    }

    if months_available < SHORT_RUNWAY_MONTHS && score < SHORT_RUNWAY_SCORE {
        probability -= SHORT_RUNWAY_DEDUCTION;
        requirements.push(SCORE_IMPROVEMENT_NEEDED.to_string());
    }

    // Only the tier that applied the deduction names a minimum score
    if let Some(tier) = tier.filter(|t| score < t.min_score) {
        requirements.push(format!("Score {}+ required", tier.min_score));
    }

    let probability = clamp_probability(probability);
    ProbabilityResult {
        probability,
        confidence: confidence_for(probability),
        requirements,
    }
}
