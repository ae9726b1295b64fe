//! Credit profile aggregation.
//!
//! Reduces a user's tradelines, score history and hard inquiries into a
//! [`CreditProfile`]. The profile is a projection and is never stored; callers
//! recompute it whenever they need it.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Bureau, CreditInquiry, ScoreDisplay, ScoreHistoryEntry, Tradeline};

pub const MIN_SCORE: u16 = 300;
pub const MAX_SCORE: u16 = 850;

/// Hard inquiries older than this window do not count.
const INQUIRY_LOOKBACK_MONTHS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditProfile {
    pub score: u16,
    /// Revolving utilization as a whole percentage, 0..=100.
    pub utilization: u8,
    pub total_accounts: u32,
    pub negative_items: u32,
    pub inquiries_last_24_months: u32,
    pub account_age_months: u32,
}

/// Outcome of profile derivation. `InsufficientData` is a state, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProfileReading {
    Measured { profile: CreditProfile },
    InsufficientData,
}

impl ProfileReading {
    pub fn profile(&self) -> Option<&CreditProfile> {
        match self {
            ProfileReading::Measured { profile } => Some(profile),
            ProfileReading::InsufficientData => None,
        }
    }

    pub fn score_display(&self) -> ScoreDisplay {
        match self {
            ProfileReading::Measured { profile } => ScoreDisplay::measured(profile.score),
            ProfileReading::InsufficientData => ScoreDisplay::placeholder(),
        }
    }
}

/// Latest entry per bureau. Entries with an unknown bureau are ignored.
pub fn latest_scores_by_bureau(history: &[ScoreHistoryEntry]) -> HashMap<Bureau, &ScoreHistoryEntry> {
    let mut latest: HashMap<Bureau, &ScoreHistoryEntry> = HashMap::new();
    for entry in history {
        let Ok(bureau) = entry.bureau.parse::<Bureau>() else {
            tracing::warn!(bureau = %entry.bureau, "Ignoring score entry with unknown bureau");
            continue;
        };
        latest
            .entry(bureau)
            .and_modify(|current| {
                if entry.recorded_at > current.recorded_at {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }
    latest
}

/// Derives the profile used by the funding engine.
///
/// The score is the rounded mean of the latest reading from each bureau. With
/// no usable score history the result is [`ProfileReading::InsufficientData`];
/// tradelines alone never produce a score.
pub fn derive_profile(
    tradelines: &[Tradeline],
    score_history: &[ScoreHistoryEntry],
    inquiries: &[CreditInquiry],
    now: DateTime<Utc>,
) -> ProfileReading {
    let latest = latest_scores_by_bureau(score_history);
    if latest.is_empty() {
        return ProfileReading::InsufficientData;
    }

    let sum: i64 = latest.values().map(|e| i64::from(e.score)).sum();
    let mean = (sum as f64 / latest.len() as f64).round() as i64;
    let score = mean.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE)) as u16;

    let lookback_start = now
        .checked_sub_months(Months::new(INQUIRY_LOOKBACK_MONTHS))
        .unwrap_or(now);
    let inquiries_last_24_months = inquiries
        .iter()
        .filter(|i| i.inquired_at >= lookback_start && i.inquired_at <= now)
        .count() as u32;

    ProfileReading::Measured {
        profile: CreditProfile {
            score,
            utilization: utilization_percent(tradelines),
            total_accounts: tradelines.len() as u32,
            negative_items: tradelines.iter().filter(|t| t.is_negative).count() as u32,
            inquiries_last_24_months,
            account_age_months: oldest_account_age_months(tradelines, now.date_naive()),
        },
    }
}

/// Total balance over total limit, counting only tradelines with a positive limit.
pub fn utilization_percent(tradelines: &[Tradeline]) -> u8 {
    let (balance, limit) = tradelines
        .iter()
        .filter_map(|t| match t.credit_limit {
            Some(limit) if limit > 0 => Some((t.current_balance.max(0), limit)),
            _ => None,
        })
        .fold((0i64, 0i64), |(b, l), (tb, tl)| (b + tb, l + tl));

    if limit == 0 {
        return 0;
    }
    let percent = (balance as f64 / limit as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

fn oldest_account_age_months(tradelines: &[Tradeline], today: NaiveDate) -> u32 {
    tradelines
        .iter()
        .filter_map(|t| t.opened_on)
        .min()
        .map(|opened| whole_months_between(opened, today))
        .unwrap_or(0)
}

fn whole_months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    let mut months = (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32);
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn tradeline(limit: Option<i64>, balance: i64, negative: bool, opened: Option<NaiveDate>) -> Tradeline {
        Tradeline {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            creditor_name: "Test Bank".to_string(),
            account_type: "revolving".to_string(),
            credit_limit: limit,
            current_balance: balance,
            payment_status: "current".to_string(),
            is_negative: negative,
            opened_on: opened,
            source: "manual".to_string(),
            created_at: Utc::now(),
        }
    }

    fn score(bureau: &str, value: i32, day: u32) -> ScoreHistoryEntry {
        ScoreHistoryEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            score: value,
            bureau: bureau.to_string(),
            recorded_at: Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap(),
            source: "manual".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_no_score_history_is_insufficient_data() {
        let tradelines = vec![tradeline(Some(1000), 100, false, None)];
        let reading = derive_profile(&tradelines, &[], &[], now());

        assert_eq!(reading, ProfileReading::InsufficientData);
        assert!(reading.profile().is_none());
        assert!(!reading.score_display().measured);
    }

    #[test]
    fn test_uses_latest_score_per_bureau() {
        let history = vec![
            score("experian", 600, 1),
            score("experian", 700, 10),
            score("equifax", 690, 5),
            score("transunion", 710, 2),
        ];
        let reading = derive_profile(&[], &history, &[], now());
        let profile = reading.profile().unwrap();

        // (700 + 690 + 710) / 3
        assert_eq!(profile.score, 700);
        assert!(reading.score_display().measured);
    }

    #[test]
    fn test_utilization_ignores_accounts_without_limit() {
        let tradelines = vec![
            tradeline(Some(1000), 250, false, None),
            tradeline(Some(3000), 750, false, None),
            tradeline(None, 12_000, false, None),
        ];
        assert_eq!(utilization_percent(&tradelines), 25);
        assert_eq!(utilization_percent(&[]), 0);
    }

    #[test]
    fn test_utilization_caps_at_100() {
        let tradelines = vec![tradeline(Some(500), 900, false, None)];
        assert_eq!(utilization_percent(&tradelines), 100);
    }

    #[test]
    fn test_counts_accounts_negatives_and_recent_inquiries() {
        let tradelines = vec![
            tradeline(Some(1000), 0, true, NaiveDate::from_ymd_opt(2020, 3, 20)),
            tradeline(Some(1000), 0, false, NaiveDate::from_ymd_opt(2023, 1, 1)),
        ];
        let inquiries = vec![
            CreditInquiry {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                bureau: "experian".to_string(),
                creditor_name: "Recent".to_string(),
                inquired_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            },
            CreditInquiry {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                bureau: "experian".to_string(),
                creditor_name: "Old".to_string(),
                inquired_at: Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
            },
        ];
        let history = vec![score("equifax", 640, 3)];

        let reading = derive_profile(&tradelines, &history, &inquiries, now());
        let profile = reading.profile().unwrap();

        assert_eq!(profile.total_accounts, 2);
        assert_eq!(profile.negative_items, 1);
        assert_eq!(profile.inquiries_last_24_months, 1);
        // 2020-03-20 -> 2026-03-15 is 71 whole months
        assert_eq!(profile.account_age_months, 71);
    }

    #[test]
    fn test_unknown_bureau_entries_do_not_count() {
        let history = vec![score("innovis", 800, 1)];
        assert_eq!(
            derive_profile(&[], &history, &[], now()),
            ProfileReading::InsufficientData
        );
    }
}
