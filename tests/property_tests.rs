/// Property-based tests using proptest
/// Tests invariants of the funding engine that should hold for all inputs
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use credit_funding_api::calculator::calculate_probability;
use credit_funding_api::catalog::FUNDING_CATALOG;
use credit_funding_api::million_mode::{build_sequence, schedule, THROTTLE_WINDOW_HOURS};
use credit_funding_api::profile::CreditProfile;
use credit_funding_api::timeline::{project_timeline, DEFAULT_TARGETS};

fn profile(score: u16, negative_items: u32) -> CreditProfile {
    CreditProfile {
        score,
        utilization: 25,
        total_accounts: 5,
        negative_items,
        inquiries_last_24_months: 2,
        account_age_months: 36,
    }
}

// Property: single-target probability stays within 5..=95 and is deterministic
proptest! {
    #[test]
    fn probability_is_clamped_and_deterministic(
        score in 300i32..=850,
        amount in 1i64..=10_000_000,
        months in 0u32..=120
    ) {
        let first = calculate_probability(score, amount, months);
        let second = calculate_probability(score, amount, months);
        prop_assert!((5..=95).contains(&first.probability));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn higher_score_never_lowers_probability(
        score in 300i32..=849,
        bump in 1i32..=100,
        amount in 1i64..=2_000_000,
        months in 0u32..=24
    ) {
        let higher = (score + bump).min(850);
        let low = calculate_probability(score, amount, months).probability;
        let high = calculate_probability(higher, amount, months).probability;
        prop_assert!(high >= low);
    }

    #[test]
    fn larger_target_never_raises_probability(
        score in 300i32..=850,
        amount in 1i64..=2_000_000,
        extra in 1i64..=2_000_000,
        months in 0u32..=24
    ) {
        let small = calculate_probability(score, amount, months).probability;
        let large = calculate_probability(score, amount + extra, months).probability;
        prop_assert!(large <= small);
    }
}

// Property: timeline projections are clamped and one per target
proptest! {
    #[test]
    fn timeline_projection_bounds(score in 300u16..=850, negatives in 0u32..=12) {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let projections = project_timeline(&profile(score, negatives), &DEFAULT_TARGETS, now);

        prop_assert_eq!(projections.len(), DEFAULT_TARGETS.len());
        for p in &projections {
            prop_assert!((5..=95).contains(&p.probability));
            prop_assert!(!p.target_month.is_empty());
        }
    }
}

// Property: no rolling 48h window holds more starts than the cap
proptest! {
    #[test]
    fn schedule_respects_hard_pull_cap(steps in 0usize..=40, cap in 1u32..=15) {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let times = schedule(steps, cap, start).unwrap();

        prop_assert_eq!(times.len(), steps);
        if let Some(first) = times.first() {
            prop_assert_eq!(*first, start);
        }
        prop_assert!(times.windows(2).all(|w| w[0] < w[1]));

        let window = Duration::hours(THROTTLE_WINDOW_HOURS);
        for (i, t) in times.iter().enumerate() {
            let in_window = times[i..].iter().take_while(|u| **u < *t + window).count();
            prop_assert!(in_window as u32 <= cap);
        }
    }

    #[test]
    fn sequence_is_ordered_subset_of_catalog(score in 300u16..=850, cap in 1u32..=10) {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let plan = build_sequence(&profile(score, 0), FUNDING_CATALOG, cap, now).unwrap();

        let orders: Vec<u32> = plan.sequence.iter().map(|s| s.order).collect();
        let mut sorted = orders.clone();
        sorted.sort_unstable();
        prop_assert_eq!(&orders, &sorted);
        prop_assert_eq!(
            plan.projected_total,
            plan.sequence.iter().map(|s| s.expected_amount).sum::<i64>()
        );
        prop_assert_eq!(plan.approval_probability.is_none(), plan.sequence.is_empty());
    }
}
