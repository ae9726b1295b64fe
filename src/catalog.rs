//! Ordered catalog of funding products used by Million Mode.

use regex::Regex;
use serde::Serialize;

use crate::models::RiskLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingProduct {
    pub order: u32,
    pub provider: &'static str,
    pub product: &'static str,
    pub expected_amount: i64,
    /// Human label for when the application is intended to go out.
    pub timing: &'static str,
    pub min_score: u16,
    pub risk_level: RiskLevel,
    /// Display text only. Eligibility reads `min_score`.
    pub requirements: &'static [&'static str],
}

pub const FUNDING_CATALOG: &[FundingProduct] = &[
    FundingProduct {
        order: 1,
        provider: "Navy Federal",
        product: "Business Rewards Card",
        expected_amount: 25_000,
        timing: "Day 1",
        min_score: 660,
        risk_level: RiskLevel::Low,
        requirements: &["660+ score", "Membership eligibility"],
    },
    FundingProduct {
        order: 2,
        provider: "Chase",
        product: "Ink Business Unlimited",
        expected_amount: 50_000,
        timing: "Day 1",
        min_score: 700,
        risk_level: RiskLevel::Low,
        requirements: &["700+ score", "Fewer than 5 new accounts in 24 months"],
    },
    FundingProduct {
        order: 3,
        provider: "American Express",
        product: "Blue Business Plus",
        expected_amount: 50_000,
        timing: "Day 1",
        min_score: 690,
        risk_level: RiskLevel::Low,
        requirements: &["690+ score", "Business EIN or sole proprietor"],
    },
    FundingProduct {
        order: 4,
        provider: "Capital One",
        product: "Spark Cash Plus",
        expected_amount: 30_000,
        timing: "Day 2",
        min_score: 680,
        risk_level: RiskLevel::Medium,
        requirements: &["680+ score", "Pay-in-full charge card terms"],
    },
    FundingProduct {
        order: 5,
        provider: "U.S. Bank",
        product: "Business Triple Cash Rewards",
        expected_amount: 25_000,
        timing: "Day 2",
        min_score: 680,
        risk_level: RiskLevel::Medium,
        requirements: &["680+ score", "Existing banking relationship preferred"],
    },
    FundingProduct {
        order: 6,
        provider: "Bank of America",
        product: "Business Advantage Cash Rewards",
        expected_amount: 40_000,
        timing: "Day 3",
        min_score: 700,
        risk_level: RiskLevel::Medium,
        requirements: &["700+ score", "Business checking account"],
    },
    FundingProduct {
        order: 7,
        provider: "Wells Fargo",
        product: "Business Line of Credit",
        expected_amount: 100_000,
        timing: "Week 2",
        min_score: 720,
        risk_level: RiskLevel::Medium,
        requirements: &["720+ score", "2 years in business", "Annual revenue statements"],
    },
    FundingProduct {
        order: 8,
        provider: "BlueVine",
        product: "Business Line of Credit",
        expected_amount: 250_000,
        timing: "Week 3",
        min_score: 625,
        risk_level: RiskLevel::High,
        requirements: &["625+ score", "$40k monthly revenue", "6 months in business"],
    },
    FundingProduct {
        order: 9,
        provider: "SBA",
        product: "7(a) Term Loan",
        expected_amount: 350_000,
        timing: "Month 2",
        min_score: 690,
        risk_level: RiskLevel::High,
        requirements: &["690+ score", "Business plan", "Personal guarantee"],
    },
    FundingProduct {
        order: 10,
        provider: "Fundbox",
        product: "Revolving Line of Credit",
        expected_amount: 150_000,
        timing: "Month 2",
        min_score: 600,
        risk_level: RiskLevel::High,
        requirements: &["600+ score", "3 months of business bank history"],
    },
];

/// Products whose first requirement line no longer states `min_score`.
///
/// The requirement text is shown to users; this keeps it honest against the
/// numeric field that actually drives eligibility.
pub fn requirement_text_mismatches(catalog: &[FundingProduct]) -> Vec<String> {
    let pattern = Regex::new(r"^(\d+)\+ score$").expect("static regex is valid");

    catalog
        .iter()
        .filter_map(|product| {
            let stated = product
                .requirements
                .first()
                .and_then(|text| pattern.captures(text))
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u16>().ok());

            match stated {
                Some(score) if score == product.min_score => None,
                Some(score) => Some(format!(
                    "{} {}: text says {}+ but min_score is {}",
                    product.provider, product.product, score, product.min_score
                )),
                None => Some(format!(
                    "{} {}: first requirement does not state a minimum score",
                    product.provider, product.product
                )),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_ordered_and_complete() {
        assert_eq!(FUNDING_CATALOG.len(), 10);
        for (idx, product) in FUNDING_CATALOG.iter().enumerate() {
            assert_eq!(product.order as usize, idx + 1);
        }
        let total: i64 = FUNDING_CATALOG.iter().map(|p| p.expected_amount).sum();
        assert!(total >= 1_000_000);
    }

    #[test]
    fn test_requirement_text_matches_min_score() {
        assert!(requirement_text_mismatches(FUNDING_CATALOG).is_empty());
    }

    #[test]
    fn test_mismatch_is_reported() {
        let mut product = FUNDING_CATALOG[0].clone();
        product.min_score = 700;
        let drifted = [product];

        let mismatches = requirement_text_mismatches(&drifted);
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].contains("min_score is 700"));
    }
}
