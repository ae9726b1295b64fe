//! E-signature consent records and the consent half of the action gate.
//!
//! A consent stores a snapshot of the exact text the user agreed to together
//! with its SHA-256 digest. Gated actions reference one consent by id, and the
//! gate re-checks ownership, type and digest every time it is consulted.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Consent, ConsentType};

/// Upper bound on stored consent text.
pub const MAX_CONSENT_TEXT_BYTES: usize = 64 * 1024;

/// Why a consent did not authorize an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRejection {
    Missing,
    WrongOwner,
    WrongType { expected: ConsentType, found: String },
    Tampered,
}

impl std::fmt::Display for GateRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateRejection::Missing => write!(f, "consent record not found"),
            GateRejection::WrongOwner => write!(f, "consent belongs to a different user"),
            GateRejection::WrongType { expected, found } => {
                write!(f, "consent type '{}' does not authorize '{}'", found, expected)
            }
            GateRejection::Tampered => write!(f, "consent text does not match its signature digest"),
        }
    }
}

impl From<GateRejection> for AppError {
    fn from(rejection: GateRejection) -> Self {
        AppError::Forbidden(format!("Consent required: {}", rejection))
    }
}

/// Computes the hex SHA-256 digest of consent text.
pub fn text_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Builds a new consent record ready to insert.
pub fn new_consent(
    user_id: Uuid,
    consent_type: ConsentType,
    text: &str,
    user_agent: Option<String>,
    signed_at: DateTime<Utc>,
) -> Result<Consent, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("consent text is required".to_string()));
    }
    if text.len() > MAX_CONSENT_TEXT_BYTES {
        return Err(AppError::BadRequest(format!(
            "consent text exceeds {} bytes",
            MAX_CONSENT_TEXT_BYTES
        )));
    }

    Ok(Consent {
        id: Uuid::new_v4(),
        user_id,
        consent_type: consent_type.as_str().to_string(),
        text_snapshot: text.to_string(),
        text_sha256: text_digest(text),
        signed_at,
        user_agent,
    })
}

/// Fails closed unless `consent` exists, belongs to `user_id`, has the
/// expected type and still matches its digest.
pub fn require_consent(
    consent: Option<&Consent>,
    user_id: Uuid,
    expected: ConsentType,
) -> Result<Uuid, GateRejection> {
    let consent = consent.ok_or(GateRejection::Missing)?;

    if consent.user_id != user_id {
        return Err(GateRejection::WrongOwner);
    }
    if consent.consent_type != expected.as_str() {
        return Err(GateRejection::WrongType {
            expected,
            found: consent.consent_type.clone(),
        });
    }
    if text_digest(&consent.text_snapshot) != consent.text_sha256 {
        return Err(GateRejection::Tampered);
    }
    Ok(consent.id)
}
