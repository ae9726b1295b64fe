use crate::circuit_breaker::{create_notifier_circuit_breaker, NotifierBreaker};
use crate::config::NotifyConfig;
use crate::errors::AppError;
use crate::models::ActionKind;
use failsafe::CircuitBreaker;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Client that hands admin review notices to a transactional email API.
///
/// Calls go through a circuit breaker. When it is open the notice is not
/// attempted and an error is returned for the caller to turn into a warning.
#[derive(Clone)]
pub struct AdminNotifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    admin_email: String,
    breaker: Arc<NotifierBreaker>,
}

impl AdminNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create notification client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            admin_email: config.admin_email.clone(),
            breaker: Arc::new(create_notifier_circuit_breaker()),
        })
    }

    /// Tells the admin inbox that a gated action is waiting for review.
    pub async fn review_requested(
        &self,
        kind: ActionKind,
        action_id: Uuid,
        approval_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        let body = json!({
            "to": self.admin_email,
            "subject": format!("Review needed: {}", kind),
            "text": format!(
                "User {} requested {}.\nAction: {}\nApproval: {}",
                user_id, kind, action_id, approval_id
            ),
            "tags": { "approval_id": approval_id, "action_type": kind.as_str() },
        });
        self.send(&body).await
    }

    async fn send(&self, body: &serde_json::Value) -> Result<(), AppError> {
        if !self.breaker.is_call_permitted() {
            return Err(AppError::ExternalApiError(
                "Notification circuit open, skipping".to_string(),
            ));
        }

        let outcome = self.post(body).await;
        // Only the outcome is recorded; the request already ran.
        let _ = self.breaker.call(|| outcome.as_ref().map(|_| ()));
        outcome
    }

    async fn post(&self, body: &serde_json::Value) -> Result<(), AppError> {
        let url = format!("{}/emails", self.base_url);
        tracing::info!("Sending admin notification: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Notification request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Notification API returned {}: {}",
                status, error_text
            )));
        }
        Ok(())
    }
}
