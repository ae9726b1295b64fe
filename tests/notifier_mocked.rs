/// Admin notification client against a mocked email API
mod common;

use common::{fixed_now, CountingLimiter, MemoryStore};
use credit_funding_api::config::NotifyConfig;
use credit_funding_api::models::{ActionKind, Bureau, ConsentType};
use credit_funding_api::notifier::AdminNotifier;
use credit_funding_api::workflows::activate_million_mode;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn notifier_for(server: &MockServer) -> AdminNotifier {
    AdminNotifier::new(&NotifyConfig {
        base_url: server.uri(),
        api_key: "test_key".to_string(),
        admin_email: "admin@example.com".to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_review_notice_is_posted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Authorization", "Bearer test_key"))
        .and(body_partial_json(serde_json::json!({
            "to": "admin@example.com",
            "subject": "Review needed: million_mode"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = notifier_for(&mock_server);
    notifier
        .review_requested(ActionKind::MillionMode, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(500).set_body_string("mailer down"))
        .mount(&mock_server)
        .await;

    let notifier = notifier_for(&mock_server);
    let err = notifier
        .review_requested(ActionKind::DisputeSubmission, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_breaker_stops_calling_after_repeated_failures() {
    let mock_server = MockServer::start().await;

    // Three failures open the breaker; later notices never reach the API.
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let notifier = notifier_for(&mock_server);
    for _ in 0..5 {
        let result = notifier
            .review_requested(ActionKind::MillionMode, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
            .await;
        assert!(result.is_err());
    }
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_activation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let store = MemoryStore::default();
    let user = Uuid::new_v4();
    store.add_score(user, 740, Bureau::Equifax, fixed_now());
    let consent = store.sign(user, ConsentType::MillionMode);
    let notifier = notifier_for(&mock_server);

    let outcome = activate_million_mode(
        &store,
        &CountingLimiter::new(5),
        Some(&notifier),
        user,
        consent,
        6,
        fixed_now(),
    )
    .await
    .unwrap();

    assert_eq!(store.approval_count(), 1);
    assert!(outcome
        .plan
        .warnings
        .iter()
        .any(|w| w == "Admin notification could not be sent"));
}
