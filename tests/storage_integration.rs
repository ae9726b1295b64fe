use std::env;

use chrono::Utc;
use uuid::Uuid;

use credit_funding_api::db::Database;
use credit_funding_api::models::{Bureau, ScoreHistoryEntry};
use credit_funding_api::storage::PgStorage;
use credit_funding_api::workflows::{recalculate_timeline, TimelineOutcome};

/// Integration smoke test for projection upserts against a real database.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn timeline_upsert_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let storage = PgStorage::new(db.pool.clone());

    // Fresh user id so repeated runs do not collide.
    let user_id = Uuid::new_v4();
    storage
        .insert_score(&ScoreHistoryEntry {
            id: Uuid::new_v4(),
            user_id,
            score: 705,
            bureau: Bureau::Experian.as_str().to_string(),
            recorded_at: Utc::now(),
            source: "smoke-test".to_string(),
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    for _ in 0..2 {
        let outcome = recalculate_timeline(&storage, user_id, Some(&[25_000, 100_000][..]), Utc::now())
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        assert!(matches!(outcome, TimelineOutcome::Measured { .. }));
    }

    let stored = storage
        .list_projections(user_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(stored.len(), 2);
    Ok(())
}
