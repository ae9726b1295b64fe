//! Utility to inspect the service's tables and print their structure.
//!
//! Also checks that the unique index backing projection upserts exists.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

const TABLES: &[&str] = &[
    "tradelines",
    "score_history",
    "credit_inquiries",
    "funding_projections",
    "consents",
    "gated_actions",
    "admin_approvals",
    "disputes",
    "audit_log",
    "rate_limit_counters",
];

/// Main entry point for the schema inspection utility.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL")
        .or_else(|_| env::var("DB_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    let mut missing = Vec::new();
    for table in TABLES {
        let columns: Vec<(String, String)> = sqlx::query_as(
            "SELECT column_name, data_type FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position"
        )
        .bind(table)
        .fetch_all(&pool)
        .await?;

        if columns.is_empty() {
            missing.push(*table);
            continue;
        }

        println!("- {}", table);
        for (col, type_) in columns {
            println!("  - {}: {}", col, type_);
        }
        println!();
    }

    // Projection upserts rely on ON CONFLICT (user_id, target_amount)
    let unique_index: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT indexname FROM pg_indexes
        WHERE tablename = 'funding_projections'
          AND indexdef ILIKE 'CREATE UNIQUE INDEX%(user_id, target_amount)%'
        LIMIT 1
        "#,
    )
    .fetch_optional(&pool)
    .await?;

    match unique_index {
        Some((name,)) => println!("✓ funding_projections unique index: {}", name),
        None => println!("✗ funding_projections has no unique index on (user_id, target_amount)"),
    }

    if !missing.is_empty() {
        println!("Missing tables: {}", missing.join(", "));
        std::process::exit(1);
    }

    Ok(())
}
