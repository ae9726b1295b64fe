//! Per-user, per-operation rate limiting over fixed windows.
//!
//! Two backends share one policy: a Postgres counter table for deployments
//! with more than one instance, and an in-process moka cache.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use moka::future::Cache;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::RateLimitStore;
use crate::errors::{AppError, ResultExt};

#[allow(async_fn_in_trait)]
pub trait RateLimiter {
    /// Counts one attempt and reports whether it is within the limit.
    async fn allow(&self, user_id: Uuid, operation: &str, now: DateTime<Utc>) -> Result<bool, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn per_hour(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::hours(1),
        }
    }

    /// Start of the fixed window containing `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = self.window.num_seconds().max(1);
        let start = now.timestamp().div_euclid(secs) * secs;
        Utc.timestamp_opt(start, 0).single().unwrap_or(now)
    }
}

/// Counter rows in `rate_limit_counters`, incremented atomically.
#[derive(Clone)]
pub struct PgRateLimiter {
    pool: PgPool,
    policy: RateLimitPolicy,
}

impl PgRateLimiter {
    pub fn new(pool: PgPool, policy: RateLimitPolicy) -> Self {
        Self { pool, policy }
    }
}

impl RateLimiter for PgRateLimiter {
    async fn allow(&self, user_id: Uuid, operation: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let window_start = self.policy.window_start(now);

        let count: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO rate_limit_counters (user_id, operation, window_start, request_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (user_id, operation, window_start)
            DO UPDATE SET request_count = rate_limit_counters.request_count + 1
            RETURNING request_count
            "#,
        )
        .bind(user_id)
        .bind(operation)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await
        .context("incrementing rate limit counter")?;

        let allowed = count as i64 <= i64::from(self.policy.max_requests);
        if !allowed {
            tracing::warn!(%user_id, operation, count, "Rate limit exceeded");
        }
        Ok(allowed)
    }
}

/// In-process counters keyed by user, operation and window.
#[derive(Clone)]
pub struct LocalRateLimiter {
    counters: Cache<String, Arc<AtomicU32>>,
    policy: RateLimitPolicy,
}

impl LocalRateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        let ttl = policy
            .window
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(3600));
        let counters = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(100_000)
            .build();
        Self { counters, policy }
    }
}

impl RateLimiter for LocalRateLimiter {
    async fn allow(&self, user_id: Uuid, operation: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let window_start = self.policy.window_start(now);
        let key = format!("{}:{}:{}", user_id, operation, window_start.timestamp());

        let counter = self
            .counters
            .get_with(key, async { Arc::new(AtomicU32::new(0)) })
            .await;
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;

        let allowed = count <= self.policy.max_requests;
        if !allowed {
            tracing::warn!(%user_id, operation, count, "Rate limit exceeded");
        }
        Ok(allowed)
    }
}

/// Backend chosen by `RATE_LIMIT_STORE`.
#[derive(Clone)]
pub enum RateLimitBackend {
    Postgres(PgRateLimiter),
    Local(LocalRateLimiter),
}

impl RateLimitBackend {
    pub fn new(store: RateLimitStore, pool: &PgPool, policy: RateLimitPolicy) -> Self {
        match store {
            RateLimitStore::Postgres => Self::Postgres(PgRateLimiter::new(pool.clone(), policy)),
            RateLimitStore::Memory => Self::Local(LocalRateLimiter::new(policy)),
        }
    }
}

impl RateLimiter for RateLimitBackend {
    async fn allow(&self, user_id: Uuid, operation: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        match self {
            Self::Postgres(limiter) => limiter.allow(user_id, operation, now).await,
            Self::Local(limiter) => limiter.allow(user_id, operation, now).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_window_start_floors_to_hour() {
        let policy = RateLimitPolicy::per_hour(5);
        assert_eq!(policy.window_start(at(14, 59)), at(14, 0));
        assert_eq!(policy.window_start(at(15, 0)), at(15, 0));
    }

    #[tokio::test]
    async fn test_local_limit_denies_after_max() {
        let limiter = LocalRateLimiter::new(RateLimitPolicy::per_hour(5));
        let user = Uuid::new_v4();

        for i in 0..5 {
            assert!(limiter.allow(user, "million_mode", at(9, i)).await.unwrap());
        }
        assert!(!limiter.allow(user, "million_mode", at(9, 30)).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_limit_resets_next_window() {
        let limiter = LocalRateLimiter::new(RateLimitPolicy::per_hour(1));
        let user = Uuid::new_v4();

        assert!(limiter.allow(user, "million_mode", at(9, 10)).await.unwrap());
        assert!(!limiter.allow(user, "million_mode", at(9, 50)).await.unwrap());
        assert!(limiter.allow(user, "million_mode", at(10, 5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_counters_are_per_user_and_operation() {
        let limiter = LocalRateLimiter::new(RateLimitPolicy::per_hour(1));
        let user = Uuid::new_v4();

        assert!(limiter.allow(user, "million_mode", at(9, 0)).await.unwrap());
        assert!(limiter.allow(user, "dispute_submission", at(9, 0)).await.unwrap());
        assert!(limiter.allow(Uuid::new_v4(), "million_mode", at(9, 0)).await.unwrap());
    }
}
