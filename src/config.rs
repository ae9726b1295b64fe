use serde::Deserialize;

/// Where per-user operation counters live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitStore {
    /// Shared counter table in Postgres (multi-instance safe).
    Postgres,
    /// In-process counters, only correct for a single instance.
    Memory,
}

/// Transactional email API used to tell admins a review is waiting.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub base_url: String,
    pub api_key: String,
    pub admin_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub admin_api_key: String,
    pub max_hard_pulls_48h: u32,
    pub million_mode_rate_limit_per_hour: u32,
    pub dispute_rate_limit_per_hour: u32,
    pub rate_limit_store: RateLimitStore,
    pub notify: Option<NotifyConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            admin_api_key: std::env::var("ADMIN_API_KEY")
                .map_err(|_| anyhow::anyhow!("ADMIN_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("ADMIN_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            max_hard_pulls_48h: positive_u32("MAX_HARD_PULLS_48H", 6)?,
            million_mode_rate_limit_per_hour: positive_u32("MILLION_MODE_RATE_LIMIT_PER_HOUR", 5)?,
            dispute_rate_limit_per_hour: positive_u32("DISPUTE_RATE_LIMIT_PER_HOUR", 10)?,
            rate_limit_store: match std::env::var("RATE_LIMIT_STORE")
                .unwrap_or_else(|_| "postgres".to_string())
                .to_lowercase()
                .as_str()
            {
                "postgres" => RateLimitStore::Postgres,
                "memory" => RateLimitStore::Memory,
                other => anyhow::bail!(
                    "RATE_LIMIT_STORE must be 'postgres' or 'memory', got '{}'",
                    other
                ),
            },
            notify: notify_from_env()?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!(
            "Max hard pulls per 48h: {}, rate limit store: {:?}",
            config.max_hard_pulls_48h,
            config.rate_limit_store
        );
        match config.notify {
            Some(ref notify) => tracing::info!("Admin notifications via {}", notify.base_url),
            None => tracing::warn!("NOTIFY_* not set, admin notifications disabled"),
        }

        Ok(config)
    }
}

fn positive_u32(name: &str, default: u32) -> anyhow::Result<u32> {
    let value = match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("{} must be a positive integer", name))?,
        Err(_) => default,
    };
    if value == 0 {
        anyhow::bail!("{} must be at least 1", name);
    }
    Ok(value)
}

fn notify_from_env() -> anyhow::Result<Option<NotifyConfig>> {
    let base_url = std::env::var("NOTIFY_BASE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty());
    let api_key = std::env::var("NOTIFY_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());
    let admin_email = std::env::var("NOTIFY_ADMIN_EMAIL")
        .ok()
        .filter(|s| !s.trim().is_empty());

    match (base_url, api_key, admin_email) {
        (None, None, None) => Ok(None),
        (Some(base_url), Some(api_key), Some(admin_email)) => {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                anyhow::bail!("NOTIFY_BASE_URL must start with http:// or https://");
            }
            Ok(Some(NotifyConfig {
                base_url,
                api_key,
                admin_email,
            }))
        }
        _ => anyhow::bail!(
            "NOTIFY_BASE_URL, NOTIFY_API_KEY and NOTIFY_ADMIN_EMAIL must be set together"
        ),
    }
}
