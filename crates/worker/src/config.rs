use std::time::Duration;

use marketsync_shopee::ShopeeConfig;

use crate::rate_limit::RateLimit;

/// Worker process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub shopee: ShopeeConfig,
    pub order_concurrency: usize,
    pub order_rate_limit: RateLimit,
    pub inventory_concurrency: usize,
    pub inventory_rate_limit: RateLimit,
    pub catalog_concurrency: usize,
    pub catalog_page_size: i64,
    pub poll_interval: Duration,
    pub job_retention: Duration,
    pub stalled_job_timeout: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                            |
    /// |--------------------------------|------------------------------------|
    /// | `DATABASE_URL`                 | (required)                         |
    /// | `SHOPEE_PARTNER_ID`            | none                               |
    /// | `SHOPEE_PARTNER_KEY`           | none                               |
    /// | `SHOPEE_API_BASE_URL`          | `https://partner.shopeemobile.com` |
    /// | `ORDER_WORKER_CONCURRENCY`     | `2`                                |
    /// | `ORDER_WORKER_RATE_LIMIT`      | `10` per second                    |
    /// | `INVENTORY_WORKER_CONCURRENCY` | `10`                               |
    /// | `INVENTORY_WORKER_RATE_LIMIT`  | `50` per second                    |
    /// | `CATALOG_WORKER_CONCURRENCY`   | `2`                                |
    /// | `CATALOG_PAGE_SIZE`            | `50`                               |
    /// | `QUEUE_POLL_INTERVAL_MS`       | `500`                              |
    /// | `JOB_RETENTION_HOURS`          | `24`                               |
    /// | `STALLED_JOB_TIMEOUT_SECS`     | `300`                              |
    ///
    /// Panics on missing `DATABASE_URL` or unparseable values.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let shopee = ShopeeConfig {
            partner_id: std::env::var("SHOPEE_PARTNER_ID")
                .ok()
                .map(|v| v.parse().expect("SHOPEE_PARTNER_ID must be a valid i64")),
            partner_key: std::env::var("SHOPEE_PARTNER_KEY").ok().filter(|k| !k.is_empty()),
            base_url: std::env::var("SHOPEE_API_BASE_URL")
                .unwrap_or_else(|_| ShopeeConfig::DEFAULT_BASE_URL.into()),
        };

        Self {
            database_url,
            shopee,
            order_concurrency: parse_env("ORDER_WORKER_CONCURRENCY", 2),
            order_rate_limit: RateLimit::per_second(parse_env("ORDER_WORKER_RATE_LIMIT", 10)),
            inventory_concurrency: parse_env("INVENTORY_WORKER_CONCURRENCY", 10),
            inventory_rate_limit: RateLimit::per_second(parse_env("INVENTORY_WORKER_RATE_LIMIT", 50)),
            catalog_concurrency: parse_env("CATALOG_WORKER_CONCURRENCY", 2),
            catalog_page_size: parse_env("CATALOG_PAGE_SIZE", 50),
            poll_interval: Duration::from_millis(parse_env("QUEUE_POLL_INTERVAL_MS", 500)),
            job_retention: Duration::from_secs(parse_env::<u64>("JOB_RETENTION_HOURS", 24) * 3600),
            stalled_job_timeout: Duration::from_secs(parse_env("STALLED_JOB_TIMEOUT_SECS", 300)),
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} is invalid ({raw}): {e}")),
        Err(_) => default,
    }
}
