/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In
/// production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Externally visible origin of this server. Prefixed to the request
    /// path and query to rebuild the URL the marketplace signed.
    pub public_base_url: String,
    /// Partner key used to verify webhook signatures. Without it every
    /// webhook is rejected.
    pub shopee_partner_key: Option<String>,
    /// Allowed distance between a webhook's timestamp and now.
    pub webhook_timestamp_tolerance_secs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default                 |
    /// |------------------------------------|-------------------------|
    /// | `HOST`                             | `0.0.0.0`               |
    /// | `PORT`                             | `3000`                  |
    /// | `CORS_ORIGINS`                     | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`             | `30`                    |
    /// | `PUBLIC_BASE_URL`                  | `http://localhost:3000` |
    /// | `SHOPEE_PARTNER_KEY`               | unset                   |
    /// | `WEBHOOK_TIMESTAMP_TOLERANCE_SECS` | `300`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();

        let shopee_partner_key = std::env::var("SHOPEE_PARTNER_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        if shopee_partner_key.is_none() {
            tracing::warn!("SHOPEE_PARTNER_KEY is not set, every webhook will be rejected");
        }

        let webhook_timestamp_tolerance_secs: i64 =
            std::env::var("WEBHOOK_TIMESTAMP_TOLERANCE_SECS")
                .unwrap_or_else(|_| "300".into())
                .parse()
                .expect("WEBHOOK_TIMESTAMP_TOLERANCE_SECS must be a valid i64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            public_base_url,
            shopee_partner_key,
            webhook_timestamp_tolerance_secs,
        }
    }
}
