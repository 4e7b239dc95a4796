use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Environment partitions to scan (comma-separated, e.g. "prod,staging")
    pub environments: Vec<String>,

    /// FCM project identifier (required by the dispatch worker)
    pub fcm_project_id: Option<String>,

    /// Pre-minted OAuth bearer token for the FCM HTTP v1 API
    pub fcm_auth_token: Option<String>,

    /// Queue polling interval in milliseconds (default: 2000)
    pub queue_poll_interval_ms: u64,

    /// Delinquency scan interval in seconds (default: 604800 = weekly)
    pub scan_interval_secs: u64,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            environments: std::env::var("ENVIRONMENTS")
                .unwrap_or_else(|_| "prod".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            fcm_project_id: std::env::var("FCM_PROJECT_ID").ok(),
            fcm_auth_token: std::env::var("FCM_AUTH_TOKEN").ok(),
            queue_poll_interval_ms: std::env::var("QUEUE_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("QUEUE_POLL_INTERVAL_MS must be a valid u64"))?,
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| "604800".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SCAN_INTERVAL_SECS must be a valid u64"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}
