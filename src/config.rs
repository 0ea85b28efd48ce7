use crate::error::{AppError, Result};

pub const DISCOGS_API_URL: &str = "https://api.discogs.com";

/// Minimum gap between outbound marketplace requests while scanning.
/// Discogs throttles hard and inconsistently; every call in this subsystem
/// serializes behind this floor regardless of how many sellers are queued.
pub const INVENTORY_REQUEST_INTERVAL_MS: u64 = 200;

/// Listings per inventory page request (Discogs maximum).
pub const INVENTORY_PAGE_SIZE: u32 = 100;

/// Retry schedule for rate-limited / transport failures.
pub const RETRY_MAX_ATTEMPTS: u32 = 4;
pub const RETRY_INITIAL_DELAY_MS: u64 = 1_000;
pub const RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Partial-inventory checkpoints older than this are discarded and the
/// seller's scan restarts from page 1.
pub const CHECKPOINT_TTL_SECS: u64 = 24 * 3_600;

/// Sold matches older than this are eligible for stale cleanup.
pub const STALE_MATCH_AGE_SECS: u64 = 30 * 24 * 3_600;

/// Background scheduler poll interval.
pub const SCHEDULER_TICK_SECS: u64 = 3_600;

/// Bumped when the settings document shape changes; a stored document with
/// a different version is replaced by defaults.
pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

// Document paths within the JSON store.
pub const SELLERS_DOC: &str = "sellers/monitored-sellers.json";
pub const MATCHES_DOC: &str = "sellers/matches.json";
pub const MASTER_CACHE_DOC: &str = "sellers/release-master-cache.json";
pub const SETTINGS_DOC: &str = "sellers/monitoring-settings.json";
pub const SCAN_STATUS_DOC: &str = "sellers/scan-status.json";
pub const WANTLIST_DOC: &str = "wishlist/wantlist.json";
pub const LOCAL_WANTS_DOC: &str = "wishlist/local-wants.json";

pub fn checkpoint_doc(sanitized_username: &str) -> String {
    format!("sellers/inventory-cache/{sanitized_username}-partial.json")
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discogs_api_url: String,
    pub log_level: String,
    pub data_dir: String,
    pub api_port: u16,
    pub user_agent: String,
    /// Personal access token (DISCOGS_TOKEN). Preferred when set.
    pub discogs_token: Option<String>,
    /// Consumer key/secret pair (DISCOGS_KEY + DISCOGS_SECRET).
    pub discogs_key: Option<String>,
    pub discogs_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            discogs_api_url: std::env::var("DISCOGS_API_URL")
                .unwrap_or_else(|_| DISCOGS_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| {
                    AppError::Config("API_PORT must be a valid port number".to_string())
                })?,
            user_agent: std::env::var("DISCOGS_USER_AGENT")
                .unwrap_or_else(|_| "WantlistScanner/0.1 +https://github.com".to_string()),
            discogs_token: std::env::var("DISCOGS_TOKEN").ok().filter(|s| !s.is_empty()),
            discogs_key: std::env::var("DISCOGS_KEY").ok().filter(|s| !s.is_empty()),
            discogs_secret: std::env::var("DISCOGS_SECRET").ok().filter(|s| !s.is_empty()),
        })
    }
}
