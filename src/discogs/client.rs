use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{Config, INVENTORY_PAGE_SIZE, INVENTORY_REQUEST_INTERVAL_MS};
use crate::error::{AppError, Result};

use super::types::{InventoryPage, RawInventoryPage, ReleaseDetail};
use super::DiscogsApi;

/// How we authenticate against Discogs, chosen by which credentials are
/// configured. A personal token wins over a key/secret pair.
#[derive(Debug, Clone)]
enum Auth {
    Token(String),
    KeySecret { key: String, secret: String },
}

impl Auth {
    fn header_value(&self) -> String {
        match self {
            Auth::Token(t) => format!("Discogs token={t}"),
            Auth::KeySecret { key, secret } => {
                format!("Discogs key={key}, secret={secret}")
            }
        }
    }
}

/// Rate-limited Discogs API client. Every request — inventory pages,
/// release lookups, listing checks — serializes behind one shared
/// minimum-interval clock, so throughput is bounded no matter how many
/// sellers are being scanned.
pub struct DiscogsClient {
    http: reqwest::Client,
    base_url: String,
    auth: Option<Auth>,
    /// Earliest instant the next request may be dispatched.
    next_allowed: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl DiscogsClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(cfg.user_agent.clone())
            .build()?;

        let auth = match (&cfg.discogs_token, &cfg.discogs_key, &cfg.discogs_secret) {
            (Some(t), _, _) => Some(Auth::Token(t.clone())),
            (None, Some(k), Some(s)) => Some(Auth::KeySecret {
                key: k.clone(),
                secret: s.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            http,
            base_url: cfg.discogs_api_url.clone(),
            auth,
            next_allowed: Mutex::new(None),
            min_interval: Duration::from_millis(INVENTORY_REQUEST_INTERVAL_MS),
        })
    }

    /// Sleep until the shared floor delay permits the next request. The
    /// lock is held across the sleep so concurrent callers queue instead
    /// of racing the clock.
    async fn throttle(&self) {
        let mut next = self.next_allowed.lock().await;
        if let Some(at) = *next {
            let now = Instant::now();
            if at > now {
                tokio::time::sleep(at - now).await;
            }
        }
        *next = Some(Instant::now() + self.min_interval);
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let auth = self.auth.as_ref().ok_or_else(|| {
            AppError::Config(
                "Discogs credentials not configured (set DISCOGS_TOKEN or DISCOGS_KEY/DISCOGS_SECRET)"
                    .to_string(),
            )
        })?;

        self.throttle().await;

        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url}");
        let resp = self
            .http
            .get(&url)
            .header("Authorization", auth.header_value())
            .send()
            .await?;

        let status = resp.status().as_u16();
        match status {
            200..=299 => Ok(resp),
            // Discogs reuses 403 for throttling on this API, so both
            // rate-limit statuses route through the retry path.
            429 | 403 => Err(AppError::RateLimited { status }),
            404 => Err(AppError::NotFound(url)),
            _ => Err(AppError::UnexpectedStatus { status, url }),
        }
    }
}

/// Usernames come from API callers and go into a URL path segment, so
/// they get percent-encoded before interpolation.
fn inventory_path(username: &str, page: u32) -> String {
    format!(
        "/users/{}/inventory?status=For%20Sale&page={page}&per_page={INVENTORY_PAGE_SIZE}",
        urlencoding::encode(username)
    )
}

fn user_path(username: &str) -> String {
    format!("/users/{}", urlencoding::encode(username))
}

impl DiscogsApi for DiscogsClient {
    async fn inventory_page(&self, username: &str, page: u32) -> Result<InventoryPage> {
        let raw: RawInventoryPage = self
            .get(&inventory_path(username, page))
            .await?
            .json()
            .await?;
        Ok(raw.normalize())
    }

    async fn release(&self, release_id: u64) -> Result<ReleaseDetail> {
        let detail: ReleaseDetail = self
            .get(&format!("/releases/{release_id}"))
            .await?
            .json()
            .await?;
        Ok(detail)
    }

    async fn listing_exists(&self, listing_id: u64) -> Result<bool> {
        match self.get(&format!("/marketplace/listings/{listing_id}")).await {
            Ok(_) => Ok(true),
            Err(AppError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn user_exists(&self, username: &str) -> Result<bool> {
        match self.get(&user_path(username)).await {
            Ok(_) => Ok(true),
            Err(AppError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
