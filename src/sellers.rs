use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{
    checkpoint_doc, MATCHES_DOC, SELLERS_DOC, SETTINGS_DOC, SETTINGS_SCHEMA_VERSION,
};
use crate::discogs::retry::{retry_with_backoff, RetryPolicy};
use crate::discogs::DiscogsApi;
use crate::error::{AppError, Result};
use crate::store::{sanitize_cache_key, JsonStore};
use crate::types::{
    now_secs, MatchCacheInfo, MatchesWithCacheInfo, MonitoredSeller, MonitoringSettings,
    SellerMatch,
};

/// Settings with the wrong schema version are replaced wholesale by
/// defaults rather than migrated field by field.
pub async fn load_settings(store: &JsonStore) -> MonitoringSettings {
    match store.read::<MonitoringSettings>(SETTINGS_DOC).await {
        Ok(Some(s)) if s.version == SETTINGS_SCHEMA_VERSION => s,
        Ok(Some(s)) => {
            warn!(
                stored = s.version,
                expected = SETTINGS_SCHEMA_VERSION,
                "Settings schema version mismatch, using defaults"
            );
            MonitoringSettings::default()
        }
        Ok(None) => MonitoringSettings::default(),
        Err(e) => {
            warn!("Unreadable settings document, using defaults: {e}");
            MonitoringSettings::default()
        }
    }
}

/// CRUD over monitored sellers plus the read surfaces the route layer
/// exposes. Usernames are canonicalized to lowercase; uniqueness is
/// case-insensitive.
pub struct SellerService<A> {
    api: Arc<A>,
    store: JsonStore,
    retry: RetryPolicy,
}

impl<A: DiscogsApi> SellerService<A> {
    pub fn new(api: Arc<A>, store: JsonStore) -> Self {
        Self { api, store, retry: RetryPolicy::default() }
    }

    pub async fn get_sellers(&self) -> Vec<MonitoredSeller> {
        self.store.read_or_default(SELLERS_DOC).await
    }

    /// Add a seller after confirming the username exists on Discogs.
    /// A missing upstream user is a distinct error from generic
    /// validation so the caller can say "no such seller".
    pub async fn add_seller(
        &self,
        username: &str,
        display_name: Option<String>,
    ) -> Result<MonitoredSeller> {
        let trimmed = username.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("username is required".to_string()));
        }
        let canonical = trimmed.to_lowercase();

        let mut sellers = self.get_sellers().await;
        if sellers.iter().any(|s| s.username == canonical) {
            return Err(AppError::SellerExists(canonical));
        }

        let api = Arc::clone(&self.api);
        let exists = retry_with_backoff(self.retry, || api.user_exists(trimmed)).await?;
        if !exists {
            return Err(AppError::SellerNotFound(trimmed.to_string()));
        }

        let seller = MonitoredSeller {
            username: canonical.clone(),
            display_name: display_name.unwrap_or_else(|| trimmed.to_string()),
            added_at: now_secs(),
            inventory_size: None,
            match_count: 0,
            last_scanned: None,
        };
        sellers.push(seller.clone());
        self.store.write(SELLERS_DOC, &sellers).await?;
        info!(username = %canonical, "Seller added to monitoring");
        Ok(seller)
    }

    /// Remove a seller and cascade-delete their matches and any partial
    /// inventory checkpoint. Cascade failures are logged and swallowed —
    /// the removal itself still succeeds.
    pub async fn remove_seller(&self, username: &str) -> Result<()> {
        let canonical = username.trim().to_lowercase();

        let mut sellers = self.get_sellers().await;
        let before = sellers.len();
        sellers.retain(|s| s.username != canonical);
        if sellers.len() == before {
            return Err(AppError::NotFound(format!("seller {canonical} is not monitored")));
        }
        self.store.write(SELLERS_DOC, &sellers).await?;

        let mut matches: Vec<SellerMatch> = self.store.read_or_default(MATCHES_DOC).await;
        let match_count = matches.len();
        matches.retain(|m| m.seller_id != canonical);
        if matches.len() != match_count {
            if let Err(e) = self.store.write(MATCHES_DOC, &matches).await {
                warn!(username = %canonical, "Failed to cascade match deletion: {e}");
            }
        }
        if let Err(e) = self.store.delete(&checkpoint_doc(&sanitize_cache_key(&canonical))).await {
            warn!(username = %canonical, "Failed to delete inventory checkpoint: {e}");
        }

        info!(username = %canonical, "Seller removed from monitoring");
        Ok(())
    }

    pub async fn get_all_matches(&self) -> Vec<SellerMatch> {
        self.store.read_or_default(MATCHES_DOC).await
    }

    pub async fn get_matches_by_seller(&self, username: &str) -> Vec<SellerMatch> {
        let canonical = username.trim().to_lowercase();
        let matches = self.get_all_matches().await;
        matches.into_iter().filter(|m| m.seller_id == canonical).collect()
    }

    pub async fn get_settings(&self) -> MonitoringSettings {
        load_settings(&self.store).await
    }

    pub async fn save_settings(&self, mut settings: MonitoringSettings) -> Result<MonitoringSettings> {
        settings.version = SETTINGS_SCHEMA_VERSION;
        self.store.write(SETTINGS_DOC, &settings).await?;
        Ok(settings)
    }

    /// All matches plus freshness derived from seller scan timestamps:
    /// when the caches were last touched, how stale the oldest seller is,
    /// and when the next scheduled scan is due.
    pub async fn matches_with_cache_info(&self) -> MatchesWithCacheInfo {
        let matches = self.get_all_matches().await;
        let sellers = self.get_sellers().await;
        let settings = self.get_settings().await;

        let scanned: Vec<u64> = sellers.iter().filter_map(|s| s.last_scanned).collect();
        let newest = scanned.iter().max().copied();
        let oldest = scanned.iter().min().copied();
        let now = now_secs();

        let cache_info = MatchCacheInfo {
            last_updated: newest,
            oldest_scan_age: oldest.map(|t| now.saturating_sub(t)),
            next_scan_due: oldest
                .map(|t| t + u64::from(settings.scan_frequency_days) * 24 * 3_600),
        };
        MatchesWithCacheInfo { matches, cache_info }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discogs::testutil::FakeDiscogs;
    use crate::types::MatchStatus;

    fn setup() -> (tempfile::TempDir, JsonStore, Arc<FakeDiscogs>, SellerService<FakeDiscogs>) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let api = Arc::new(FakeDiscogs::new());
        let service = SellerService::new(Arc::clone(&api), store.clone());
        (dir, store, api, service)
    }

    fn match_for(seller: &str, id: u64) -> SellerMatch {
        SellerMatch {
            id: id.to_string(),
            seller_id: seller.to_string(),
            release_id: 1,
            master_id: 1,
            artist: String::new(),
            title: String::new(),
            format: vec![],
            condition: String::new(),
            price: 0.0,
            currency: "USD".to_string(),
            listing_url: String::new(),
            listing_id: id,
            date_found: now_secs(),
            notified: false,
            status: MatchStatus::Active,
            status_confidence: None,
        }
    }

    #[tokio::test]
    async fn add_seller_canonicalizes_and_validates_upstream() {
        let (_d, _store, api, service) = setup();
        api.add_user("DustyGrooves");

        let seller = service.add_seller("DustyGrooves", None).await.unwrap();
        assert_eq!(seller.username, "dustygrooves");
        assert_eq!(seller.display_name, "DustyGrooves");

        // Case-insensitive duplicate.
        let err = service.add_seller("dustygrooves", None).await.unwrap_err();
        assert!(matches!(err, AppError::SellerExists(_)));
    }

    #[tokio::test]
    async fn add_unknown_seller_is_distinct_error() {
        let (_d, _store, _api, service) = setup();
        let err = service.add_seller("nobody", None).await.unwrap_err();
        assert!(matches!(err, AppError::SellerNotFound(_)));
    }

    #[tokio::test]
    async fn add_empty_username_is_validation_error() {
        let (_d, _store, _api, service) = setup();
        let err = service.add_seller("   ", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn remove_seller_cascades_matches_and_checkpoint() {
        let (_d, store, api, service) = setup();
        api.add_user("dusty");
        service.add_seller("dusty", None).await.unwrap();

        store
            .write(MATCHES_DOC, &vec![match_for("dusty", 1), match_for("other", 2)])
            .await
            .unwrap();
        store
            .write(&checkpoint_doc("dusty"), &serde_json::json!({"items": []}))
            .await
            .unwrap();

        service.remove_seller("Dusty").await.unwrap();

        assert!(service.get_sellers().await.is_empty());
        let matches: Vec<SellerMatch> = store.read(MATCHES_DOC).await.unwrap().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].seller_id, "other");
        let cp: Option<serde_json::Value> = store.read(&checkpoint_doc("dusty")).await.unwrap();
        assert!(cp.is_none());
    }

    #[tokio::test]
    async fn remove_unknown_seller_is_not_found() {
        let (_d, _store, _api, service) = setup();
        let err = service.remove_seller("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn matches_by_seller_filters() {
        let (_d, store, _api, service) = setup();
        store
            .write(MATCHES_DOC, &vec![match_for("dusty", 1), match_for("other", 2)])
            .await
            .unwrap();

        let found = service.get_matches_by_seller("DUSTY").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].seller_id, "dusty");
    }

    #[tokio::test]
    async fn settings_version_mismatch_falls_back_to_defaults() {
        let (_d, store, _api, service) = setup();

        store
            .write(
                SETTINGS_DOC,
                &serde_json::json!({
                    "version": 999,
                    "scanFrequencyDays": 1,
                    "quickCheckFrequencyHours": 1,
                    "notifyOnNewMatch": false,
                    "vinylFormatsOnly": false
                }),
            )
            .await
            .unwrap();

        let settings = service.get_settings().await;
        assert_eq!(settings.version, SETTINGS_SCHEMA_VERSION);
        assert_eq!(settings.scan_frequency_days, MonitoringSettings::default().scan_frequency_days);
    }

    #[tokio::test]
    async fn save_settings_stamps_current_version() {
        let (_d, _store, _api, service) = setup();
        let mut settings = MonitoringSettings::default();
        settings.version = 0;
        settings.vinyl_formats_only = false;

        let saved = service.save_settings(settings).await.unwrap();
        assert_eq!(saved.version, SETTINGS_SCHEMA_VERSION);

        let reloaded = service.get_settings().await;
        assert!(!reloaded.vinyl_formats_only);
    }

    #[tokio::test]
    async fn cache_info_derives_from_scan_timestamps() {
        let (_d, store, _api, service) = setup();
        let now = now_secs();
        let sellers = vec![
            MonitoredSeller {
                username: "a".to_string(),
                display_name: "a".to_string(),
                added_at: now,
                inventory_size: None,
                match_count: 0,
                last_scanned: Some(now - 3_600),
            },
            MonitoredSeller {
                username: "b".to_string(),
                display_name: "b".to_string(),
                added_at: now,
                inventory_size: None,
                match_count: 0,
                last_scanned: Some(now - 7_200),
            },
        ];
        store.write(SELLERS_DOC, &sellers).await.unwrap();

        let info = service.matches_with_cache_info().await.cache_info;
        assert_eq!(info.last_updated, Some(now - 3_600));
        assert!(info.oldest_scan_age.unwrap() >= 7_200);
        let freq_secs = u64::from(MonitoringSettings::default().scan_frequency_days) * 24 * 3_600;
        assert_eq!(info.next_scan_due, Some(now - 7_200 + freq_secs));
    }

    #[tokio::test]
    async fn cache_info_empty_when_never_scanned() {
        let (_d, _store, _api, service) = setup();
        let info = service.matches_with_cache_info().await.cache_info;
        assert!(info.last_updated.is_none());
        assert!(info.oldest_scan_age.is_none());
        assert!(info.next_scan_due.is_none());
    }
}
