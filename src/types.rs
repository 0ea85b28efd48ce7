use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::SETTINGS_SCHEMA_VERSION;

/// Unix epoch seconds. All persisted timestamps use this.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Monitored sellers
// ---------------------------------------------------------------------------

/// Documents are stored camelCase to match the shape the frontend reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredSeller {
    /// Canonical lowercase Discogs username. Uniqueness is enforced
    /// case-insensitively against this field.
    pub username: String,
    pub display_name: String,
    pub added_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_size: Option<u32>,
    #[serde(default)]
    pub match_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scanned: Option<u64>,
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Active,
    Seen,
    Sold,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusConfidence {
    /// Confirmed by a direct listing-endpoint check.
    Verified,
    /// Inferred from the listing disappearing between scans.
    Unverified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerMatch {
    /// Always `listing_id.to_string()` — deterministic so repeated scans
    /// of a still-listed item dedupe instead of duplicating.
    pub id: String,
    pub seller_id: String,
    pub release_id: u64,
    pub master_id: u64,
    pub artist: String,
    pub title: String,
    pub format: Vec<String>,
    pub condition: String,
    pub price: f64,
    pub currency: String,
    pub listing_url: String,
    pub listing_id: u64,
    pub date_found: u64,
    #[serde(default)]
    pub notified: bool,
    pub status: MatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_confidence: Option<StatusConfidence>,
}

// ---------------------------------------------------------------------------
// Scan status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Scanning,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub status: ScanState,
    pub sellers_scanned: u32,
    pub total_sellers: u32,
    /// 0–100.
    pub progress: u8,
    pub new_matches: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan_timestamp: Option<u64>,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self {
            status: ScanState::Idle,
            sellers_scanned: 0,
            total_sellers: 0,
            progress: 0,
            new_matches: 0,
            last_scan_timestamp: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSettings {
    /// Stamped on save; callers may omit it.
    #[serde(default)]
    pub version: u32,
    pub scan_frequency_days: u32,
    pub quick_check_frequency_hours: u32,
    pub notify_on_new_match: bool,
    pub vinyl_formats_only: bool,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_SCHEMA_VERSION,
            scan_frequency_days: 7,
            quick_check_frequency_hours: 24,
            notify_on_new_match: true,
            vinyl_formats_only: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Inventory checkpoint
// ---------------------------------------------------------------------------

/// Saved when a seller's inventory fetch dies after succeeding on earlier
/// pages, so the next scan resumes instead of re-downloading. Stale after
/// 24 hours — inventories churn too much to trust older partials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryCheckpoint {
    pub items: Vec<crate::discogs::types::InventoryListing>,
    pub last_completed_page: u32,
    pub total_pages: u32,
    pub total_items: u32,
    pub saved_at: u64,
}

// ---------------------------------------------------------------------------
// Derived cache info for the matches view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCacheInfo {
    /// Most recent seller scan timestamp, if any seller has been scanned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<u64>,
    /// Seconds since the least recently scanned seller was scanned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_scan_age: Option<u64>,
    /// When the next scheduled scan is due, from settings + oldest scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_scan_due: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchesWithCacheInfo {
    pub matches: Vec<SellerMatch>,
    pub cache_info: MatchCacheInfo,
}
