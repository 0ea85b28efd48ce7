use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire shapes — parsed defensively at the boundary. Discogs omits fields
// freely, so everything optional is defaulted rather than trusted.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawInventoryPage {
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub listings: Vec<RawListing>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub items: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawListing {
    pub id: u64,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub price: Option<RawPrice>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub release: Option<RawListingRelease>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPrice {
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawListingRelease {
    pub id: u64,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Comma-separated format summary, e.g. `"LP, Album, Reissue"`.
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDetail {
    pub id: u64,
    /// Absent for releases that have no master (single-issue releases).
    #[serde(default)]
    pub master_id: Option<u64>,
}

// ---------------------------------------------------------------------------
// Normalized shapes used by the scan pipeline (and serialized into
// partial-inventory checkpoints).
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryListing {
    pub listing_id: u64,
    pub release_id: u64,
    pub artist: String,
    pub title: String,
    pub formats: Vec<String>,
    pub condition: String,
    pub price: f64,
    pub currency: String,
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct InventoryPage {
    pub page: u32,
    pub total_pages: u32,
    pub total_items: u32,
    pub listings: Vec<InventoryListing>,
}

impl RawInventoryPage {
    /// Drop structurally unusable listings (no release id) and flatten the
    /// rest into the pipeline shape.
    pub fn normalize(self) -> InventoryPage {
        let listings = self
            .listings
            .into_iter()
            .filter_map(RawListing::normalize)
            .collect();
        InventoryPage {
            page: self.pagination.page,
            total_pages: self.pagination.pages,
            total_items: self.pagination.items,
            listings,
        }
    }
}

impl RawListing {
    fn normalize(self) -> Option<InventoryListing> {
        let release = self.release?;
        let (price, currency) = match self.price {
            Some(p) => (p.value, p.currency.unwrap_or_else(|| "USD".to_string())),
            None => (0.0, "USD".to_string()),
        };
        Some(InventoryListing {
            listing_id: self.id,
            release_id: release.id,
            artist: release.artist.unwrap_or_default(),
            title: release.title.unwrap_or_default(),
            formats: split_format_tokens(release.format.as_deref().unwrap_or("")),
            condition: self.condition.unwrap_or_default(),
            price,
            currency,
            uri: self.uri.unwrap_or_default(),
        })
    }
}

/// `"LP, Album, Reissue"` → `["LP", "Album", "Reissue"]`.
pub fn split_format_tokens(format: &str) -> Vec<String> {
    format
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
