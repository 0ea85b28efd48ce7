use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::{MATCHES_DOC, SCAN_STATUS_DOC, SELLERS_DOC};
use crate::discogs::retry::RetryPolicy;
use crate::discogs::DiscogsApi;
use crate::error::{AppError, Result};
use crate::sellers::load_settings;
use crate::store::JsonStore;
use crate::types::{now_secs, MonitoredSeller, ScanState, ScanStatus, SellerMatch};
use crate::wishlist::Wishlist;

use super::matcher::apply_seller_listings;
use super::paginator::fetch_full_inventory;
use super::resolver::MasterResolver;

/// Fold scan results into the currently persisted seller list. Sellers
/// removed during the scan stay removed; sellers added during the scan
/// are kept untouched.
fn merge_seller_results(current: &mut [MonitoredSeller], scanned: &[MonitoredSeller]) {
    for seller in current.iter_mut() {
        if let Some(s) = scanned.iter().find(|s| s.username == seller.username) {
            seller.last_scanned = s.last_scanned;
            seller.inventory_size = s.inventory_size;
            seller.match_count = s.match_count;
        }
    }
}

struct SellerScanOutcome {
    new_matches: u32,
    refreshed: u32,
    marked_sold: u32,
    inventory_size: u32,
    match_count: u32,
}

/// Drives the full scan: sellers are walked sequentially (the shared rate
/// limiter makes parallelism pointless), each through paginator → resolver
/// → match engine, with progress published after every seller whether it
/// succeeded, checkpointed, or failed outright.
///
/// Single-flight is an instance-owned flag, so independent orchestrators
/// (tests) don't share state. It is in-memory only: a crash mid-scan
/// leaves the persisted status saying `scanning` until the next start
/// overwrites it — accepted, not silently repaired.
pub struct ScanOrchestrator<A> {
    api: Arc<A>,
    store: JsonStore,
    wishlist: Wishlist,
    retry: RetryPolicy,
    scanning: AtomicBool,
    status: RwLock<ScanStatus>,
}

impl<A: DiscogsApi> ScanOrchestrator<A> {
    pub fn new(api: Arc<A>, store: JsonStore, wishlist: Wishlist) -> Arc<Self> {
        Arc::new(Self {
            api,
            store,
            wishlist,
            retry: RetryPolicy::default(),
            scanning: AtomicBool::new(false),
            status: RwLock::new(ScanStatus::default()),
        })
    }

    /// Reload the last persisted status, typically at startup. A stale
    /// `scanning` here means the process died mid-scan.
    pub async fn restore_status(&self) {
        if let Ok(Some(persisted)) = self.store.read::<ScanStatus>(SCAN_STATUS_DOC).await {
            if persisted.status == ScanState::Scanning {
                warn!("Persisted scan status is 'scanning' — previous process likely died mid-scan");
            }
            *self.status.write().await = persisted;
        }
    }

    pub async fn get_status(&self) -> ScanStatus {
        self.status.read().await.clone()
    }

    /// Kick off a background scan and return immediately. If a scan is
    /// already running the current status is returned unchanged and no
    /// second task is spawned.
    pub async fn start_scan(self: &Arc<Self>) -> ScanStatus {
        if self.scanning.swap(true, Ordering::SeqCst) {
            return self.get_status().await;
        }

        {
            let mut status = self.status.write().await;
            let last = status.last_scan_timestamp;
            *status = ScanStatus {
                status: ScanState::Scanning,
                last_scan_timestamp: last,
                ..ScanStatus::default()
            };
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this.run_scan().await;
            let mut status = this.status.write().await;
            status.status = match result {
                Ok(()) => {
                    status.progress = 100;
                    ScanState::Completed
                }
                Err(e) => {
                    error!("Scan aborted: {e}");
                    ScanState::Error
                }
            };
            status.last_scan_timestamp = Some(now_secs());
            let snapshot = status.clone();
            drop(status);

            if let Err(e) = this.store.write(SCAN_STATUS_DOC, &snapshot).await {
                warn!("Failed to persist final scan status: {e}");
            }
            this.scanning.store(false, Ordering::SeqCst);
        });

        self.get_status().await
    }

    async fn update_status(&self, f: impl FnOnce(&mut ScanStatus)) {
        let mut status = self.status.write().await;
        f(&mut status);
    }

    async fn run_scan(&self) -> Result<()> {
        let settings = load_settings(&self.store).await;
        let mut sellers: Vec<MonitoredSeller> = self.store.read_or_default(SELLERS_DOC).await;
        let total = sellers.len() as u32;

        self.update_status(|s| s.total_sellers = total).await;
        if let Err(e) = self.store.write(SCAN_STATUS_DOC, &self.get_status().await).await {
            warn!("Failed to persist scan status: {e}");
        }

        if sellers.is_empty() {
            info!("No monitored sellers — scan is a no-op");
            return Ok(());
        }

        // One snapshot for the whole scan: every seller matches against
        // the same target set.
        let wanted = self.wishlist.tracked_master_ids().await;
        let resolver =
            MasterResolver::load(Arc::clone(&self.api), self.store.clone(), self.retry).await;

        info!(
            sellers = total,
            tracked_masters = wanted.len(),
            vinyl_only = settings.vinyl_formats_only,
            "Starting seller inventory scan"
        );

        let mut fatal: Option<AppError> = None;
        // A hard (non-checkpoint) fetch failure is survivable only while
        // there is another seller to move on to. When the last seller
        // processed ended this way, the scan as a whole failed.
        let mut trailing_failure: Option<AppError> = None;

        for (i, seller) in sellers.iter_mut().enumerate() {
            let outcome = self
                .scan_seller(seller, &wanted, &resolver, settings.vinyl_formats_only)
                .await;

            match outcome {
                Ok(o) => {
                    seller.last_scanned = Some(now_secs());
                    seller.inventory_size = Some(o.inventory_size);
                    seller.match_count = o.match_count;
                    trailing_failure = None;
                    self.update_status(|s| s.new_matches += o.new_matches).await;
                    info!(
                        username = %seller.username,
                        inventory = o.inventory_size,
                        new_matches = o.new_matches,
                        refreshed = o.refreshed,
                        marked_sold = o.marked_sold,
                        "Seller scan complete"
                    );
                }
                Err(e @ AppError::Config(_)) => {
                    fatal = Some(e);
                }
                Err(AppError::InventoryIncomplete { username, last_completed_page }) => {
                    trailing_failure = None;
                    warn!(
                        username = %username,
                        last_completed_page,
                        "Seller scan checkpointed, continuing with next seller"
                    );
                }
                Err(e) => {
                    warn!(username = %seller.username, "Seller scan failed: {e}");
                    trailing_failure = Some(e);
                }
            }

            // Progress moves after every seller, failed or not.
            let scanned = (i + 1) as u32;
            self.update_status(|s| {
                s.sellers_scanned = scanned;
                s.progress = ((scanned * 100) / total) as u8;
            })
            .await;

            if fatal.is_some() {
                break;
            }
        }

        resolver.flush().await;

        // The document may have changed while the scan ran (sellers added
        // or removed through the API), so merge per-seller results into a
        // fresh read instead of writing back the snapshot.
        let mut current: Vec<MonitoredSeller> = self.store.read_or_default(SELLERS_DOC).await;
        merge_seller_results(&mut current, &sellers);
        self.store.write(SELLERS_DOC, &current).await?;

        match fatal.or(trailing_failure) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn scan_seller(
        &self,
        seller: &MonitoredSeller,
        wanted: &HashSet<u64>,
        resolver: &MasterResolver<A>,
        vinyl_only: bool,
    ) -> Result<SellerScanOutcome> {
        let inventory =
            fetch_full_inventory(&self.api, &self.store, self.retry, &seller.username).await?;
        let inventory_size = inventory.total_items;

        let mut resolved = Vec::with_capacity(inventory.listings.len());
        for listing in inventory.listings {
            // Failed resolutions skip the listing, never the seller.
            if let Some(master_id) = resolver.resolve(listing.release_id).await {
                resolved.push((listing, master_id));
            }
        }

        let mut matches: Vec<SellerMatch> = self.store.read_or_default(MATCHES_DOC).await;
        let stats =
            apply_seller_listings(&mut matches, &seller.username, &resolved, wanted, vinyl_only);
        let match_count = matches
            .iter()
            .filter(|m| m.seller_id == seller.username)
            .count() as u32;
        self.store.write(MATCHES_DOC, &matches).await?;

        Ok(SellerScanOutcome {
            new_matches: stats.new_matches,
            refreshed: stats.refreshed,
            marked_sold: stats.marked_sold,
            inventory_size,
            match_count,
        })
    }
}
