use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::MASTER_CACHE_DOC;
use crate::discogs::retry::{retry_with_backoff, RetryPolicy};
use crate::discogs::DiscogsApi;
use crate::store::JsonStore;

/// Resolves a listing's release id to its master (release-group) id.
///
/// The inventory API doesn't carry master ids, so each distinct release
/// costs one `/releases/{id}` call — cached forever, since the mapping is
/// immutable upstream. The in-memory mirror is loaded once per scan and
/// flushed read-modify-write at scan end, so entries resolved concurrently
/// by anything else touching the document are never clobbered.
pub struct MasterResolver<A> {
    api: Arc<A>,
    store: JsonStore,
    retry: RetryPolicy,
    cache: DashMap<u64, u64>,
    dirty: AtomicBool,
}

impl<A: DiscogsApi> MasterResolver<A> {
    pub async fn load(api: Arc<A>, store: JsonStore, retry: RetryPolicy) -> Self {
        let persisted: HashMap<String, u64> = store.read_or_default(MASTER_CACHE_DOC).await;
        let cache = DashMap::new();
        for (release_id, master_id) in persisted {
            if let Ok(rid) = release_id.parse::<u64>() {
                cache.insert(rid, master_id);
            }
        }
        debug!("Release→master cache loaded: {} entries", cache.len());
        Self { api, store, retry, cache, dirty: AtomicBool::new(false) }
    }

    /// Resolve one release. `None` means resolution failed — the caller
    /// skips the listing; a bad release never fails the seller's scan.
    ///
    /// A release with no master is its own group: it resolves to its own
    /// release id, so one-off pressings still match wantlist entries that
    /// reference them directly.
    pub async fn resolve(&self, release_id: u64) -> Option<u64> {
        if let Some(hit) = self.cache.get(&release_id) {
            return Some(*hit);
        }

        let api = Arc::clone(&self.api);
        let result = retry_with_backoff(self.retry, || api.release(release_id)).await;

        match result {
            Ok(detail) => {
                let master_id = detail.master_id.unwrap_or(release_id);
                self.cache.insert(release_id, master_id);
                self.dirty.store(true, Ordering::Relaxed);
                Some(master_id)
            }
            Err(e) => {
                warn!("Failed to resolve master for release {release_id}: {e}");
                None
            }
        }
    }

    /// Merge newly resolved entries into the persisted document. Called
    /// once at scan end; a flush failure only costs future cache misses.
    pub async fn flush(&self) {
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return;
        }
        let mut persisted: HashMap<String, u64> =
            self.store.read_or_default(MASTER_CACHE_DOC).await;
        for entry in self.cache.iter() {
            persisted.entry(entry.key().to_string()).or_insert(*entry.value());
        }
        if let Err(e) = self.store.write(MASTER_CACHE_DOC, &persisted).await {
            warn!("Failed to persist release→master cache: {e}");
        }
    }

    #[cfg(test)]
    pub fn cached(&self, release_id: u64) -> Option<u64> {
        self.cache.get(&release_id).map(|v| *v)
    }
}
