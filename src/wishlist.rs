use std::collections::HashSet;

use serde::Deserialize;
use tracing::debug;

use crate::config::{LOCAL_WANTS_DOC, WANTLIST_DOC};
use crate::store::JsonStore;

/// The only field the match engine needs from a wantlist entry. Items
/// without a master id can't be matched against resolved listings and are
/// skipped.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WantItem {
    #[serde(default)]
    master_id: Option<u64>,
}

/// Read view over the wishlist documents maintained elsewhere. The
/// orchestrator snapshots the tracked master set once per scan so every
/// seller is matched against the same target set without re-reading.
#[derive(Clone)]
pub struct Wishlist {
    store: JsonStore,
}

impl Wishlist {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    /// Union of the Discogs wantlist and the local want list.
    pub async fn tracked_master_ids(&self) -> HashSet<u64> {
        let mut tracked = HashSet::new();
        for doc in [WANTLIST_DOC, LOCAL_WANTS_DOC] {
            let items: Vec<WantItem> = self.store.read_or_default(doc).await;
            tracked.extend(items.into_iter().filter_map(|i| i.master_id));
        }
        debug!("Wishlist snapshot: {} tracked masters", tracked.len());
        tracked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_unions_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        store
            .write(
                WANTLIST_DOC,
                &serde_json::json!([
                    {"masterId": 12345, "artist": "Neu!"},
                    {"artist": "No Master Id Here"}
                ]),
            )
            .await
            .unwrap();
        store
            .write(LOCAL_WANTS_DOC, &serde_json::json!([{"masterId": 67890}]))
            .await
            .unwrap();

        let tracked = Wishlist::new(store).tracked_master_ids().await;
        assert_eq!(tracked, HashSet::from([12_345, 67_890]));
    }

    #[tokio::test]
    async fn missing_documents_yield_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        assert!(Wishlist::new(store).tracked_master_ids().await.is_empty());
    }
}
