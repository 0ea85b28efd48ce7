use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{checkpoint_doc, CHECKPOINT_TTL_SECS};
use crate::discogs::retry::{retry_with_backoff, RetryPolicy};
use crate::discogs::types::InventoryListing;
use crate::discogs::DiscogsApi;
use crate::error::{AppError, Result};
use crate::store::{sanitize_cache_key, JsonStore};
use crate::types::{now_secs, InventoryCheckpoint};

#[derive(Debug)]
pub struct FetchedInventory {
    pub listings: Vec<InventoryListing>,
    pub total_items: u32,
}

/// Fetch a seller's complete for-sale inventory, page by page, resuming
/// from a recent checkpoint when one exists.
///
/// Page failures that survive all retries persist a checkpoint (the pages
/// accumulated so far plus progress counters) and surface as
/// [`AppError::InventoryIncomplete`], which the orchestrator treats as a
/// per-seller failure — the next seller still gets scanned, and the next
/// scan of this seller resumes at `last_completed_page + 1` instead of
/// re-downloading everything. Checkpoints older than 24 hours are thrown
/// away; a day-old partial inventory is staler than it is useful.
pub async fn fetch_full_inventory<A: DiscogsApi>(
    api: &Arc<A>,
    store: &JsonStore,
    retry: RetryPolicy,
    username: &str,
) -> Result<FetchedInventory> {
    let doc = checkpoint_doc(&sanitize_cache_key(username));

    let mut items: Vec<InventoryListing> = Vec::new();
    let mut page = 1u32;
    let mut total_pages = 0u32;
    let mut total_items = 0u32;

    if let Ok(Some(cp)) = store.read::<InventoryCheckpoint>(&doc).await {
        let age = now_secs().saturating_sub(cp.saved_at);
        if age <= CHECKPOINT_TTL_SECS {
            info!(
                username,
                resume_page = cp.last_completed_page + 1,
                saved_items = cp.items.len(),
                "Resuming inventory fetch from checkpoint"
            );
            items = cp.items;
            page = cp.last_completed_page + 1;
            total_pages = cp.total_pages;
            total_items = cp.total_items;
        } else {
            info!(username, age_secs = age, "Discarding stale inventory checkpoint");
        }
        // Consumed either way; a fresh one is written if this attempt also fails.
        let _ = store.delete(&doc).await;
    }

    loop {
        let fetched = retry_with_backoff(retry, || api.inventory_page(username, page)).await;

        let fetched = match fetched {
            Ok(p) => p,
            Err(e) => {
                // Only worth checkpointing if at least one page landed.
                if page > 1 {
                    let checkpoint = InventoryCheckpoint {
                        items,
                        last_completed_page: page - 1,
                        total_pages,
                        total_items,
                        saved_at: now_secs(),
                    };
                    if let Err(we) = store.write(&doc, &checkpoint).await {
                        warn!(username, "Failed to save inventory checkpoint: {we}");
                    } else {
                        info!(
                            username,
                            last_completed_page = checkpoint.last_completed_page,
                            "Saved partial inventory checkpoint"
                        );
                    }
                    return Err(AppError::InventoryIncomplete {
                        username: username.to_string(),
                        last_completed_page: page - 1,
                    });
                }
                return Err(e);
            }
        };

        total_pages = fetched.total_pages;
        total_items = fetched.total_items;

        let count = fetched.listings.len();
        items.extend(fetched.listings);

        if count == 0 || page >= total_pages {
            break;
        }
        page += 1;
    }

    store.delete(&doc).await.ok();
    info!(username, listings = items.len(), pages = page, "Inventory fetch complete");

    Ok(FetchedInventory { listings: items, total_items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discogs::testutil::{FakeDiscogs, PageScript};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn setup() -> (tempfile::TempDir, JsonStore, Arc<FakeDiscogs>) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        (dir, store, Arc::new(FakeDiscogs::new()))
    }

    #[tokio::test]
    async fn fetches_all_pages_in_order() {
        let (_dir, store, api) = setup();
        api.script_page(
            "dusty",
            1,
            PageScript::Page(FakeDiscogs::page(1, 2, vec![FakeDiscogs::listing(1, 10, &["LP"])])),
        );
        api.script_page(
            "dusty",
            2,
            PageScript::Page(FakeDiscogs::page(2, 2, vec![FakeDiscogs::listing(2, 20, &["CD"])])),
        );

        let inv = fetch_full_inventory(&api, &store, fast_retry(), "dusty").await.unwrap();
        assert_eq!(inv.listings.len(), 2);
        assert_eq!(inv.listings[0].listing_id, 1);
        assert_eq!(inv.listings[1].listing_id, 2);
    }

    #[tokio::test]
    async fn retry_then_succeed_makes_exactly_two_calls() {
        let (_dir, store, api) = setup();
        api.script_page("dusty", 1, PageScript::RateLimited);
        api.script_page(
            "dusty",
            1,
            PageScript::Page(FakeDiscogs::page(1, 1, vec![FakeDiscogs::listing(1, 10, &["LP"])])),
        );

        let inv = fetch_full_inventory(&api, &store, fast_retry(), "dusty").await.unwrap();
        assert_eq!(inv.listings.len(), 1);
        assert_eq!(api.inventory_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn page_failure_after_progress_saves_checkpoint() {
        let (_dir, store, api) = setup();
        api.script_page(
            "dusty",
            1,
            PageScript::Page(FakeDiscogs::page(1, 3, vec![FakeDiscogs::listing(1, 10, &["LP"])])),
        );
        api.script_page(
            "dusty",
            2,
            PageScript::Page(FakeDiscogs::page(2, 3, vec![FakeDiscogs::listing(2, 20, &["LP"])])),
        );
        api.script_page("dusty", 3, PageScript::ServerError);

        let err = fetch_full_inventory(&api, &store, fast_retry(), "dusty").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InventoryIncomplete { last_completed_page: 2, .. }
        ));

        let cp: InventoryCheckpoint =
            store.read(&checkpoint_doc("dusty")).await.unwrap().unwrap();
        assert_eq!(cp.last_completed_page, 2);
        assert_eq!(cp.total_pages, 3);
        assert_eq!(cp.items.len(), 2);
    }

    #[tokio::test]
    async fn fresh_checkpoint_resumes_at_next_page() {
        let (_dir, store, api) = setup();

        let cp = InventoryCheckpoint {
            items: vec![FakeDiscogs::listing(1, 10, &["LP"]), FakeDiscogs::listing(2, 20, &["LP"])],
            last_completed_page: 2,
            total_pages: 3,
            total_items: 3,
            saved_at: now_secs() - 60,
        };
        store.write(&checkpoint_doc("dusty"), &cp).await.unwrap();

        api.script_page(
            "dusty",
            3,
            PageScript::Page(FakeDiscogs::page(3, 3, vec![FakeDiscogs::listing(3, 30, &["LP"])])),
        );

        let inv = fetch_full_inventory(&api, &store, fast_retry(), "dusty").await.unwrap();
        // Only page 3 was requested; pages 1-2 came from the checkpoint.
        assert_eq!(api.inventory_calls.load(Ordering::SeqCst), 1);
        assert_eq!(inv.listings.len(), 3);

        // Completing the fetch consumed the checkpoint.
        let gone: Option<InventoryCheckpoint> =
            store.read(&checkpoint_doc("dusty")).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn stale_checkpoint_restarts_from_page_one() {
        let (_dir, store, api) = setup();

        let cp = InventoryCheckpoint {
            items: vec![FakeDiscogs::listing(1, 10, &["LP"])],
            last_completed_page: 2,
            total_pages: 3,
            total_items: 3,
            saved_at: now_secs() - 25 * 3_600,
        };
        store.write(&checkpoint_doc("dusty"), &cp).await.unwrap();

        api.script_page(
            "dusty",
            1,
            PageScript::Page(FakeDiscogs::page(1, 1, vec![FakeDiscogs::listing(5, 50, &["LP"])])),
        );

        let inv = fetch_full_inventory(&api, &store, fast_retry(), "dusty").await.unwrap();
        // Checkpoint ignored: saved items dropped, fetch restarted at page 1.
        assert_eq!(inv.listings.len(), 1);
        assert_eq!(inv.listings[0].listing_id, 5);
    }

    #[tokio::test]
    async fn first_page_failure_has_no_checkpoint() {
        let (_dir, store, api) = setup();
        api.script_page("dusty", 1, PageScript::ServerError);

        let err = fetch_full_inventory(&api, &store, fast_retry(), "dusty").await.unwrap_err();
        assert!(matches!(err, AppError::UnexpectedStatus { status: 500, .. }));

        let cp: Option<InventoryCheckpoint> =
            store.read(&checkpoint_doc("dusty")).await.unwrap();
        assert!(cp.is_none());
    }

    #[tokio::test]
    async fn empty_page_terminates_pagination() {
        let (_dir, store, api) = setup();
        // Reported 5 pages but page 2 comes back empty — stop there.
        api.script_page(
            "dusty",
            1,
            PageScript::Page(FakeDiscogs::page(1, 5, vec![FakeDiscogs::listing(1, 10, &["LP"])])),
        );
        api.script_page("dusty", 2, PageScript::Page(FakeDiscogs::page(2, 5, vec![])));

        let inv = fetch_full_inventory(&api, &store, fast_retry(), "dusty").await.unwrap();
        assert_eq!(inv.listings.len(), 1);
        assert_eq!(api.inventory_calls.load(Ordering::SeqCst), 2);
    }
}
