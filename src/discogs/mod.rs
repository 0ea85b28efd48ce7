pub mod client;
pub mod retry;
pub mod types;

pub use client::DiscogsClient;

use std::future::Future;

use crate::error::Result;
use types::{InventoryPage, ReleaseDetail};

/// Seam over the Discogs marketplace API. The production implementation is
/// [`DiscogsClient`]; tests script a [`testutil::FakeDiscogs`] so the whole
/// scan pipeline runs without a network.
pub trait DiscogsApi: Send + Sync + 'static {
    /// One page of a seller's for-sale inventory.
    fn inventory_page(
        &self,
        username: &str,
        page: u32,
    ) -> impl Future<Output = Result<InventoryPage>> + Send;

    /// Release detail, used only to resolve the master id.
    fn release(&self, release_id: u64) -> impl Future<Output = Result<ReleaseDetail>> + Send;

    /// Direct existence check for a marketplace listing.
    /// `Ok(true)` = listed (200), `Ok(false)` = gone (404).
    fn listing_exists(&self, listing_id: u64) -> impl Future<Output = Result<bool>> + Send;

    /// Whether a Discogs user exists, for seller-add validation.
    fn user_exists(&self, username: &str) -> impl Future<Output = Result<bool>> + Send;
}
