use std::sync::Arc;

use tracing::info;

use crate::config::{MATCHES_DOC, STALE_MATCH_AGE_SECS};
use crate::discogs::retry::{retry_with_backoff, RetryPolicy};
use crate::discogs::DiscogsApi;
use crate::error::Result;
use crate::store::JsonStore;
use crate::types::{now_secs, MatchStatus, SellerMatch, StatusConfidence};

/// Outcome of re-verifying a single match against the listing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// No match with that id exists; nothing was written.
    UnknownMatch,
    /// The listing was checked and the match updated.
    Verified {
        status: MatchStatus,
        reactivated: bool,
    },
}

/// Status transitions and cleanup for persisted matches. Runs independently
/// of the scan; operations are whole-document read-modify-write and skip
/// the write entirely when nothing changed.
pub struct MatchLifecycle<A> {
    api: Arc<A>,
    store: JsonStore,
    retry: RetryPolicy,
}

impl<A: DiscogsApi> MatchLifecycle<A> {
    pub fn new(api: Arc<A>, store: JsonStore) -> Self {
        Self { api, store, retry: RetryPolicy::default() }
    }

    async fn load(&self) -> Vec<SellerMatch> {
        self.store.read_or_default(MATCHES_DOC).await
    }

    /// Returns true if the match existed and was actually transitioned.
    pub async fn mark_seen(&self, id: &str) -> Result<bool> {
        let mut matches = self.load().await;
        let Some(m) = matches.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };
        if m.status == MatchStatus::Seen {
            return Ok(false);
        }
        m.status = MatchStatus::Seen;
        self.store.write(MATCHES_DOC, &matches).await?;
        Ok(true)
    }

    pub async fn mark_notified(&self, id: &str) -> Result<bool> {
        let mut matches = self.load().await;
        let Some(m) = matches.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };
        if m.notified {
            return Ok(false);
        }
        m.notified = true;
        self.store.write(MATCHES_DOC, &matches).await?;
        Ok(true)
    }

    /// Delete sold matches found more than 30 days ago. Recently sold and
    /// non-sold matches are kept regardless of age. Returns the removed
    /// count; nothing is written when it is zero.
    pub async fn remove_stale(&self) -> Result<u32> {
        let mut matches = self.load().await;
        let cutoff = now_secs().saturating_sub(STALE_MATCH_AGE_SECS);
        let before = matches.len();
        matches.retain(|m| !(m.status == MatchStatus::Sold && m.date_found < cutoff));
        let removed = (before - matches.len()) as u32;
        if removed > 0 {
            self.store.write(MATCHES_DOC, &matches).await?;
            info!(removed, "Removed stale sold matches");
        }
        Ok(removed)
    }

    /// Check the listing endpoint directly and reconcile the match.
    ///
    /// Still listed (200): the match becomes `active`/`verified` — this is
    /// what corrects a false "sold" inferred from an incomplete scan.
    /// Gone (404): current status is confirmed, confidence becomes
    /// `verified`, status itself is untouched. Any other failure
    /// propagates without mutating the match at all.
    pub async fn verify_and_update(&self, id: &str) -> Result<VerifyOutcome> {
        let mut matches = self.load().await;
        let Some(idx) = matches.iter().position(|m| m.id == id) else {
            return Ok(VerifyOutcome::UnknownMatch);
        };

        let listing_id = matches[idx].listing_id;
        let api = Arc::clone(&self.api);
        let exists = retry_with_backoff(self.retry, || api.listing_exists(listing_id)).await?;

        let m = &mut matches[idx];
        let reactivated;
        if exists {
            reactivated = m.status != MatchStatus::Active;
            m.status = MatchStatus::Active;
            m.status_confidence = Some(StatusConfidence::Verified);
        } else {
            reactivated = false;
            m.status_confidence = Some(StatusConfidence::Verified);
        }
        let status = m.status;
        self.store.write(MATCHES_DOC, &matches).await?;

        Ok(VerifyOutcome::Verified { status, reactivated })
    }
}
