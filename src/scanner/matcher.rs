use std::collections::HashSet;

use tracing::debug;

use crate::discogs::types::InventoryListing;
use crate::types::{now_secs, MatchStatus, SellerMatch, StatusConfidence};

use super::format::is_vinyl;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub new_matches: u32,
    pub refreshed: u32,
    pub marked_sold: u32,
}

/// Cross-reference one seller's complete, resolved inventory against the
/// tracked wantlist masters and fold the result into the match list.
///
/// `resolved` pairs each listing with its master id; listings that failed
/// resolution were already dropped upstream.
///
/// Upserts are keyed by `listing_id.to_string()`, so re-scanning a
/// still-listed item refreshes the existing record instead of duplicating
/// it. Refreshes touch price and condition only — status, notified,
/// confidence, and dateFound survive, and in particular a `sold` match is
/// never flipped back to `active` just because its id reappeared
/// (re-verification owns reactivation).
///
/// Because the inventory here is complete, this seller's active/seen
/// matches whose listings no longer appear are marked `sold` with
/// unverified confidence.
pub fn apply_seller_listings(
    matches: &mut Vec<SellerMatch>,
    seller: &str,
    resolved: &[(InventoryListing, u64)],
    wanted: &HashSet<u64>,
    vinyl_only: bool,
) -> MatchStats {
    let mut stats = MatchStats::default();
    let mut present: HashSet<u64> = HashSet::new();

    for (listing, master_id) in resolved {
        present.insert(listing.listing_id);

        if vinyl_only && !is_vinyl(&listing.formats) {
            continue;
        }
        if !wanted.contains(master_id) {
            continue;
        }

        let id = listing.listing_id.to_string();
        if let Some(existing) = matches.iter_mut().find(|m| m.id == id) {
            existing.price = listing.price;
            existing.currency = listing.currency.clone();
            existing.condition = listing.condition.clone();
            stats.refreshed += 1;
        } else {
            debug!(
                seller,
                listing_id = listing.listing_id,
                master_id,
                "New wantlist match"
            );
            matches.push(SellerMatch {
                id,
                seller_id: seller.to_string(),
                release_id: listing.release_id,
                master_id: *master_id,
                artist: listing.artist.clone(),
                title: listing.title.clone(),
                format: listing.formats.clone(),
                condition: listing.condition.clone(),
                price: listing.price,
                currency: listing.currency.clone(),
                listing_url: listing.uri.clone(),
                listing_id: listing.listing_id,
                date_found: now_secs(),
                notified: false,
                status: MatchStatus::Active,
                status_confidence: None,
            });
            stats.new_matches += 1;
        }
    }

    for m in matches.iter_mut() {
        if m.seller_id == seller
            && matches!(m.status, MatchStatus::Active | MatchStatus::Seen)
            && !present.contains(&m.listing_id)
        {
            m.status = MatchStatus::Sold;
            m.status_confidence = Some(StatusConfidence::Unverified);
            stats.marked_sold += 1;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discogs::testutil::FakeDiscogs;

    fn wanted(ids: &[u64]) -> HashSet<u64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn only_wanted_masters_match() {
        let mut matches = Vec::new();
        let resolved = vec![
            (FakeDiscogs::listing(1, 10, &["LP"]), 99_999u64),
            (FakeDiscogs::listing(2, 20, &["LP"]), 12_345u64),
        ];

        let stats =
            apply_seller_listings(&mut matches, "dusty", &resolved, &wanted(&[12_345]), true);

        assert_eq!(stats.new_matches, 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].master_id, 12_345);
        assert_eq!(matches[0].id, "2");
        assert_eq!(matches[0].status, MatchStatus::Active);
        assert!(!matches[0].notified);
    }

    #[test]
    fn vinyl_only_skips_non_vinyl() {
        let mut matches = Vec::new();
        let resolved = vec![(FakeDiscogs::listing(1, 10, &["CD", "Album"]), 12_345u64)];

        let stats =
            apply_seller_listings(&mut matches, "dusty", &resolved, &wanted(&[12_345]), true);
        assert_eq!(stats.new_matches, 0);
        assert!(matches.is_empty());

        // Same listing matches once the vinyl filter is off.
        let stats =
            apply_seller_listings(&mut matches, "dusty", &resolved, &wanted(&[12_345]), false);
        assert_eq!(stats.new_matches, 1);
    }

    #[test]
    fn rescanning_same_listing_is_idempotent() {
        let mut matches = Vec::new();
        let resolved = vec![(FakeDiscogs::listing(1, 10, &["LP"]), 12_345u64)];
        let want = wanted(&[12_345]);

        let first = apply_seller_listings(&mut matches, "dusty", &resolved, &want, true);
        let second = apply_seller_listings(&mut matches, "dusty", &resolved, &want, true);

        assert_eq!(first.new_matches, 1);
        assert_eq!(second.new_matches, 0);
        assert_eq!(second.refreshed, 1);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn refresh_updates_price_but_preserves_status_and_flags() {
        let mut matches = Vec::new();
        let mut listing = FakeDiscogs::listing(1, 10, &["LP"]);
        let want = wanted(&[12_345]);

        apply_seller_listings(&mut matches, "dusty", &[(listing.clone(), 12_345)], &want, true);
        matches[0].status = MatchStatus::Sold;
        matches[0].notified = true;
        let found_at = matches[0].date_found;

        listing.price = 9.99;
        listing.condition = "Good (G)".to_string();
        apply_seller_listings(&mut matches, "dusty", &[(listing, 12_345)], &want, true);

        assert_eq!(matches[0].price, 9.99);
        assert_eq!(matches[0].condition, "Good (G)");
        // Reappearance does not resurrect a sold match.
        assert_eq!(matches[0].status, MatchStatus::Sold);
        assert!(matches[0].notified);
        assert_eq!(matches[0].date_found, found_at);
    }

    #[test]
    fn disappeared_listing_marked_sold_unverified() {
        let mut matches = Vec::new();
        let want = wanted(&[12_345, 67_890]);
        let resolved = vec![
            (FakeDiscogs::listing(1, 10, &["LP"]), 12_345u64),
            (FakeDiscogs::listing(2, 20, &["LP"]), 67_890u64),
        ];
        apply_seller_listings(&mut matches, "dusty", &resolved, &want, true);

        // Next complete scan only has listing 2.
        let resolved = vec![(FakeDiscogs::listing(2, 20, &["LP"]), 67_890u64)];
        let stats = apply_seller_listings(&mut matches, "dusty", &resolved, &want, true);

        assert_eq!(stats.marked_sold, 1);
        let gone = matches.iter().find(|m| m.id == "1").unwrap();
        assert_eq!(gone.status, MatchStatus::Sold);
        assert_eq!(gone.status_confidence, Some(StatusConfidence::Unverified));
        let still = matches.iter().find(|m| m.id == "2").unwrap();
        assert_eq!(still.status, MatchStatus::Active);
    }

    #[test]
    fn other_sellers_matches_untouched_by_disappearance() {
        let mut matches = Vec::new();
        let want = wanted(&[12_345]);
        apply_seller_listings(
            &mut matches,
            "other_seller",
            &[(FakeDiscogs::listing(7, 70, &["LP"]), 12_345u64)],
            &want,
            true,
        );

        let stats = apply_seller_listings(&mut matches, "dusty", &[], &want, true);
        assert_eq!(stats.marked_sold, 0);
        assert_eq!(matches[0].status, MatchStatus::Active);
    }
}
