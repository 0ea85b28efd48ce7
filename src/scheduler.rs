use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{debug, info};

use crate::config::SCHEDULER_TICK_SECS;
use crate::discogs::DiscogsApi;
use crate::scanner::orchestrator::ScanOrchestrator;
use crate::sellers::load_settings;
use crate::store::JsonStore;
use crate::types::now_secs;

/// Hourly check that triggers a scan once the last one is older than the
/// configured scan frequency. Piggybacks on the orchestrator's
/// single-flight guard, so a manual scan in progress simply suppresses
/// the scheduled one.
pub struct ScanScheduler<A> {
    orchestrator: Arc<ScanOrchestrator<A>>,
    store: JsonStore,
}

impl<A: DiscogsApi> ScanScheduler<A> {
    pub fn new(orchestrator: Arc<ScanOrchestrator<A>>, store: JsonStore) -> Self {
        Self { orchestrator, store }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(SCHEDULER_TICK_SECS));
        loop {
            ticker.tick().await;
            self.check().await;
        }
    }

    async fn check(&self) {
        let settings = load_settings(&self.store).await;
        let status = self.orchestrator.get_status().await;
        let due_after = u64::from(settings.scan_frequency_days) * 24 * 3_600;

        let due = match status.last_scan_timestamp {
            Some(last) => now_secs().saturating_sub(last) >= due_after,
            // Never scanned: wait for the first manual trigger rather than
            // hammering Discogs the moment the process boots.
            None => false,
        };

        if due {
            info!("Scheduled scan is due, starting");
            self.orchestrator.start_scan().await;
        } else {
            debug!("Scheduled scan not yet due");
        }
    }
}
