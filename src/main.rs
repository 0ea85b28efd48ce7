mod api;
mod config;
mod discogs;
mod error;
mod scanner;
mod scheduler;
mod sellers;
mod store;
mod types;
mod wishlist;

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::discogs::DiscogsClient;
use crate::error::Result;
use crate::scanner::lifecycle::MatchLifecycle;
use crate::scanner::orchestrator::ScanOrchestrator;
use crate::scheduler::ScanScheduler;
use crate::sellers::SellerService;
use crate::store::JsonStore;
use crate::wishlist::Wishlist;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let store = JsonStore::new(&cfg.data_dir);
    info!("Document store rooted at {}", cfg.data_dir);

    let client = Arc::new(DiscogsClient::new(&cfg)?);
    if cfg.discogs_token.is_none() && cfg.discogs_key.is_none() {
        warn!("No Discogs credentials configured — scans will fail until DISCOGS_TOKEN or DISCOGS_KEY/DISCOGS_SECRET is set");
    }

    let sellers = Arc::new(SellerService::new(Arc::clone(&client), store.clone()));
    let lifecycle = Arc::new(MatchLifecycle::new(Arc::clone(&client), store.clone()));
    let orchestrator = ScanOrchestrator::new(
        Arc::clone(&client),
        store.clone(),
        Wishlist::new(store.clone()),
    );
    orchestrator.restore_status().await;

    // Scheduled scans (background, hourly due-check)
    let sched = ScanScheduler::new(Arc::clone(&orchestrator), store.clone());
    tokio::spawn(async move { sched.run().await });

    let state = ApiState {
        sellers,
        lifecycle,
        orchestrator,
        started_at: Instant::now(),
    };
    let app = router(state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
