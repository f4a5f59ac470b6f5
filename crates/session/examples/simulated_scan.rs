//! Headless end-to-end pass over the scan pipeline.
//!
//! Runs a borrow scan, a rejected registration and a manual return against
//! the simulated camera host and in-memory backend, logging every event the
//! console UI would receive. Run with:
//!
//! ```sh
//! RUST_LOG=debug cargo run -p circ-session --example simulated_scan
//! ```

use circ_decode::{DecodeTick, ScriptedDecoder};
use circ_dispatch::ScanIntent;
use circ_events::EventBus;
use circ_input::ManualLane;
use circ_lookup::{AssetStatus, LookupResult, MemoryCatalog, RecordingReturns, ReturnReceipt};
use circ_media::{MediaHost, SimulatedHost};
use circ_session::{ScanSessionManager, SessionState};
use std::sync::Arc;

/// Bus that logs every emission the way the console would render it.
struct LogBus;

impl EventBus for LogBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        tracing::info!(topic, %payload, "event");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let host = Arc::new(SimulatedHost::new());
    let decoder = Arc::new(ScriptedDecoder::new());
    let catalog = Arc::new(MemoryCatalog::new());
    let returns = Arc::new(RecordingReturns::new());
    let bus = Arc::new(LogBus);

    catalog.insert(LookupResult::found("BK-001", AssetStatus::Available).with_title("Dune"));
    catalog.insert(
        LookupResult::found("BK-002", AssetStatus::Borrowed).with_title("The Left Hand of Darkness"),
    );
    returns.respond_with(Ok(ReturnReceipt {
        penalty_amount: 12.5,
        days_late: 5,
    }));

    let manager = ScanSessionManager::new(
        Arc::clone(&host) as _,
        Arc::clone(&decoder) as _,
        Arc::clone(&catalog) as _,
        Arc::clone(&returns) as _,
        Arc::clone(&bus) as _,
    );

    // Borrow scan: resolves to a prefilled form and closes the session.
    tracing::info!("--- borrow scan ---");
    let session = manager.open(ScanIntent::Borrow);
    session.wait_for(SessionState::Active).await;
    decoder.push(DecodeTick::Decoded("BK-001".into()));
    session.done().await;

    // Register scan of a known code: rejected, session stays open until we
    // close it ourselves.
    tracing::info!("--- register scan (already registered) ---");
    let session = manager.open(ScanIntent::Register);
    session.wait_for(SessionState::Active).await;
    decoder.push(DecodeTick::Decoded("BK-001".into()));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    session.close();
    session.done().await;

    // Manual return through the wedge-scanner lane; no camera involved.
    tracing::info!("--- manual return ---");
    let lane = ManualLane::new(
        Arc::clone(&catalog) as _,
        Arc::clone(&returns) as _,
        Arc::clone(&bus) as _,
    );
    if let Some(report) = lane.submit(ScanIntent::Return, "BK-002").await {
        tracing::info!(
            decision = report.outcome.decision_label(),
            receipt = ?report.receipt,
            "manual lane resolved"
        );
    }

    tracing::info!(
        live_handles = host.live_handles().len(),
        "demo finished; every camera handle released"
    );
    Ok(())
}
