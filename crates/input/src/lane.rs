//! The manual scan lane: gate → lookup → dispatch, no camera.

use crate::{EntryBuffer, Key};
use circ_dispatch::{DispatchOutcome, DispatchReport, Dispatcher, ScanIntent};
use circ_events::{
    event_names, now_ms, CodeAcceptedEvent, EventBusRef, PaymentDueEvent, ReturnCommittedEvent,
    ReturnFailedEvent, ScanResolvedEvent,
};
use circ_gate::ScanGate;
use circ_lookup::{CirculationApiRef, LookupClientRef, LookupResult};
use serde::Serialize;
use std::sync::Mutex;

/// Accepts wedge-scanner submissions and resolves them through the same
/// dispatch contract as camera scans.
///
/// Safe to use while a camera session is open; the two paths share no
/// state. At most one lookup is in flight on this lane at a time.
pub struct ManualLane {
    buffer: Mutex<EntryBuffer>,
    gate: Mutex<ScanGate>,
    lookup: LookupClientRef,
    dispatcher: Dispatcher,
    bus: EventBusRef,
    in_flight: tokio::sync::Mutex<()>,
}

impl ManualLane {
    pub fn new(lookup: LookupClientRef, api: CirculationApiRef, bus: EventBusRef) -> Self {
        Self {
            buffer: Mutex::new(EntryBuffer::new()),
            gate: Mutex::new(ScanGate::new()),
            lookup,
            dispatcher: Dispatcher::new(api),
            bus,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Feed one keystroke from the focused entry field. Resolves a scan
    /// when the key completes a submission; plain typing returns `None`.
    pub async fn feed_key(&self, intent: ScanIntent, key: Key) -> Option<DispatchReport> {
        let submitted = self.buffer.lock().unwrap().on_key(key)?;
        self.submit(intent, &submitted).await
    }

    /// Resolve one submitted code. Returns `None` when the gate suppressed
    /// it (a double-triggered scanner sends the same line twice).
    pub async fn submit(&self, intent: ScanIntent, text: &str) -> Option<DispatchReport> {
        let code = self.gate.lock().unwrap().submit(text)?;
        let _one_at_a_time = self.in_flight.lock().await;

        self.emit(
            event_names::CODE_ACCEPTED,
            &CodeAcceptedEvent {
                session_id: None,
                code: code.clone(),
                ts_ms: now_ms(),
            },
        );

        let result = match self.lookup.lookup(&code).await {
            Ok(result) => result,
            Err(err) => {
                // No camera to pause or resume here; a failed lookup reads
                // as not-found and frees the gate for a resubmission.
                tracing::warn!(code, error = %err, "manual lookup failed in transit");
                self.gate.lock().unwrap().reset();
                LookupResult::not_found(&code)
            }
        };

        let report = self.dispatcher.run(intent, &result).await;
        self.emit_report(&report);

        // Recoverable outcomes free the gate so the user can try again;
        // a proceed ends this entry the way it would end a camera session.
        if !matches!(report.outcome, DispatchOutcome::Proceed(_)) {
            self.gate.lock().unwrap().reset();
        }

        Some(report)
    }

    fn emit<T: Serialize>(&self, topic: &str, event: &T) {
        let payload = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        self.bus.emit(topic, payload);
    }

    fn emit_report(&self, report: &DispatchReport) {
        let outcome = serde_json::to_value(&report.outcome).unwrap_or(serde_json::Value::Null);
        self.emit(
            event_names::SCAN_RESOLVED,
            &ScanResolvedEvent {
                session_id: None,
                code: report.code.clone(),
                decision: report.outcome.decision_label().to_string(),
                outcome,
                ts_ms: now_ms(),
            },
        );

        if let Some(receipt) = &report.receipt {
            self.emit(
                event_names::RETURN_COMMITTED,
                &ReturnCommittedEvent {
                    session_id: None,
                    code: report.code.clone(),
                    penalty_amount: receipt.penalty_amount,
                    days_late: receipt.days_late,
                    ts_ms: now_ms(),
                },
            );
            if receipt.penalty_amount > 0.0 {
                self.emit(
                    event_names::PAYMENT_DUE,
                    &PaymentDueEvent {
                        session_id: None,
                        code: report.code.clone(),
                        amount: receipt.penalty_amount,
                        days_late: receipt.days_late,
                        ts_ms: now_ms(),
                    },
                );
            }
        }

        if let Some(message) = &report.return_error {
            self.emit(
                event_names::RETURN_FAILED,
                &ReturnFailedEvent {
                    session_id: None,
                    code: report.code.clone(),
                    message: message.clone(),
                    ts_ms: now_ms(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circ_events::InMemoryEventBus;
    use circ_lookup::{AssetStatus, LookupError, MemoryCatalog, RecordingReturns, ReturnReceipt};
    use std::sync::Arc;

    struct Rig {
        catalog: Arc<MemoryCatalog>,
        returns: Arc<RecordingReturns>,
        bus: Arc<InMemoryEventBus>,
        lane: ManualLane,
    }

    fn rig() -> Rig {
        let catalog = Arc::new(MemoryCatalog::new());
        let returns = Arc::new(RecordingReturns::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let lane = ManualLane::new(
            Arc::clone(&catalog) as _,
            Arc::clone(&returns) as _,
            Arc::clone(&bus) as _,
        );
        Rig {
            catalog,
            returns,
            bus,
            lane,
        }
    }

    async fn type_and_enter(lane: &ManualLane, intent: ScanIntent, text: &str) -> Option<DispatchReport> {
        for c in text.chars() {
            assert!(lane.feed_key(intent, Key::Char(c)).await.is_none());
        }
        lane.feed_key(intent, Key::Enter).await
    }

    #[tokio::test]
    async fn test_keystrokes_resolve_on_enter_only() {
        let r = rig();
        r.catalog
            .insert(LookupResult::found("BK-001", AssetStatus::Available));

        let report = type_and_enter(&r.lane, ScanIntent::Borrow, "BK-001")
            .await
            .unwrap();

        assert!(matches!(report.outcome, DispatchOutcome::Proceed(_)));
        assert_eq!(r.bus.count(event_names::SCAN_RESOLVED), 1);
        let resolved = &r.bus.payloads_for(event_names::SCAN_RESOLVED)[0];
        assert!(resolved["session_id"].is_null());
    }

    #[tokio::test]
    async fn test_double_triggered_submission_is_suppressed() {
        let r = rig();
        r.catalog
            .insert(LookupResult::found("BK-002", AssetStatus::Available));

        let first = r.lane.submit(ScanIntent::Borrow, "BK-002").await;
        assert!(first.is_some());

        // The scanner double-fires the same line; the gate eats it.
        let second = r.lane.submit(ScanIntent::Borrow, "BK-002").await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_rejection_frees_the_gate_for_a_retry() {
        let r = rig();
        r.catalog
            .insert(LookupResult::found("BK-003", AssetStatus::Available));

        let first = r.lane.submit(ScanIntent::Register, "BK-003").await.unwrap();
        assert!(matches!(first.outcome, DispatchOutcome::Rejected(_)));

        let second = r.lane.submit(ScanIntent::Register, "BK-003").await;
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn test_manual_return_commits_and_reports_fee() {
        let r = rig();
        r.catalog
            .insert(LookupResult::found("BK-004", AssetStatus::Borrowed));
        r.returns.respond_with(Ok(ReturnReceipt {
            penalty_amount: 25.0,
            days_late: 5,
        }));

        let report = type_and_enter(&r.lane, ScanIntent::Return, "BK-004")
            .await
            .unwrap();

        assert!(report.receipt.is_some());
        assert_eq!(r.returns.calls(), vec!["BK-004".to_string()]);
        assert_eq!(
            r.bus.payloads_for(event_names::PAYMENT_DUE)[0]["amount"],
            25.0
        );
    }

    #[tokio::test]
    async fn test_transport_failure_reads_as_not_found_and_frees_gate() {
        let r = rig();
        r.catalog
            .insert(LookupResult::found("BK-005", AssetStatus::Available));
        r.catalog
            .fail_next(LookupError::Transport("connection reset".into()));

        let first = r.lane.submit(ScanIntent::Borrow, "BK-005").await.unwrap();
        assert!(matches!(
            first.outcome,
            DispatchOutcome::NotFoundRecovery { .. }
        ));

        // Same code resubmits cleanly once the backend is reachable again.
        let second = r.lane.submit(ScanIntent::Borrow, "BK-005").await.unwrap();
        assert!(matches!(second.outcome, DispatchOutcome::Proceed(_)));
    }
}
