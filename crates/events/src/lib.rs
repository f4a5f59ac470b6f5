//! Shared event contracts for the scan/circulation pipeline.
//!
//! This crate defines the formal contracts (DTOs) for events emitted to the
//! embedding console UI. Using shared types prevents runtime deserialization
//! errors from mismatched field names.
//!
//! Also provides the `EventBus` trait the session manager and manual lane
//! emit through; the host's "result callback" and "close callback" props are
//! realized as subscriptions on this bus.

mod bus;

pub use bus::{CapturedEvent, EventBus, EventBusRef, InMemoryEventBus, NullEventBus};

use serde::{Deserialize, Serialize};

/// Current wall-clock time in epoch milliseconds, for event timestamps.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Event emitted when a scan session has acquired the camera and is sampling.
///
/// Producers: session manager
/// Consumers: console UI (scanner overlay)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartedEvent {
    /// Session identifier.
    pub session_id: String,
    /// Selected circulation intent ("borrow", "register", "return", "none").
    pub intent: String,
    /// Timestamp in milliseconds since epoch.
    pub ts_ms: i64,
}

/// Event emitted when camera acquisition fails.
///
/// `kind` distinguishes the three classified hardware causes plus a generic
/// fallback; `message` is the user-facing remediation text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionFailedEvent {
    pub session_id: String,
    /// "busy", "permission", "not_found" or "other".
    pub kind: String,
    pub message: String,
    pub ts_ms: i64,
}

/// Event emitted when the gate accepts a decoded code and a lookup begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeAcceptedEvent {
    /// Absent for manual-entry submissions.
    #[serde(default)]
    pub session_id: Option<String>,
    pub code: String,
    pub ts_ms: i64,
}

/// Event emitted when a scan attempt has been resolved to a dispatch outcome.
///
/// Producers: session manager, manual lane
/// Consumers: console UI (result surfaces: borrow form, detail view,
/// not-found recovery dialog)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResolvedEvent {
    #[serde(default)]
    pub session_id: Option<String>,
    pub code: String,
    /// "proceed", "rejected" or "not_found_recovery".
    pub decision: String,
    /// Full serialized `DispatchOutcome` for the UI to render.
    pub outcome: serde_json::Value,
    pub ts_ms: i64,
}

/// Event emitted after the return mutation committed on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnCommittedEvent {
    #[serde(default)]
    pub session_id: Option<String>,
    pub code: String,
    pub penalty_amount: f64,
    pub days_late: u32,
    pub ts_ms: i64,
}

/// Event emitted when a committed return carries a late fee.
///
/// Consumers open the payment flow with this amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDueEvent {
    #[serde(default)]
    pub session_id: Option<String>,
    pub code: String,
    pub amount: f64,
    pub days_late: u32,
    pub ts_ms: i64,
}

/// Event emitted when the return mutation failed on the backend.
///
/// `message` is the server's text verbatim when it supplied one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnFailedEvent {
    #[serde(default)]
    pub session_id: Option<String>,
    pub code: String,
    pub message: String,
    pub ts_ms: i64,
}

/// Event emitted when a lookup failed in transit and scanning will resume
/// after a short delay instead of closing the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRetryEvent {
    #[serde(default)]
    pub session_id: Option<String>,
    pub code: String,
    pub error: String,
    pub retry_delay_ms: u64,
    pub ts_ms: i64,
}

/// Event emitted exactly once when a session reaches its terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClosedEvent {
    pub session_id: String,
    /// "resolved", "cancelled", "decoder_stopped" or "acquisition_failed".
    pub reason: String,
    pub ts_ms: i64,
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// Camera acquired, sampling started.
    pub const SESSION_STARTED: &str = "scan:session_started";
    /// Camera acquisition failed with a classified cause.
    pub const ACQUISITION_FAILED: &str = "scan:acquisition_failed";
    /// Gate accepted a code, lookup in flight.
    pub const CODE_ACCEPTED: &str = "scan:code_accepted";
    /// Dispatch outcome produced.
    pub const SCAN_RESOLVED: &str = "scan:resolved";
    /// Lookup transport failure, retrying after a delay.
    pub const LOOKUP_RETRY: &str = "scan:lookup_retry";
    /// Session reached its terminal state.
    pub const SESSION_CLOSED: &str = "scan:session_closed";
    /// Return mutation committed.
    pub const RETURN_COMMITTED: &str = "circulation:return_committed";
    /// Committed return carries a late fee.
    pub const PAYMENT_DUE: &str = "circulation:payment_due";
    /// Return mutation failed.
    pub const RETURN_FAILED: &str = "circulation:return_failed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_accepted_deserialize_without_session() {
        let json = r#"{"code": "BK-001", "ts_ms": 12345}"#;
        let event: CodeAcceptedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.session_id, None);
        assert_eq!(event.code, "BK-001");
    }

    #[test]
    fn test_scan_resolved_roundtrip() {
        let event = ScanResolvedEvent {
            session_id: Some("s-1".into()),
            code: "BK-002".into(),
            decision: "rejected".into(),
            outcome: serde_json::json!({"rejected": "already_borrowed"}),
            ts_ms: now_ms(),
        };
        let back: ScanResolvedEvent =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(back.decision, "rejected");
        assert_eq!(back.code, "BK-002");
    }
}
