//! Process-wide tap for stray asynchronous hardware faults.
//!
//! Forcibly releasing camera tracks makes the hardware/decoder layer raise
//! errors *after* the session has already moved on; they arrive outside any
//! call stack the session controls. The tap lets a session install a filter
//! for the lifetime of that session which swallows only faults matching the
//! known forced-teardown signatures. Everything else is logged at error
//! level and kept in a bounded buffer for inspection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// Maximum unmatched faults retained for inspection.
const UNMATCHED_BUFFER_CAP: usize = 64;

/// An asynchronous error raised by the hardware or decoder layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrayFault {
    /// Originating layer, e.g. "camera" or "decoder".
    pub source: String,
    pub message: String,
}

struct InstalledFilter {
    id: u64,
    signatures: Vec<String>,
}

#[derive(Default)]
struct FaultTap {
    filters: Vec<InstalledFilter>,
    unmatched: Vec<StrayFault>,
}

fn tap() -> &'static Mutex<FaultTap> {
    static TAP: OnceLock<Mutex<FaultTap>> = OnceLock::new();
    TAP.get_or_init(|| Mutex::new(FaultTap::default()))
}

fn next_filter_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Removes its filter when dropped, bracketing the filter's lifetime to the
/// session that installed it.
pub struct NoiseFilterGuard {
    id: u64,
}

impl Drop for NoiseFilterGuard {
    fn drop(&mut self) {
        if let Ok(mut tap) = tap().lock() {
            tap.filters.retain(|f| f.id != self.id);
        }
    }
}

/// Install a filter that swallows faults whose message contains any of
/// `signatures`. Match on substrings of the lower layer's known error text
/// only; anything broader would hide real failures.
pub fn install_noise_filter(signatures: Vec<String>) -> NoiseFilterGuard {
    let id = next_filter_id();
    if let Ok(mut tap) = tap().lock() {
        tap.filters.push(InstalledFilter { id, signatures });
    }
    NoiseFilterGuard { id }
}

/// Report a stray fault from the hardware/decoder layer.
///
/// Matched faults are swallowed (debug-logged); unmatched faults propagate
/// to the error log and the inspection buffer.
pub fn report_stray_fault(source: &str, message: &str) {
    let Ok(mut tap) = tap().lock() else {
        return;
    };

    let matched = tap
        .filters
        .iter()
        .any(|f| f.signatures.iter().any(|sig| message.contains(sig.as_str())));

    if matched {
        tracing::debug!(source, message, "suppressed forced-teardown noise");
        return;
    }

    tracing::error!(source, message, "stray hardware fault");
    if tap.unmatched.len() == UNMATCHED_BUFFER_CAP {
        tap.unmatched.remove(0);
    }
    tap.unmatched.push(StrayFault {
        source: source.to_string(),
        message: message.to_string(),
    });
}

/// Take every unmatched fault recorded so far.
pub fn drain_stray_faults() -> Vec<StrayFault> {
    tap().lock().map(|mut t| std::mem::take(&mut t.unmatched)).unwrap_or_default()
}
