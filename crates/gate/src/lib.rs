//! Scan gate: collapses a noisy decode stream into one event per
//! presentation.
//!
//! A code held in front of the camera decodes many times per second; the
//! gate forwards an observation only when it differs from the last string
//! it forwarded for the current session. The marker is cleared only by an
//! explicit [`ScanGate::reset`] (after a failed lookup, so the same code
//! can be scanned again) or by dropping the gate with its session.

use std::time::{Duration, Instant};

/// Duplicate suppression for one scan session.
#[derive(Debug)]
pub struct ScanGate {
    last_forwarded: Option<String>,
    min_interval: Duration,
    last_forward_at: Option<Instant>,
}

impl ScanGate {
    pub fn new() -> Self {
        Self::with_min_interval(Duration::ZERO)
    }

    /// A gate that additionally spaces *distinct* forwarded codes at least
    /// `min_interval` apart. Zero disables the spacing, leaving pure
    /// last-forwarded dedup.
    pub fn with_min_interval(min_interval: Duration) -> Self {
        Self {
            last_forwarded: None,
            min_interval,
            last_forward_at: None,
        }
    }

    /// Feed one decode tick. `None` means the frame held no code; that is
    /// not an event and leaves the dedup marker untouched.
    ///
    /// Returns the code when it should be forwarded downstream.
    pub fn observe(&mut self, observed: Option<&str>) -> Option<String> {
        let code = observed?;
        self.forward_if_new(code)
    }

    /// Feed one manual-entry submission. Same rule, keyed off the
    /// submitted text; empty submissions are not events.
    pub fn submit(&mut self, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        self.forward_if_new(text)
    }

    /// Clear the dedup marker so the same code may be forwarded again.
    pub fn reset(&mut self) {
        tracing::trace!(last = ?self.last_forwarded, "scan gate reset");
        self.last_forwarded = None;
    }

    pub fn last_forwarded(&self) -> Option<&str> {
        self.last_forwarded.as_deref()
    }

    fn forward_if_new(&mut self, code: &str) -> Option<String> {
        if self.last_forwarded.as_deref() == Some(code) {
            return None;
        }

        if !self.min_interval.is_zero() {
            if let Some(at) = self.last_forward_at {
                if at.elapsed() < self.min_interval {
                    tracing::trace!(code, "scan gate debounced");
                    return None;
                }
            }
        }

        self.last_forwarded = Some(code.to_string());
        self.last_forward_at = Some(Instant::now());
        tracing::trace!(code, "scan gate forwarded");
        Some(code.to_string())
    }
}

impl Default for ScanGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_code_forwards_exactly_once() {
        let mut gate = ScanGate::new();

        let forwarded: Vec<_> = std::iter::repeat("BK-001")
            .take(50)
            .filter_map(|c| gate.observe(Some(c)))
            .collect();

        assert_eq!(forwarded, vec!["BK-001".to_string()]);
    }

    #[test]
    fn test_distinct_code_passes() {
        let mut gate = ScanGate::new();

        assert_eq!(gate.observe(Some("BK-001")), Some("BK-001".into()));
        assert_eq!(gate.observe(Some("BK-002")), Some("BK-002".into()));
        assert_eq!(gate.observe(Some("BK-002")), None);
    }

    #[test]
    fn test_no_code_ticks_do_not_touch_dedup_state() {
        let mut gate = ScanGate::new();

        assert_eq!(gate.observe(Some("BK-001")), Some("BK-001".into()));
        for _ in 0..10 {
            assert_eq!(gate.observe(None), None);
        }
        // The code never left the frame as far as the gate is concerned.
        assert_eq!(gate.observe(Some("BK-001")), None);
    }

    #[test]
    fn test_reset_allows_rescan_of_same_code() {
        let mut gate = ScanGate::new();

        assert!(gate.observe(Some("BK-001")).is_some());
        assert!(gate.observe(Some("BK-001")).is_none());

        gate.reset();
        assert_eq!(gate.observe(Some("BK-001")), Some("BK-001".into()));
    }

    #[test]
    fn test_manual_submission_uses_same_rule() {
        let mut gate = ScanGate::new();

        assert_eq!(gate.submit("BK-003"), Some("BK-003".into()));
        assert_eq!(gate.submit("BK-003"), None);
        assert_eq!(gate.submit(""), None);
    }

    #[test]
    fn test_min_interval_spaces_distinct_codes() {
        let mut gate = ScanGate::with_min_interval(Duration::from_secs(60));

        assert!(gate.observe(Some("BK-001")).is_some());
        // A different code immediately after is debounced away.
        assert_eq!(gate.observe(Some("BK-002")), None);
    }

    #[test]
    fn test_default_has_no_spacing() {
        let mut gate = ScanGate::default();

        assert!(gate.observe(Some("BK-001")).is_some());
        assert!(gate.observe(Some("BK-002")).is_some());
    }
}
