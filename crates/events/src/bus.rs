//! Event bus abstraction for decoupled emission toward the console UI.
//!
//! The scan core never talks to UI plumbing directly; it emits named events
//! through this trait so the pipeline can run under tests, headless demos,
//! or whatever shell embeds it.

use std::sync::{Arc, Mutex};

/// Trait for emitting events to subscribers.
pub trait EventBus: Send + Sync {
    /// Emit an event with a JSON payload.
    ///
    /// `topic` is one of the names in [`crate::event_names`].
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

/// An event captured by [`InMemoryEventBus`].
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// In-memory event bus that records every emission, for tests.
#[derive(Default)]
pub struct InMemoryEventBus {
    captured: Mutex<Vec<CapturedEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events in emission order.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.captured.lock().unwrap().clone()
    }

    /// Payloads captured for one topic, in emission order.
    pub fn payloads_for(&self, topic: &str) -> Vec<serde_json::Value> {
        self.captured
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.topic == topic)
            .map(|e| e.payload.clone())
            .collect()
    }

    /// Number of emissions on one topic.
    pub fn count(&self, topic: &str) -> usize {
        self.captured
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.topic == topic)
            .count()
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.captured.lock().unwrap().clear();
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.captured.lock().unwrap().push(CapturedEvent {
            topic: topic.to_string(),
            payload,
        });
    }
}

/// Event bus that discards everything.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _topic: &str, _payload: serde_json::Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_memory_bus_captures_by_topic() {
        let bus = InMemoryEventBus::new();

        bus.emit("scan:resolved", json!({"code": "A"}));
        bus.emit("scan:session_closed", json!({"reason": "resolved"}));
        bus.emit("scan:resolved", json!({"code": "B"}));

        assert_eq!(bus.count("scan:resolved"), 2);
        assert_eq!(bus.count("scan:session_closed"), 1);
        assert_eq!(bus.count("scan:missing"), 0);
        assert_eq!(bus.payloads_for("scan:resolved")[1]["code"], "B");
    }

    #[test]
    fn test_null_bus_accepts_anything() {
        NullEventBus.emit("scan:resolved", json!({"ignored": true}));
    }
}
