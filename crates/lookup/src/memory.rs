//! In-memory backend doubles for tests and the headless demo.

use crate::{
    CirculationApi, LookupClient, LookupError, LookupResult, ReturnError, ReturnReceipt,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Catalog backed by a map; lookups of unknown codes are not-found results.
#[derive(Default)]
pub struct MemoryCatalog {
    assets: Mutex<HashMap<String, LookupResult>>,
    fail_next: Mutex<VecDeque<LookupError>>,
    delay: Mutex<Duration>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, result: LookupResult) {
        self.assets
            .lock()
            .unwrap()
            .insert(result.code.clone(), result);
    }

    /// Queue a failure for an upcoming lookup; failures are consumed in
    /// order before the map is consulted.
    pub fn fail_next(&self, err: LookupError) {
        self.fail_next.lock().unwrap().push_back(err);
    }

    /// Add latency to every lookup, so in-flight races are reproducible.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[async_trait::async_trait]
impl LookupClient for MemoryCatalog {
    async fn lookup(&self, code: &str) -> Result<LookupResult, LookupError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.fail_next.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(self
            .assets
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .unwrap_or_else(|| LookupResult::not_found(code)))
    }
}

/// Return-mutation double that records every call.
///
/// Responses are served from a script queue; an empty queue answers with a
/// zero-fee receipt.
#[derive(Default)]
pub struct RecordingReturns {
    calls: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Result<ReturnReceipt, ReturnError>>>,
}

impl RecordingReturns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, response: Result<ReturnReceipt, ReturnError>) {
        self.script.lock().unwrap().push_back(response);
    }

    /// Codes passed to `return_asset`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CirculationApi for RecordingReturns {
    async fn return_asset(&self, code: &str) -> Result<ReturnReceipt, ReturnError> {
        self.calls.lock().unwrap().push(code.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ReturnReceipt::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssetStatus;

    #[tokio::test]
    async fn test_memory_catalog_round_trip() {
        let catalog = MemoryCatalog::new();
        catalog.insert(LookupResult::found("BK-001", AssetStatus::Available).with_title("Dune"));

        let hit = catalog.lookup("BK-001").await.unwrap();
        assert!(hit.found);
        assert_eq!(hit.title.as_deref(), Some("Dune"));

        let miss = catalog.lookup("BK-999").await.unwrap();
        assert!(!miss.found);
        assert_eq!(miss.code, "BK-999");
    }

    #[tokio::test]
    async fn test_memory_catalog_scripted_failure() {
        let catalog = MemoryCatalog::new();
        catalog.insert(LookupResult::found("BK-001", AssetStatus::Available));
        catalog.fail_next(LookupError::Transport("connection reset".into()));

        assert!(catalog.lookup("BK-001").await.is_err());
        assert!(catalog.lookup("BK-001").await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_returns_records_and_scripts() {
        let api = RecordingReturns::new();
        api.respond_with(Ok(ReturnReceipt {
            penalty_amount: 50.0,
            days_late: 10,
        }));

        let receipt = api.return_asset("BK-002").await.unwrap();
        assert_eq!(receipt.penalty_amount, 50.0);
        assert_eq!(api.calls(), vec!["BK-002".to_string()]);
    }
}
