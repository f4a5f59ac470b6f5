//! Outcome execution: the one backend write this subsystem performs.

use crate::{decide, DispatchOutcome, ProceedAction, ScanIntent};
use circ_lookup::{CirculationApiRef, LookupResult, ReturnReceipt};

/// A resolved scan attempt: the outcome, plus the result of the return
/// mutation when the outcome committed one.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub code: String,
    pub outcome: DispatchOutcome,
    /// Set iff the outcome was `CommitReturn` and the backend accepted it.
    pub receipt: Option<ReturnReceipt>,
    /// Set iff the outcome was `CommitReturn` and the backend refused it;
    /// already reduced to user-facing text.
    pub return_error: Option<String>,
}

/// Evaluates the decision table and performs the return side effect.
pub struct Dispatcher {
    api: CirculationApiRef,
}

impl Dispatcher {
    pub fn new(api: CirculationApiRef) -> Self {
        Self { api }
    }

    /// Resolve one scan attempt.
    ///
    /// Only a `Proceed(CommitReturn)` outcome reaches the backend; every
    /// other row of the table resolves without a write. The mutation is
    /// never retried here.
    pub async fn run(&self, intent: ScanIntent, lookup: &LookupResult) -> DispatchReport {
        let outcome = decide(intent, lookup);
        tracing::debug!(
            code = %lookup.code,
            %intent,
            decision = outcome.decision_label(),
            "scan dispatched"
        );

        let mut receipt = None;
        let mut return_error = None;

        if let DispatchOutcome::Proceed(ProceedAction::CommitReturn { code }) = &outcome {
            match self.api.return_asset(code).await {
                Ok(r) => {
                    tracing::info!(
                        code = %code,
                        penalty_amount = r.penalty_amount,
                        days_late = r.days_late,
                        "return committed"
                    );
                    receipt = Some(r);
                }
                Err(e) => {
                    tracing::warn!(code = %code, error = %e, "return mutation failed");
                    return_error = Some(e.to_string());
                }
            }
        }

        DispatchReport {
            code: lookup.code.clone(),
            outcome,
            receipt,
            return_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circ_lookup::{AssetStatus, RecordingReturns, ReturnError};
    use std::sync::Arc;

    fn dispatcher() -> (Dispatcher, Arc<RecordingReturns>) {
        let api = Arc::new(RecordingReturns::new());
        (Dispatcher::new(Arc::clone(&api) as _), api)
    }

    #[tokio::test]
    async fn test_borrow_stages_form_without_backend_write() {
        let (dispatcher, api) = dispatcher();
        let lookup = LookupResult::found("BK-001", AssetStatus::Available).with_title("Dune");

        let report = dispatcher.run(ScanIntent::Borrow, &lookup).await;

        assert!(matches!(
            report.outcome,
            DispatchOutcome::Proceed(ProceedAction::PrefillBorrowForm { .. })
        ));
        assert!(api.calls().is_empty());
        assert!(report.receipt.is_none());
    }

    #[tokio::test]
    async fn test_return_commits_immediately() {
        let (dispatcher, api) = dispatcher();
        api.respond_with(Ok(ReturnReceipt::default()));
        let lookup = LookupResult::found("BK-002", AssetStatus::Borrowed);

        let report = dispatcher.run(ScanIntent::Return, &lookup).await;

        assert_eq!(api.calls(), vec!["BK-002".to_string()]);
        let receipt = report.receipt.unwrap();
        assert_eq!(receipt.penalty_amount, 0.0);
        assert!(report.return_error.is_none());
    }

    #[tokio::test]
    async fn test_return_failure_surfaces_server_message_verbatim() {
        let (dispatcher, api) = dispatcher();
        api.respond_with(Err(ReturnError::Server("asset BK-3 is on hold".into())));
        let lookup = LookupResult::found("BK-3", AssetStatus::Borrowed);

        let report = dispatcher.run(ScanIntent::Return, &lookup).await;

        assert_eq!(report.return_error.as_deref(), Some("asset BK-3 is on hold"));
        assert!(report.receipt.is_none());
    }

    #[tokio::test]
    async fn test_rejections_never_write() {
        let (dispatcher, api) = dispatcher();

        for lookup in [
            LookupResult::found("BK-4", AssetStatus::Borrowed),
            LookupResult::found("BK-4", AssetStatus::Unknown),
        ] {
            let report = dispatcher.run(ScanIntent::Borrow, &lookup).await;
            assert!(matches!(report.outcome, DispatchOutcome::Rejected(_)));
        }

        let report = dispatcher
            .run(ScanIntent::Return, &LookupResult::found("BK-4", AssetStatus::Available))
            .await;
        assert!(matches!(report.outcome, DispatchOutcome::Rejected(_)));

        let report = dispatcher
            .run(ScanIntent::Register, &LookupResult::found("BK-4", AssetStatus::Available))
            .await;
        assert!(matches!(report.outcome, DispatchOutcome::Rejected(_)));

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_recovery_never_writes() {
        let (dispatcher, api) = dispatcher();

        let report = dispatcher
            .run(ScanIntent::Return, &LookupResult::not_found("XYZ"))
            .await;

        assert_eq!(
            report.outcome,
            DispatchOutcome::NotFoundRecovery { code: "XYZ".into() }
        );
        assert!(api.calls().is_empty());
    }
}
