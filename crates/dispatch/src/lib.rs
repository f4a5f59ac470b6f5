//! Circulation mode dispatcher.
//!
//! [`decide`] is the whole decision surface of the subsystem: given the
//! session's fixed intent and one lookup result, exactly one outcome
//! applies. It is a pure function over values so the table can be tested
//! exhaustively with no camera and no network; the single backend side
//! effect (committing a return) lives in [`Dispatcher::run`].

mod executor;

pub use executor::{DispatchReport, Dispatcher};

use circ_lookup::{AssetStatus, LookupResult};
use serde::{Deserialize, Serialize};

/// Circulation action selected before scanning begins; fixed for the
/// session's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanIntent {
    Borrow,
    Register,
    Return,
    /// No intent selected: scans open a read-only detail view.
    #[default]
    None,
}

impl std::fmt::Display for ScanIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Borrow => "borrow",
            Self::Register => "register",
            Self::Return => "return",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// The action a `Proceed` outcome stages or performs.
///
/// Borrow stages a form (a student must be chosen before any write);
/// Return commits immediately. That asymmetry is intentional and load-
/// bearing: collapsing the two paths would either add a pointless
/// confirmation to returns or skip the student-selection step of borrows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProceedAction {
    /// Open the borrow form pre-filled with the scanned asset.
    PrefillBorrowForm {
        code: String,
        title: Option<String>,
        detail: serde_json::Value,
    },
    /// Commit the return on the backend, no intermediate form.
    CommitReturn { code: String },
    /// Navigate to the registration form with the code pre-filled.
    OpenRegisterForm { code: String },
    /// No intent: show the asset's detail view.
    ShowDetail {
        code: String,
        title: Option<String>,
        detail: serde_json::Value,
    },
}

/// Why a scan was rejected. Rejections are valid terminal outcomes, not
/// errors, and never touch the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    AlreadyBorrowed,
    NotBorrowed,
    AlreadyRegistered,
    WrongStatus(AssetStatus),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyBorrowed => f.write_str("already borrowed"),
            Self::NotBorrowed => f.write_str("not currently borrowed"),
            Self::AlreadyRegistered => f.write_str("already registered"),
            Self::WrongStatus(status) => write!(f, "status: {status}"),
        }
    }
}

/// The single decision produced for one (intent, lookup) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Proceed(ProceedAction),
    Rejected(RejectReason),
    /// The code is not in the catalog; hand it to the registration flow as
    /// a pre-filled value. Never writes anything.
    NotFoundRecovery { code: String },
}

impl DispatchOutcome {
    pub fn decision_label(&self) -> &'static str {
        match self {
            Self::Proceed(_) => "proceed",
            Self::Rejected(_) => "rejected",
            Self::NotFoundRecovery { .. } => "not_found_recovery",
        }
    }
}

/// Evaluate the dispatch table. Exactly one row applies per
/// (intent, found, status) triple.
pub fn decide(intent: ScanIntent, lookup: &LookupResult) -> DispatchOutcome {
    use DispatchOutcome::{NotFoundRecovery, Proceed, Rejected};

    match intent {
        ScanIntent::Borrow => {
            if !lookup.found {
                return NotFoundRecovery {
                    code: lookup.code.clone(),
                };
            }
            match lookup.status {
                AssetStatus::Available => Proceed(ProceedAction::PrefillBorrowForm {
                    code: lookup.code.clone(),
                    title: lookup.title.clone(),
                    detail: lookup.detail.clone(),
                }),
                AssetStatus::Borrowed => Rejected(RejectReason::AlreadyBorrowed),
                status => Rejected(RejectReason::WrongStatus(status)),
            }
        }
        ScanIntent::Return => {
            if !lookup.found {
                return NotFoundRecovery {
                    code: lookup.code.clone(),
                };
            }
            match lookup.status {
                AssetStatus::Borrowed => Proceed(ProceedAction::CommitReturn {
                    code: lookup.code.clone(),
                }),
                AssetStatus::Available => Rejected(RejectReason::NotBorrowed),
                status => Rejected(RejectReason::WrongStatus(status)),
            }
        }
        ScanIntent::Register => {
            if lookup.found {
                Rejected(RejectReason::AlreadyRegistered)
            } else {
                Proceed(ProceedAction::OpenRegisterForm {
                    code: lookup.code.clone(),
                })
            }
        }
        ScanIntent::None => {
            if lookup.found {
                Proceed(ProceedAction::ShowDetail {
                    code: lookup.code.clone(),
                    title: lookup.title.clone(),
                    detail: lookup.detail.clone(),
                })
            } else {
                NotFoundRecovery {
                    code: lookup.code.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(status: AssetStatus) -> LookupResult {
        LookupResult::found("BK-001", status)
    }

    fn missing() -> LookupResult {
        LookupResult::not_found("BK-001")
    }

    /// Every row of the dispatch table, verified in one sweep.
    #[test]
    fn test_dispatch_table_is_exhaustive() {
        use AssetStatus::*;
        use ScanIntent::*;

        let statuses = [Available, Borrowed, NoPhysicalCopy, Unknown];
        let intents = [Borrow, Register, Return, None];

        for intent in intents {
            // found = false row
            let outcome = decide(intent, &missing());
            match intent {
                Register => assert_eq!(
                    outcome,
                    DispatchOutcome::Proceed(ProceedAction::OpenRegisterForm {
                        code: "BK-001".into()
                    }),
                    "{intent}: not-found row"
                ),
                _ => assert_eq!(
                    outcome,
                    DispatchOutcome::NotFoundRecovery {
                        code: "BK-001".into()
                    },
                    "{intent}: not-found row"
                ),
            }

            // found = true rows
            for status in statuses {
                let outcome = decide(intent, &found(status));
                let expected = match (intent, status) {
                    (Borrow, Available) => DispatchOutcome::Proceed(
                        ProceedAction::PrefillBorrowForm {
                            code: "BK-001".into(),
                            title: Option::None,
                            detail: serde_json::Value::Null,
                        },
                    ),
                    (Borrow, Borrowed) => {
                        DispatchOutcome::Rejected(RejectReason::AlreadyBorrowed)
                    }
                    (Borrow, s) => DispatchOutcome::Rejected(RejectReason::WrongStatus(s)),
                    (Return, Borrowed) => DispatchOutcome::Proceed(ProceedAction::CommitReturn {
                        code: "BK-001".into(),
                    }),
                    (Return, Available) => DispatchOutcome::Rejected(RejectReason::NotBorrowed),
                    (Return, s) => DispatchOutcome::Rejected(RejectReason::WrongStatus(s)),
                    (Register, _) => DispatchOutcome::Rejected(RejectReason::AlreadyRegistered),
                    (None, _) => DispatchOutcome::Proceed(ProceedAction::ShowDetail {
                        code: "BK-001".into(),
                        title: Option::None,
                        detail: serde_json::Value::Null,
                    }),
                };
                assert_eq!(outcome, expected, "{intent} x {status}");
            }
        }
    }

    #[test]
    fn test_borrow_available_carries_descriptive_fields() {
        let lookup = LookupResult::found("BK-001", AssetStatus::Available).with_title("Dune");
        match decide(ScanIntent::Borrow, &lookup) {
            DispatchOutcome::Proceed(ProceedAction::PrefillBorrowForm { code, title, .. }) => {
                assert_eq!(code, "BK-001");
                assert_eq!(title.as_deref(), Some("Dune"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_reject_reasons_read_like_the_console_copy() {
        assert_eq!(RejectReason::AlreadyBorrowed.to_string(), "already borrowed");
        assert_eq!(
            RejectReason::NotBorrowed.to_string(),
            "not currently borrowed"
        );
        assert_eq!(
            RejectReason::AlreadyRegistered.to_string(),
            "already registered"
        );
        assert_eq!(
            RejectReason::WrongStatus(AssetStatus::NoPhysicalCopy).to_string(),
            "status: no_physical_copy"
        );
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let outcome = decide(ScanIntent::None, &missing());
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["not_found_recovery"]["code"], "BK-001");
    }
}
