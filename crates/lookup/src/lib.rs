//! Catalog lookup and the return mutation.
//!
//! The backend that persists loans and inventory is an external REST
//! service; this crate owns only its client side. The dispatcher consumes
//! [`LookupResult`] values and, for returns, calls through
//! [`CirculationApi`]; both are traits so the whole decision path runs
//! without a network.

mod http;
mod memory;

pub use http::{HttpCatalogClient, HttpCirculationApi};
pub use memory::{MemoryCatalog, RecordingReturns};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Circulation status of a catalog asset.
///
/// Meaningful only when the lookup found the asset. Wire values outside the
/// known set parse as `Unknown` rather than failing the whole lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Available,
    Borrowed,
    NoPhysicalCopy,
    #[serde(other)]
    #[default]
    Unknown,
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Borrowed => "borrowed",
            Self::NoPhysicalCopy => "no_physical_copy",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Immutable result of resolving one scanned code.
///
/// `title` and `detail` are passed through opaquely for the UI; the
/// dispatcher only reads `found`, `code` and `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    pub found: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub status: AssetStatus,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl LookupResult {
    pub fn not_found(code: impl Into<String>) -> Self {
        Self {
            found: false,
            code: code.into(),
            status: AssetStatus::Unknown,
            title: None,
            detail: serde_json::Value::Null,
        }
    }

    pub fn found(code: impl Into<String>, status: AssetStatus) -> Self {
        Self {
            found: true,
            code: code.into(),
            status,
            title: None,
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Late-fee summary returned by a committed return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnReceipt {
    #[serde(default)]
    pub penalty_amount: f64,
    #[serde(default)]
    pub days_late: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The request never produced a usable response (DNS, refused, reset).
    #[error("lookup request failed: {0}")]
    Transport(String),
    #[error("lookup response was malformed: {0}")]
    Malformed(String),
    #[error("lookup service error ({status}): {message}")]
    Service { status: u16, message: String },
}

/// Failure of the return mutation, already reduced to its user-facing text:
/// the server's message verbatim when it supplied one, a generic line
/// naming the code otherwise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReturnError {
    #[error("{0}")]
    Server(String),
    #[error("error returning {0}")]
    Generic(String),
}

#[async_trait::async_trait]
pub trait LookupClient: Send + Sync {
    /// Resolve a scanned code to its catalog record. "Not found" is a
    /// result, not an error.
    async fn lookup(&self, code: &str) -> Result<LookupResult, LookupError>;
}

pub type LookupClientRef = Arc<dyn LookupClient>;

#[async_trait::async_trait]
pub trait CirculationApi: Send + Sync {
    /// Commit the return of `code` on the backend.
    async fn return_asset(&self, code: &str) -> Result<ReturnReceipt, ReturnError>;
}

pub type CirculationApiRef = Arc<dyn CirculationApi>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_wire_status_parses_as_unknown() {
        let result: LookupResult =
            serde_json::from_str(r#"{"found": true, "code": "BK-001", "status": "quarantined"}"#)
                .unwrap();
        assert_eq!(result.status, AssetStatus::Unknown);
    }

    #[test]
    fn test_status_defaults_when_absent() {
        let result: LookupResult =
            serde_json::from_str(r#"{"found": false, "code": "BK-001"}"#).unwrap();
        assert_eq!(result.status, AssetStatus::Unknown);
        assert!(!result.found);
    }

    #[test]
    fn test_return_error_messages() {
        let server = ReturnError::Server("asset BK-9 is on hold".into());
        assert_eq!(server.to_string(), "asset BK-9 is on hold");

        let generic = ReturnError::Generic("BK-9".into());
        assert_eq!(generic.to_string(), "error returning BK-9");
    }
}
