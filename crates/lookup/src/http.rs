//! HTTP clients for the circulation backend.
//!
//! Response interpretation lives in free functions over (status, body) so
//! the mapping rules are testable without a server:
//!
//! - 404, or any body carrying `found: false`, is a not-found *result*;
//! - other error statuses become `LookupError::Service`;
//! - return-mutation errors surface the server's `message` verbatim when
//!   present, the generic "error returning <code>" line otherwise.
//!
//! No request timeout is configured: acquisition and lookup are bounded
//! only by the platform's own behavior, and the user can always cancel.

use crate::{
    CirculationApi, LookupClient, LookupError, LookupResult, ReturnError, ReturnReceipt,
};
use serde::Deserialize;

/// Catalog lookup over REST.
#[derive(Clone)]
pub struct HttpCatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: trim_base(base_url.into()),
        }
    }

    fn asset_url(&self, code: &str) -> String {
        format!("{}/assets/{}", self.base_url, code)
    }
}

#[async_trait::async_trait]
impl LookupClient for HttpCatalogClient {
    async fn lookup(&self, code: &str) -> Result<LookupResult, LookupError> {
        let response = self
            .http
            .get(self.asset_url(code))
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        lookup_from_response(status, &body, code)
    }
}

/// Return mutation over REST.
#[derive(Clone)]
pub struct HttpCirculationApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCirculationApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: trim_base(base_url.into()),
        }
    }

    fn return_url(&self, code: &str) -> String {
        format!("{}/assets/{}/return", self.base_url, code)
    }
}

#[async_trait::async_trait]
impl CirculationApi for HttpCirculationApi {
    async fn return_asset(&self, code: &str) -> Result<ReturnReceipt, ReturnError> {
        let response = match self.http.post(self.return_url(code)).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(code, error = %e, "return mutation never reached the backend");
                return Err(ReturnError::Generic(code.to_string()));
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        receipt_from_response(status, &body, code)
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Interpret a lookup response.
pub fn lookup_from_response(
    status: u16,
    body: &str,
    code: &str,
) -> Result<LookupResult, LookupError> {
    if status == 404 {
        return Ok(LookupResult::not_found(code));
    }

    if (200..300).contains(&status) {
        let mut result: LookupResult = serde_json::from_str(body)
            .map_err(|e| LookupError::Malformed(e.to_string()))?;
        if result.code.is_empty() {
            result.code = code.to_string();
        }
        return Ok(result);
    }

    // An error status may still carry a structured not-found payload; when
    // it does, that payload wins over the status line.
    if let Ok(result) = serde_json::from_str::<LookupResult>(body) {
        if !result.found {
            let mut result = result;
            if result.code.is_empty() {
                result.code = code.to_string();
            }
            return Ok(result);
        }
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| "lookup failed".to_string());
    Err(LookupError::Service { status, message })
}

/// Interpret a return-mutation response.
pub fn receipt_from_response(
    status: u16,
    body: &str,
    code: &str,
) -> Result<ReturnReceipt, ReturnError> {
    if (200..300).contains(&status) {
        return serde_json::from_str(body).map_err(|e| {
            tracing::warn!(code, error = %e, "return receipt was malformed");
            ReturnError::Generic(code.to_string())
        });
    }

    match serde_json::from_str::<ErrorBody>(body).ok().and_then(|b| b.message) {
        Some(message) => Err(ReturnError::Server(message)),
        None => Err(ReturnError::Generic(code.to_string())),
    }
}
