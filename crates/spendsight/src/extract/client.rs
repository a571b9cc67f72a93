//! HTTP client for the external expense-analysis capability.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::receipt::ObjectRef;

use super::error::ExtractError;
use super::types::ExpenseAnalysis;

/// Default request timeout. Document analysis of a photographed receipt
/// can take a while on the service side.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// External document-understanding capability: takes a stored object
/// reference, returns structured summary fields and grouped line items.
#[async_trait]
pub trait ExpenseAnalyzer: Send + Sync {
    async fn analyze(&self, source: &ObjectRef) -> Result<ExpenseAnalysis, ExtractError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    container: &'a str,
    key: &'a str,
}

/// Reqwest-backed analyzer client.
pub struct HttpExpenseAnalyzer {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<SecretString>,
    timeout_secs: u64,
}

impl HttpExpenseAnalyzer {
    pub fn new(base_url: &str, api_key: Option<SecretString>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            api_key,
            timeout_secs,
        }
    }
}

#[async_trait]
impl ExpenseAnalyzer for HttpExpenseAnalyzer {
    async fn analyze(&self, source: &ObjectRef) -> Result<ExpenseAnalysis, ExtractError> {
        let url = format!("{}/v1/analyze-expense", self.base_url);
        let body = AnalyzeRequest {
            container: &source.container,
            key: &source.key,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ExtractError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                ExtractError::Http(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                ExtractError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Service {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ExtractError::ResponseParse(e.to_string()))
    }
}
