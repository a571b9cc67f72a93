//! AI spending commentary.
//!
//! Builds a deterministic prompt from the current receipt and its
//! analytics and asks the external text-generation capability for a
//! short commentary. Generation is enrichment: a failed call degrades to
//! a fixed fallback message at the pipeline level and never blocks
//! processing.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::analytics::SpendingAnalytics;
use crate::receipt::Receipt;

/// Default request timeout for generation calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Commentary used when the text-generation call fails.
pub const FALLBACK_COMMENTARY: &str =
    "Unable to generate spending insights at this time. Your receipt was processed and stored.";

#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("Cannot reach text-generation service at {0}")]
    Connection(String),

    #[error("Text-generation request failed: {0}")]
    Http(String),

    #[error("Text-generation service returned status {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Failed to parse text-generation response: {0}")]
    ResponseParse(String),

    #[error("Text-generation response contained no content")]
    EmptyResponse,
}

/// External text-generation capability: one prompt in, one text out,
/// bounded by a token budget.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, InsightError>;
}

/// Messages-style request body for the generation endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<GenerateMessage<'a>>,
}

#[derive(Serialize)]
struct GenerateMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    content: Vec<GeneratedBlock>,
}

#[derive(Deserialize)]
struct GeneratedBlock {
    text: String,
}

/// Reqwest-backed generation client.
pub struct HttpTextGenerator {
    base_url: String,
    client: reqwest::Client,
    model: String,
    api_key: Option<SecretString>,
    timeout_secs: u64,
}

impl HttpTextGenerator {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<SecretString>,
        timeout_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            model: model.to_string(),
            api_key,
            timeout_secs,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, InsightError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            max_tokens,
            messages: vec![GenerateMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                InsightError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                InsightError::Http(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                InsightError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| InsightError::ResponseParse(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or(InsightError::EmptyResponse)
    }
}

/// Formats the analyst prompt and obtains the commentary.
pub struct InsightGenerator {
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
    window_days: i64,
}

impl InsightGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, max_tokens: u32, window_days: i64) -> Self {
        Self {
            generator,
            max_tokens,
            window_days,
        }
    }

    /// Builds the analyst prompt. Deterministic: identical inputs produce
    /// an identical prompt (vendor stats iterate in key order, items and
    /// comparisons embed in receipt order).
    pub fn build_prompt(&self, receipt: &Receipt, analytics: &SpendingAnalytics) -> String {
        let items_json =
            serde_json::to_string_pretty(&receipt.items).unwrap_or_else(|_| "[]".to_string());
        let comparisons_json = serde_json::to_string_pretty(&analytics.item_comparisons)
            .unwrap_or_else(|_| "[]".to_string());

        format!(
            "You are a personal grocery spending analyst. Analyze this receipt and provide helpful, actionable insights.\n\
             \n\
             Current Receipt:\n\
             - Vendor: {vendor}\n\
             - Total: ${total}\n\
             - Date: {date}\n\
             - Items: {items}\n\
             \n\
             Historical Analytics:\n\
             - Total past receipts (last {window} days): {count}\n\
             - Overall average spend: ${overall:.2}\n\
             - Current vendor average: ${vendor_avg:.2}\n\
             \n\
             Item Price Comparisons:\n\
             {comparisons}\n\
             \n\
             Provide 3-4 bullet points with:\n\
             1. A quick reaction to this purchase (over/under budget, good/bad timing)\n\
             2. Store comparison insights if available\n\
             3. Specific item-level savings opportunities\n\
             4. One actionable tip for next time\n\
             \n\
             Be encouraging but honest. Use emojis sparingly. Keep it concise and friendly.",
            vendor = receipt.vendor,
            total = receipt.total,
            date = receipt.date,
            items = items_json,
            window = self.window_days,
            count = analytics.history_count,
            overall = analytics.overall_average,
            vendor_avg = analytics.current_vendor_average(),
            comparisons = comparisons_json,
        )
    }

    /// Asks the generation capability for a commentary. The caller
    /// substitutes [`FALLBACK_COMMENTARY`] when this fails.
    pub async fn generate(
        &self,
        receipt: &Receipt,
        analytics: &SpendingAnalytics,
    ) -> Result<String, InsightError> {
        let prompt = self.build_prompt(receipt, analytics);
        self.generator.generate(&prompt, self.max_tokens).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics;
    use crate::receipt::{LineItem, ObjectRef};

    /// Test generator returning a fixed response or a fixed failure.
    struct MockGenerator {
        response: Option<String>,
    }

    #[async_trait]
    impl TextGenerator for MockGenerator {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, InsightError> {
            match &self.response {
                Some(text) => Ok(text.clone()),
                None => Err(InsightError::Service {
                    status: 503,
                    body: "overloaded".to_string(),
                }),
            }
        }
    }

    fn sample_receipt() -> Receipt {
        let source = ObjectRef::new("receipts", "receipts/test.jpg");
        let mut receipt = Receipt::unextracted(&source, "2026-08-07".to_string());
        receipt.vendor = "Acme Mart".to_string();
        receipt.total = "12.50".to_string();
        let mut milk = LineItem::new("Milk");
        milk.price = "3.00".to_string();
        receipt.items.push(milk);
        receipt
    }

    fn history() -> Vec<Receipt> {
        let source = ObjectRef::new("receipts", "receipts/old.jpg");
        let mut old = Receipt::unextracted(&source, "2026-08-01".to_string());
        old.vendor = "Best Foods".to_string();
        old.total = "8.00".to_string();
        let mut milk = LineItem::new("Milk");
        milk.price = "2.00".to_string();
        old.items.push(milk);
        vec![old]
    }

    fn generator_with(response: Option<&str>) -> InsightGenerator {
        InsightGenerator::new(
            Arc::new(MockGenerator {
                response: response.map(|s| s.to_string()),
            }),
            500,
            30,
        )
    }

    #[test]
    fn test_prompt_contains_all_required_elements() {
        let receipt = sample_receipt();
        let analytics = analytics::compute(&receipt, &history());
        let prompt = generator_with(Some("ok")).build_prompt(&receipt, &analytics);

        assert!(prompt.contains("Vendor: Acme Mart"));
        assert!(prompt.contains("Total: $12.50"));
        assert!(prompt.contains("Date: 2026-08-07"));
        assert!(prompt.contains("\"Milk\""));
        assert!(prompt.contains("Total past receipts (last 30 days): 1"));
        assert!(prompt.contains("Overall average spend: $8.00"));
        // Acme Mart is unseen in history, so the vendor average is zero.
        assert!(prompt.contains("Current vendor average: $0.00"));
        assert!(prompt.contains("Best Foods"));
        assert!(prompt.contains("actionable tip"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let receipt = sample_receipt();
        let analytics = analytics::compute(&receipt, &history());
        let generator = generator_with(Some("ok"));

        let first = generator.build_prompt(&receipt, &analytics);
        let second = generator.build_prompt(&receipt, &analytics);
        assert_eq!(first, second);
    }

    #[test]
    fn test_prompt_vendor_average_when_vendor_seen() {
        let receipt = sample_receipt();
        let mut seen = history();
        seen[0].vendor = "Acme Mart".to_string();
        seen[0].total = "10.00".to_string();

        let analytics = analytics::compute(&receipt, &seen);
        let prompt = generator_with(Some("ok")).build_prompt(&receipt, &analytics);
        assert!(prompt.contains("Current vendor average: $10.00"));
    }

    #[tokio::test]
    async fn test_generate_returns_commentary() {
        let receipt = sample_receipt();
        let analytics = analytics::compute(&receipt, &[]);
        let generator = generator_with(Some("Nice restraint on the milk budget."));

        let commentary = generator.generate(&receipt, &analytics).await.unwrap();
        assert_eq!(commentary, "Nice restraint on the milk budget.");
    }

    #[tokio::test]
    async fn test_generate_surfaces_failure_for_caller_fallback() {
        let receipt = sample_receipt();
        let analytics = analytics::compute(&receipt, &[]);
        let generator = generator_with(None);

        let result = generator.generate(&receipt, &analytics).await;
        assert!(matches!(result, Err(InsightError::Service { status: 503, .. })));
    }

    #[test]
    fn test_generation_request_wire_form() {
        let request = GenerateRequest {
            model: "spend-analyst-v1",
            max_tokens: 500,
            messages: vec![GenerateMessage {
                role: "user",
                content: "hello",
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "spend-analyst-v1");
        assert_eq!(json["maxTokens"], 500);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
