//! Email notification for processed receipts.
//!
//! Renders the receipt and commentary into an HTML message and hands it
//! to the external mail-sending capability. Delivery is fire-and-forget
//! relative to the pipeline: the caller logs failures and moves on.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::receipt::Receipt;
use crate::text::{collapse_whitespace, truncate_with_ellipsis};

/// Default request timeout for mail dispatch.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum vendor length in the subject line before truncation.
const SUBJECT_VENDOR_MAX: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Cannot reach mail service at {0}")]
    Connection(String),

    #[error("Mail request failed: {0}")]
    Http(String),

    #[error("Mail service returned status {status}: {body}")]
    Service { status: u16, body: String },
}

/// An outbound message for the mail-sending capability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Provider region hint; some mail backends route on it.
    pub region: String,
}

/// External mail-sending capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Reqwest-backed mail client.
pub struct HttpMailer {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<SecretString>,
    timeout_secs: u64,
}

impl HttpMailer {
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
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let url = format!("{}/v1/send", self.base_url);

        let mut request = self.client.post(&url).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                NotifyError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                NotifyError::Http(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                NotifyError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Service {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Renders and dispatches the notification email.
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    sender: String,
    recipient: String,
    region: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, sender: &str, recipient: &str, region: &str) -> Self {
        Self {
            mailer,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            region: region.to_string(),
        }
    }

    /// Subject line: `Receipt Processed: <vendor> - $<total>` with the
    /// vendor whitespace-collapsed and capped at 50 characters.
    pub fn render_subject(receipt: &Receipt) -> String {
        let vendor = truncate_with_ellipsis(&collapse_whitespace(&receipt.vendor), SUBJECT_VENDOR_MAX);
        format!("Receipt Processed: {} - ${}", vendor, receipt.total)
    }

    /// HTML body. The header shows the display vendor; the summary block
    /// keeps the vendor exactly as extracted.
    pub fn render_body(receipt: &Receipt, commentary: Option<&str>) -> String {
        let display_vendor =
            truncate_with_ellipsis(&collapse_whitespace(&receipt.vendor), SUBJECT_VENDOR_MAX);

        let items_html = if receipt.items.is_empty() {
            "<li>No items detected</li>".to_string()
        } else {
            receipt
                .items
                .iter()
                .map(|item| {
                    format!(
                        "<li>{} - ${} x {}</li>",
                        item.name, item.price, item.quantity
                    )
                })
                .collect::<String>()
        };

        let insights_html = match commentary {
            Some(text) => format!(
                r#"
        <div style="background-color: #f0f9ff; border-left: 4px solid #3b82f6; padding: 15px; margin: 20px 0;">
            <h3 style="color: #1e40af; margin-top: 0;">Spending Insights</h3>
            <div style="color: #1e3a8a; line-height: 1.6;">
                {}
            </div>
        </div>
        "#,
                text.replace('\n', "<br>")
            ),
            None => String::new(),
        };

        format!(
            r#"
    <html>
    <head>
        <style>
            body {{ font-family: Arial, sans-serif; color: #333; }}
            .header {{ background-color: #3b82f6; color: white; padding: 20px; border-radius: 8px; }}
            .summary {{ background-color: #f9fafb; padding: 15px; border-radius: 8px; margin: 20px 0; }}
            .amount {{ font-size: 24px; font-weight: bold; color: #059669; }}
        </style>
    </head>
    <body>
        <div class="header">
            <h2 style="margin: 0;">Receipt Processed!</h2>
            <p style="margin: 5px 0 0 0; opacity: 0.9;">{display_vendor} - {date}</p>
        </div>

        {insights_html}

        <div class="summary">
            <p><strong>Total:</strong> <span class="amount">${total}</span></p>
            <p><strong>Vendor:</strong> {vendor}</p>
            <p><strong>Receipt ID:</strong> {receipt_id}</p>
        </div>

        <h3>Items Purchased:</h3>
        <ul>
            {items_html}
        </ul>

        <p style="color: #6b7280; font-size: 12px; margin-top: 30px;">
            Receipt stored securely in your account.
        </p>
    </body>
    </html>
    "#,
            display_vendor = display_vendor,
            date = receipt.date,
            insights_html = insights_html,
            total = receipt.total,
            vendor = receipt.vendor,
            receipt_id = receipt.receipt_id,
            items_html = items_html,
        )
    }

    /// Renders and sends the notification for one receipt.
    pub async fn notify(
        &self,
        receipt: &Receipt,
        commentary: Option<&str>,
    ) -> Result<(), NotifyError> {
        let message = EmailMessage {
            from: self.sender.clone(),
            to: self.recipient.clone(),
            subject: Self::render_subject(receipt),
            html: Self::render_body(receipt, commentary),
            region: self.region.clone(),
        };
        self.mailer.send(&message).await
    }
}
