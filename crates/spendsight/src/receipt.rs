//! Core domain records: receipts, line items, and object references.

use serde::{Deserialize, Serialize};

/// Pointer to an object in the object store (container + key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub container: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Stable URI form stored on receipts,
    /// e.g. `store://receipts/receipts/20260807-120000-a1b2c3d4.jpg`.
    pub fn uri(&self) -> String {
        format!("store://{}/{}", self.container, self.key)
    }
}

/// One named purchased item within a receipt.
///
/// Invariant: `name` is never empty. Extraction drops detected
/// price/quantity pairs that have no item name, and fills in the
/// documented defaults for missing price (`0.00`) and quantity (`1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    #[serde(default = "default_price")]
    pub price: String,
    #[serde(default = "default_quantity")]
    pub quantity: String,
}

fn default_price() -> String {
    "0.00".to_string()
}

fn default_quantity() -> String {
    "1".to_string()
}

impl LineItem {
    /// A line item with defaulted price and quantity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: default_price(),
            quantity: default_quantity(),
        }
    }
}

/// One normalized extracted purchase document.
///
/// Created once by extraction, persisted once (which stamps `stored_at`),
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub receipt_id: String,
    /// Extracted receipt date, or the processing date when undetected.
    /// Not validated as a calendar date.
    pub date: String,
    pub vendor: String,
    /// Decimal amount as a string, exactly as detected.
    pub total: String,
    pub items: Vec<LineItem>,
    /// URI of the original stored image.
    pub source_location: String,
    /// Set when the receipt is persisted; `None` before that.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<String>,
}

impl Receipt {
    /// A receipt with every field defaulted, pointing at `source`.
    ///
    /// This is the starting point for extraction, and also the final
    /// result when the analyzer returns no structured document.
    pub fn unextracted(source: &ObjectRef, processing_date: String) -> Self {
        Self {
            receipt_id: uuid::Uuid::new_v4().to_string(),
            date: processing_date,
            vendor: "Unknown".to_string(),
            total: "0.00".to_string(),
            items: Vec::new(),
            source_location: source.uri(),
            stored_at: None,
        }
    }
}
