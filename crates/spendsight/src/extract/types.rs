//! Wire types returned by the expense-analysis service.
//!
//! The service answers with zero or more analyzed documents, each made of
//! typed summary fields plus grouped line items whose fields carry the
//! same type/value shape.

use serde::{Deserialize, Serialize};

/// Summary field type carrying the receipt total.
pub const FIELD_TOTAL: &str = "TOTAL";
/// Summary field type carrying the receipt date.
pub const FIELD_DATE: &str = "INVOICE_RECEIPT_DATE";
/// Summary field type carrying the vendor name.
pub const FIELD_VENDOR: &str = "VENDOR_NAME";
/// Line-item field type carrying the item name.
pub const FIELD_ITEM: &str = "ITEM";
/// Line-item field type carrying the item price.
pub const FIELD_PRICE: &str = "PRICE";
/// Line-item field type carrying the item quantity.
pub const FIELD_QUANTITY: &str = "QUANTITY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseAnalysis {
    #[serde(default)]
    pub documents: Vec<ExpenseDocument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDocument {
    #[serde(default)]
    pub summary_fields: Vec<ExpenseField>,
    #[serde(default)]
    pub line_item_groups: Vec<LineItemGroup>,
}

/// One typed field detected in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseField {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub value: String,
}

impl ExpenseField {
    pub fn new(field_type: &str, value: &str) -> Self {
        Self {
            field_type: field_type.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemGroup {
    #[serde(default)]
    pub line_items: Vec<DetectedLineItem>,
}

/// One detected line item: a bag of typed fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedLineItem {
    #[serde(default)]
    pub fields: Vec<ExpenseField>,
}
