//! Spending analytics over the receipt history.
//!
//! Pure aggregation: no I/O, no external calls, and infallible by
//! construction. Malformed numeric fields are skipped as individual
//! data points via [`parse_decimal`], never aborting the computation.
//! The result is computed per pipeline run and discarded after the
//! notification goes out.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::receipt::Receipt;
use crate::text::{collapse_whitespace, parse_decimal};

/// Aggregate statistics for one vendor's historical totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorStats {
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// A cheaper-vendor finding for one item on the current receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemComparison {
    pub item: String,
    pub current_price: f64,
    pub cheaper_at: String,
    pub cheaper_price: f64,
    /// Always positive: only strictly cheaper occurrences produce an
    /// entry.
    pub savings: f64,
}

/// Derived view over the current receipt plus its trailing history.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingAnalytics {
    pub current_total: f64,
    /// Whitespace-normalized vendor of the current receipt.
    pub current_vendor: String,
    /// Number of historical receipts considered.
    pub history_count: usize,
    /// Keyed by normalized vendor name. BTreeMap keeps iteration (and
    /// the prompt built from it) deterministic.
    pub vendor_stats: BTreeMap<String, VendorStats>,
    pub item_comparisons: Vec<ItemComparison>,
    /// Mean of historical totals, 0 when there is no history.
    pub overall_average: f64,
}

impl SpendingAnalytics {
    /// Historical average for the current vendor, 0 when unseen.
    pub fn current_vendor_average(&self) -> f64 {
        self.vendor_stats
            .get(&self.current_vendor)
            .map(|s| s.average)
            .unwrap_or(0.0)
    }
}

/// One historical price observation for an item.
struct PricePoint {
    price: f64,
    vendor: String,
}

/// Computes spending analytics for `current` against `history`.
///
/// Vendor names are whitespace-normalized before grouping; item names
/// match case-insensitively. A historical receipt whose total does not
/// parse contributes nothing to totals-based aggregates but still counts
/// toward `history_count`; an item whose price does not parse is skipped
/// as a single price point.
pub fn compute(current: &Receipt, history: &[Receipt]) -> SpendingAnalytics {
    let current_vendor = collapse_whitespace(&current.vendor);
    let current_total = match parse_decimal(&current.total) {
        Some(total) => total,
        None => {
            tracing::warn!(total = %current.total, "Current receipt total is not numeric, treating as 0");
            0.0
        }
    };

    // Group historical totals by normalized vendor and collect per-item
    // price observations keyed by uppercased item name.
    let mut vendor_totals: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut item_prices: BTreeMap<String, Vec<PricePoint>> = BTreeMap::new();
    let mut parsed_totals: Vec<f64> = Vec::new();

    for receipt in history {
        let vendor = collapse_whitespace(&receipt.vendor);

        match parse_decimal(&receipt.total) {
            Some(total) => {
                vendor_totals.entry(vendor.clone()).or_default().push(total);
                parsed_totals.push(total);
            }
            None => {
                tracing::debug!(receipt_id = %receipt.receipt_id, "Skipping non-numeric historical total")
            }
        }

        for item in &receipt.items {
            let Some(price) = parse_decimal(&item.price) else {
                continue;
            };
            item_prices
                .entry(item.name.to_uppercase())
                .or_default()
                .push(PricePoint {
                    price,
                    vendor: vendor.clone(),
                });
        }
    }

    let overall_average = if parsed_totals.is_empty() {
        0.0
    } else {
        parsed_totals.iter().sum::<f64>() / parsed_totals.len() as f64
    };

    let vendor_stats = vendor_totals
        .into_iter()
        .map(|(vendor, totals)| {
            let count = totals.len();
            let sum: f64 = totals.iter().sum();
            let min = totals.iter().copied().fold(f64::INFINITY, f64::min);
            let max = totals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (
                vendor,
                VendorStats {
                    count,
                    average: sum / count as f64,
                    min,
                    max,
                },
            )
        })
        .collect();

    let mut item_comparisons = Vec::new();
    for item in &current.items {
        let Some(current_price) = parse_decimal(&item.price) else {
            continue;
        };
        let Some(observations) = item_prices.get(&item.name.to_uppercase()) else {
            continue;
        };

        // Strictly cheaper and from a different vendor; the first
        // occurrence encountered wins a price tie.
        let cheapest = observations
            .iter()
            .filter(|p| p.price < current_price && p.vendor != current_vendor)
            .fold(None::<&PricePoint>, |best, p| match best {
                Some(b) if b.price <= p.price => Some(b),
                _ => Some(p),
            });

        if let Some(cheapest) = cheapest {
            item_comparisons.push(ItemComparison {
                item: item.name.clone(),
                current_price,
                cheaper_at: cheapest.vendor.clone(),
                cheaper_price: cheapest.price,
                savings: current_price - cheapest.price,
            });
        }
    }

    SpendingAnalytics {
        current_total,
        current_vendor,
        history_count: history.len(),
        vendor_stats,
        item_comparisons,
        overall_average,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::{LineItem, ObjectRef, Receipt};

    fn receipt(vendor: &str, total: &str, items: &[(&str, &str)]) -> Receipt {
        let source = ObjectRef::new("receipts", "receipts/test.jpg");
        let mut r = Receipt::unextracted(&source, "2026-08-07".to_string());
        r.vendor = vendor.to_string();
        r.total = total.to_string();
        r.items = items
            .iter()
            .map(|(name, price)| {
                let mut item = LineItem::new(*name);
                item.price = price.to_string();
                item
            })
            .collect();
        r
    }

    #[test]
    fn test_empty_history() {
        let current = receipt("Acme Mart", "12.50", &[("Milk", "3.00")]);
        let analytics = compute(&current, &[]);

        assert_eq!(analytics.overall_average, 0.0);
        assert!(analytics.vendor_stats.is_empty());
        assert!(analytics.item_comparisons.is_empty());
        assert_eq!(analytics.history_count, 0);
        assert_eq!(analytics.current_total, 12.5);
        assert_eq!(analytics.current_vendor, "Acme Mart");
        assert_eq!(analytics.current_vendor_average(), 0.0);
    }

    #[test]
    fn test_cheaper_vendor_comparison_excludes_same_vendor() {
        let history = vec![
            receipt("Acme Mart", "10.00", &[("MILK", "2.50")]),
            receipt("Best Foods", "8.00", &[("Milk", "2.00")]),
        ];
        let current = receipt("Acme Mart", "12.50", &[("Milk", "3.00")]);

        let analytics = compute(&current, &history);

        assert_eq!(analytics.item_comparisons.len(), 1);
        let comparison = &analytics.item_comparisons[0];
        assert_eq!(comparison.item, "Milk");
        assert_eq!(comparison.current_price, 3.00);
        // The Acme Mart 2.50 price is same-vendor and therefore excluded.
        assert_eq!(comparison.cheaper_at, "Best Foods");
        assert_eq!(comparison.cheaper_price, 2.00);
        assert!((comparison.savings - 1.00).abs() < 1e-9);
    }

    #[test]
    fn test_overall_average_is_mean_of_history_totals() {
        let history = vec![
            receipt("Acme Mart", "10.00", &[]),
            receipt("Best Foods", "8.00", &[]),
        ];
        let current = receipt("Acme Mart", "12.50", &[]);

        let analytics = compute(&current, &history);
        assert!((analytics.overall_average - 9.0).abs() < 1e-9);
        assert_eq!(analytics.history_count, 2);
    }

    #[test]
    fn test_vendor_stats() {
        let history = vec![
            receipt("Acme Mart", "10.00", &[]),
            receipt("Acme  Mart", "20.00", &[]),
            receipt("Best Foods", "8.00", &[]),
        ];
        let current = receipt("Acme\nMart", "12.50", &[]);

        let analytics = compute(&current, &history);

        // "Acme Mart", "Acme  Mart", and "Acme\nMart" normalize to one key.
        let acme = &analytics.vendor_stats["Acme Mart"];
        assert_eq!(acme.count, 2);
        assert!((acme.average - 15.0).abs() < 1e-9);
        assert_eq!(acme.min, 10.0);
        assert_eq!(acme.max, 20.0);

        assert_eq!(analytics.vendor_stats["Best Foods"].count, 1);
        assert!((analytics.current_vendor_average() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_item_names_match_case_insensitively() {
        let history = vec![receipt("Best Foods", "8.00", &[("mIlK", "2.00")])];
        let current = receipt("Acme Mart", "12.50", &[("MILK", "3.00")]);

        let analytics = compute(&current, &history);
        assert_eq!(analytics.item_comparisons.len(), 1);
    }

    #[test]
    fn test_no_comparison_without_strictly_cheaper_price() {
        let history = vec![
            receipt("Best Foods", "8.00", &[("Milk", "3.00")]),
            receipt("Corner Shop", "5.00", &[("Milk", "3.50")]),
        ];
        let current = receipt("Acme Mart", "12.50", &[("Milk", "3.00")]);

        // Equal price is not strictly cheaper.
        let analytics = compute(&current, &history);
        assert!(analytics.item_comparisons.is_empty());
    }

    #[test]
    fn test_globally_cheapest_occurrence_selected() {
        let history = vec![
            receipt("Best Foods", "8.00", &[("Milk", "2.50")]),
            receipt("Corner Shop", "5.00", &[("Milk", "1.75")]),
            receipt("Best Foods", "9.00", &[("Milk", "2.00")]),
        ];
        let current = receipt("Acme Mart", "12.50", &[("Milk", "3.00")]);

        let analytics = compute(&current, &history);
        let comparison = &analytics.item_comparisons[0];
        assert_eq!(comparison.cheaper_at, "Corner Shop");
        assert_eq!(comparison.cheaper_price, 1.75);
        assert!((comparison.savings - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_price_tie_keeps_first_occurrence() {
        let history = vec![
            receipt("Best Foods", "8.00", &[("Milk", "2.00")]),
            receipt("Corner Shop", "5.00", &[("Milk", "2.00")]),
        ];
        let current = receipt("Acme Mart", "12.50", &[("Milk", "3.00")]);

        let analytics = compute(&current, &history);
        assert_eq!(analytics.item_comparisons[0].cheaper_at, "Best Foods");
    }

    #[test]
    fn test_malformed_historical_price_is_skipped() {
        let history = vec![
            receipt("Best Foods", "8.00", &[("Milk", "cheap!")]),
            receipt("Corner Shop", "5.00", &[("Milk", "2.00")]),
        ];
        let current = receipt("Acme Mart", "12.50", &[("Milk", "3.00")]);

        let analytics = compute(&current, &history);
        // The unparseable Best Foods price is excluded; Corner Shop wins.
        assert_eq!(analytics.item_comparisons.len(), 1);
        assert_eq!(analytics.item_comparisons[0].cheaper_at, "Corner Shop");
    }

    #[test]
    fn test_malformed_historical_total_is_skipped() {
        let history = vec![
            receipt("Acme Mart", "garbage", &[]),
            receipt("Best Foods", "8.00", &[]),
        ];
        let current = receipt("Acme Mart", "12.50", &[]);

        let analytics = compute(&current, &history);
        assert!((analytics.overall_average - 8.0).abs() < 1e-9);
        assert!(!analytics.vendor_stats.contains_key("Acme Mart"));
        // The receipt is still counted as part of the window.
        assert_eq!(analytics.history_count, 2);
    }

    #[test]
    fn test_malformed_current_item_price_emits_no_comparison() {
        let history = vec![receipt("Best Foods", "8.00", &[("Milk", "2.00")])];
        let current = receipt("Acme Mart", "12.50", &[("Milk", "free?")]);

        let analytics = compute(&current, &history);
        assert!(analytics.item_comparisons.is_empty());
    }

    #[test]
    fn test_malformed_current_total_degrades_to_zero() {
        let history = vec![receipt("Best Foods", "8.00", &[("Milk", "2.00")])];
        let current = receipt("Acme Mart", "unknown", &[("Milk", "3.00")]);

        let analytics = compute(&current, &history);
        assert_eq!(analytics.current_total, 0.0);
        // The rest of the computation still runs.
        assert_eq!(analytics.item_comparisons.len(), 1);
        assert!((analytics.overall_average - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_savings_always_positive() {
        let history = vec![
            receipt("Best Foods", "8.00", &[("Milk", "2.00"), ("Eggs", "4.00")]),
            receipt("Corner Shop", "5.00", &[("Eggs", "3.10")]),
        ];
        let current = receipt("Acme Mart", "12.50", &[("Milk", "3.00"), ("Eggs", "3.50")]);

        let analytics = compute(&current, &history);
        assert_eq!(analytics.item_comparisons.len(), 2);
        assert!(analytics.item_comparisons.iter().all(|c| c.savings > 0.0));
    }

    #[test]
    fn test_item_unseen_in_history_emits_no_comparison() {
        let history = vec![receipt("Best Foods", "8.00", &[("Milk", "2.00")])];
        let current = receipt("Acme Mart", "12.50", &[("Caviar", "99.00")]);

        let analytics = compute(&current, &history);
        assert!(analytics.item_comparisons.is_empty());
    }
}
