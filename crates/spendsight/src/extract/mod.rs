//! Document extraction.
//!
//! Talks to the external expense-analysis capability and normalizes its
//! structured output into a [`Receipt`](crate::receipt::Receipt).

pub mod client;
pub mod error;
pub mod normalize;
pub mod types;

pub use client::{ExpenseAnalyzer, HttpExpenseAnalyzer};
pub use error::ExtractError;
pub use normalize::receipt_from_analysis;
pub use types::ExpenseAnalysis;
