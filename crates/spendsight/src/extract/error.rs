//! Extraction error types.

use thiserror::Error;

/// Errors from the expense-analysis collaborator.
///
/// All of these are fatal to the pipeline run that hit them; there is
/// no fallback for a failed extraction call.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Cannot reach expense analyzer at {0}")]
    Connection(String),

    #[error("Expense analyzer request failed: {0}")]
    Http(String),

    #[error("Expense analyzer returned status {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Failed to parse expense analyzer response: {0}")]
    ResponseParse(String),
}
