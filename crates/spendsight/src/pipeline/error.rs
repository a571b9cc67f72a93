//! Pipeline error types.

use thiserror::Error;

/// Fatal pipeline errors. Every other failure mode degrades with a
/// fallback instead of aborting the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source object '{0}' not found in the object store")]
    SourceMissing(String),

    #[error("Extraction failed: {0}")]
    Extract(#[from] crate::extract::ExtractError),

    #[error("Failed to persist receipt: {0}")]
    Store(#[from] crate::db::DatabaseError),
}
