//! Per-invocation pipeline state.

use crate::analytics::SpendingAnalytics;
use crate::receipt::{ObjectRef, Receipt};

/// A stage that substituted a fallback instead of its real result.
#[derive(Debug, Clone)]
pub struct Degradation {
    pub stage: &'static str,
    pub reason: String,
}

pub struct PipelineContext {
    /// Trigger: the newly stored object.
    pub source: ObjectRef,

    /// Extraction result — guaranteed Some after the extract stage
    /// (updated with its stored form after persistence).
    pub receipt: Option<Receipt>,

    /// Trailing-window history (possibly empty, possibly degraded).
    pub history: Vec<Receipt>,

    /// Analytics over receipt + history — Some after the analytics stage.
    pub analytics: Option<SpendingAnalytics>,

    /// AI commentary — Some after the insight stage (the fallback text
    /// when generation degraded).
    pub commentary: Option<String>,

    /// Non-fatal fallbacks taken during the run.
    pub degraded: Vec<Degradation>,
}

impl PipelineContext {
    pub fn new(source: ObjectRef) -> Self {
        Self {
            source,
            receipt: None,
            history: Vec::new(),
            analytics: None,
            commentary: None,
            degraded: Vec::new(),
        }
    }
}
