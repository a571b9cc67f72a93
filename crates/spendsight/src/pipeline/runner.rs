//! The receipt-processing pipeline.
//!
//! One linear run per newly stored object: verify source → extract →
//! persist → load history → analytics → insight → notify. Extraction
//! and persistence failures abort the run; history, insight, and
//! notification failures degrade with fallbacks recorded on the
//! context, so callers can tell a clean success from a patched one.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, info_span, warn, Instrument};

use crate::analytics;
use crate::db::{receipt_repo, Database};
use crate::extract::{receipt_from_analysis, ExpenseAnalyzer};
use crate::insight::{InsightGenerator, FALLBACK_COMMENTARY};
use crate::notify::Notifier;
use crate::receipt::ObjectRef;
use crate::storage::ObjectStore;

use super::context::{Degradation, PipelineContext};
use super::error::PipelineError;

/// Outcome of one pipeline invocation.
#[derive(Debug)]
pub struct RunResult {
    pub success: bool,
    pub receipt_id: Option<String>,
    pub error: Option<String>,
    /// Stages that substituted fallbacks (empty on a clean run).
    pub degraded: Vec<String>,
}

impl RunResult {
    fn completed(ctx: &PipelineContext) -> Self {
        Self {
            success: true,
            receipt_id: ctx.receipt.as_ref().map(|r| r.receipt_id.clone()),
            error: None,
            degraded: ctx.degraded.iter().map(|d| d.stage.to_string()).collect(),
        }
    }

    fn failure(ctx: &PipelineContext, error: String) -> Self {
        Self {
            success: false,
            receipt_id: ctx.receipt.as_ref().map(|r| r.receipt_id.clone()),
            error: Some(error),
            degraded: ctx.degraded.iter().map(|d| d.stage.to_string()).collect(),
        }
    }
}

pub struct Pipeline {
    analyzer: Arc<dyn ExpenseAnalyzer>,
    objects: Arc<ObjectStore>,
    db: Database,
    insight: InsightGenerator,
    notifier: Notifier,
    window_days: i64,
}

impl Pipeline {
    pub fn new(
        analyzer: Arc<dyn ExpenseAnalyzer>,
        objects: Arc<ObjectStore>,
        db: Database,
        insight: InsightGenerator,
        notifier: Notifier,
        window_days: i64,
    ) -> Self {
        Self {
            analyzer,
            objects,
            db,
            insight,
            notifier,
            window_days,
        }
    }

    /// Runs the full pipeline for a single stored object.
    /// Returns a (RunResult, PipelineContext) pair.
    pub async fn run(&self, source: ObjectRef) -> (RunResult, PipelineContext) {
        let span = info_span!("pipeline", container = %source.container, key = %source.key);
        self.run_inner(source).instrument(span).await
    }

    async fn run_inner(&self, source: ObjectRef) -> (RunResult, PipelineContext) {
        let mut ctx = PipelineContext::new(source);

        info!("Processing receipt from {}", ctx.source.uri());

        // Step 1: Extract (fatal)
        if let Err(e) = self
            .step_extract(&mut ctx)
            .instrument(info_span!("extract"))
            .await
        {
            let msg = e.to_string();
            warn!(error = %msg, "Pipeline aborted during extraction");
            return (RunResult::failure(&ctx, msg), ctx);
        }

        // Step 2: Persist (fatal)
        if let Err(e) = info_span!("persist").in_scope(|| self.step_store(&mut ctx)) {
            let msg = e.to_string();
            warn!(error = %msg, "Pipeline aborted while persisting the receipt");
            return (RunResult::failure(&ctx, msg), ctx);
        }

        // Step 3: Spending history (degrades to empty)
        info_span!("load_history").in_scope(|| self.step_history(&mut ctx));

        // Step 4: Analytics (pure)
        info_span!("analytics").in_scope(|| self.step_analytics(&mut ctx));

        // Step 5: AI commentary (degrades to the fallback text)
        self.step_insight(&mut ctx)
            .instrument(info_span!("insight"))
            .await;

        // Step 6: Notification (best-effort)
        self.step_notify(&mut ctx)
            .instrument(info_span!("notify"))
            .await;

        let result = RunResult::completed(&ctx);
        info!(
            receipt_id = result.receipt_id.as_deref().unwrap_or("unknown"),
            degraded = result.degraded.len(),
            "Receipt processed successfully"
        );
        (result, ctx)
    }

    /// Verifies the trigger object exists and runs extraction.
    async fn step_extract(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if !self.objects.exists(&ctx.source.key) {
            return Err(PipelineError::SourceMissing(ctx.source.uri()));
        }

        let analysis = self.analyzer.analyze(&ctx.source).await?;
        let processing_date = Utc::now().format("%Y-%m-%d").to_string();
        let receipt = receipt_from_analysis(&analysis, &ctx.source, &processing_date);

        info!(
            receipt_id = %receipt.receipt_id,
            vendor = %receipt.vendor,
            total = %receipt.total,
            items = receipt.items.len(),
            "Extracted receipt"
        );
        ctx.receipt = Some(receipt);
        Ok(())
    }

    fn step_store(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let receipt = ctx.receipt.as_ref().expect("extract stage completed");
        let stored = receipt_repo::upsert(&self.db, receipt)?;
        info!(receipt_id = %stored.receipt_id, "Receipt stored");
        ctx.receipt = Some(stored);
        Ok(())
    }

    fn step_history(&self, ctx: &mut PipelineContext) {
        let cutoff = Utc::now() - Duration::days(self.window_days);
        match receipt_repo::stored_since(&self.db, cutoff) {
            Ok(history) => {
                info!(
                    count = history.len(),
                    window_days = self.window_days,
                    "Loaded spending history"
                );
                ctx.history = history;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read spending history, continuing without it");
                ctx.degraded.push(Degradation {
                    stage: "history",
                    reason: e.to_string(),
                });
                ctx.history = Vec::new();
            }
        }
    }

    fn step_analytics(&self, ctx: &mut PipelineContext) {
        let receipt = ctx.receipt.as_ref().expect("extract stage completed");
        let analytics = analytics::compute(receipt, &ctx.history);
        info!(
            history = analytics.history_count,
            comparisons = analytics.item_comparisons.len(),
            "Computed spending analytics"
        );
        ctx.analytics = Some(analytics);
    }

    async fn step_insight(&self, ctx: &mut PipelineContext) {
        let receipt = ctx.receipt.as_ref().expect("extract stage completed");
        let analytics = ctx.analytics.as_ref().expect("analytics stage completed");

        match self.insight.generate(receipt, analytics).await {
            Ok(text) => {
                info!("Generated spending commentary");
                ctx.commentary = Some(text);
            }
            Err(e) => {
                warn!(error = %e, "Commentary generation failed, using fallback");
                ctx.degraded.push(Degradation {
                    stage: "insight",
                    reason: e.to_string(),
                });
                ctx.commentary = Some(FALLBACK_COMMENTARY.to_string());
            }
        }
    }

    async fn step_notify(&self, ctx: &mut PipelineContext) {
        let receipt = ctx.receipt.as_ref().expect("extract stage completed");
        let commentary = ctx.commentary.as_deref();

        match self.notifier.notify(receipt, commentary).await {
            Ok(()) => info!("Notification email dispatched"),
            Err(e) => {
                warn!(error = %e, "Notification failed; receipt processing is unaffected");
                ctx.degraded.push(Degradation {
                    stage: "notify",
                    reason: e.to_string(),
                });
            }
        }
    }
}
