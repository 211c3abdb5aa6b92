//! CatalogingPipeline: runs a worklist through the item state machine.
//!
//! Items run sequentially by default. With `max_concurrency > 1` they run in
//! scoped worker threads, one chunk at a time; results are stored by worklist
//! index so the report order never depends on completion order.

use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use super::state::{ItemState, StageContext};
use super::types::*;
use super::worklist::Worklist;
use super::BatchError;
use crate::pipeline::cataloging::{Classifier, Extractor, ImageArtifact};
use crate::pipeline::inference::InferenceClient;
use crate::pipeline::templates::{TemplateResolver, TemplateStore, Vocabulary};
use crate::pipeline_config::PipelineConfig;

/// Callback receiving progress events; shared across worker threads.
pub type ProgressFn<'f> = &'f (dyn Fn(BatchEvent) + Sync);

/// One batch submission. Tier and identity are explicit inputs, never read
/// from ambient state.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub worklist: Worklist,
    pub tier: Tier,
    pub requested_by: Option<String>,
}

impl BatchRequest {
    pub fn new(worklist: Worklist, tier: Tier) -> Self {
        Self {
            worklist,
            tier,
            requested_by: None,
        }
    }

    pub fn requested_by(mut self, identity: &str) -> Self {
        self.requested_by = Some(identity.to_string());
        self
    }
}

/// Orchestrates classification, template resolution, extraction and
/// normalization for whole batches.
pub struct CatalogingPipeline<'a> {
    client: &'a dyn InferenceClient,
    store: &'a dyn TemplateStore,
    config: PipelineConfig,
}

impl<'a> CatalogingPipeline<'a> {
    pub fn new(
        client: &'a dyn InferenceClient,
        store: &'a dyn TemplateStore,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, request: &BatchRequest) -> Result<BatchReport, BatchError> {
        self.run_with_progress(request, None)
    }

    /// Run a batch, reporting progress to `progress_fn`.
    ///
    /// Returns `Err` only for batch-level conditions, always before the first
    /// inference call. Item failures are recorded in the report.
    pub fn run_with_progress(
        &self,
        request: &BatchRequest,
        progress_fn: Option<ProgressFn<'_>>,
    ) -> Result<BatchReport, BatchError> {
        let tier = request.tier;
        let requested = request.worklist.len();
        let limit = tier.item_limit(&self.config);
        if requested > limit {
            tracing::warn!(tier = %tier, limit, requested, "Batch refused: capacity exceeded");
            return Err(BatchError::CapacityExceeded { limit, requested });
        }

        if request.worklist.is_empty() {
            return Ok(BatchReport::empty(tier, request.requested_by.clone()));
        }

        let ctx = self.prepare(tier)?;

        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let span = tracing::info_span!(
            "catalog_batch",
            batch_id = %batch_id,
            tier = %tier,
            items = requested
        );
        let _guard = span.enter();

        tracing::info!(
            backend = self.client.backend_name(),
            scout_model = %ctx.scout_model,
            extraction_model = %ctx.extraction_model,
            "Starting cataloging batch"
        );
        emit(
            progress_fn,
            BatchEvent::Started {
                batch_id,
                item_count: requested,
            },
        );

        let items = self.process_all(&ctx, request.worklist.items(), &span, progress_fn);

        let report = BatchReport {
            batch_id,
            tier,
            requested_by: request.requested_by.clone(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            items,
        };

        tracing::info!(
            done = report.done_count(),
            rejected = report.rejected_count(),
            failed = report.failed_count(),
            duration_ms = report.duration_ms,
            "Cataloging batch complete"
        );
        emit(
            progress_fn,
            BatchEvent::Completed {
                done: report.done_count(),
                rejected: report.rejected_count(),
                failed: report.failed_count(),
                duration_ms: report.duration_ms,
            },
        );

        Ok(report)
    }

    /// Load the vocabulary and both models, once per batch.
    fn prepare(&self, tier: Tier) -> Result<StageContext<'a>, BatchError> {
        let vocabulary = Vocabulary::load(self.store)
            .map_err(|e| BatchError::Configuration(format!("cannot load vocabulary: {e}")))?;
        if vocabulary.is_empty() {
            return Err(BatchError::Configuration(format!(
                "vocabulary is incomplete ({})",
                vocabulary.describe()
            )));
        }

        let scout_model = self.model_for(&self.config.scout_tier_name)?;
        let extraction_model = self.model_for(tier.as_str())?;

        let timeout = self.config.inference_timeout();
        Ok(StageContext {
            vocabulary,
            classifier: Classifier::new(self.client, &scout_model, timeout),
            resolver: TemplateResolver::new(self.store),
            extractor: Extractor::new(self.client, timeout, self.config.extraction_retry),
            scout_model,
            extraction_model,
        })
    }

    fn model_for(&self, tier_name: &str) -> Result<String, BatchError> {
        self.store.get_model_for_tier(tier_name).map_err(|e| {
            BatchError::Configuration(format!("no model configured for '{tier_name}': {e}"))
        })
    }

    fn process_all(
        &self,
        ctx: &StageContext<'_>,
        images: &[ImageArtifact],
        batch_span: &tracing::Span,
        progress_fn: Option<ProgressFn<'_>>,
    ) -> Vec<ItemReport> {
        let concurrency = self.config.effective_concurrency();
        if concurrency <= 1 {
            return images
                .iter()
                .enumerate()
                .map(|(index, image)| process_item(ctx, index, image, batch_span, progress_fn))
                .collect();
        }

        let mut slots: Vec<Option<ItemReport>> = vec![None; images.len()];
        let indexed: Vec<(usize, &ImageArtifact)> = images.iter().enumerate().collect();
        for chunk in indexed.chunks(concurrency) {
            std::thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|&(index, image)| {
                        scope.spawn(move || {
                            process_item(ctx, index, image, batch_span, progress_fn)
                        })
                    })
                    .collect();
                for handle in handles {
                    match handle.join() {
                        Ok(report) => {
                            let index = report.index;
                            slots[index] = Some(report);
                        }
                        Err(panic) => std::panic::resume_unwind(panic),
                    }
                }
            });
        }
        slots.into_iter().flatten().collect()
    }
}

/// Drive one item from `Queued` to a terminal state.
fn process_item(
    ctx: &StageContext<'_>,
    index: usize,
    image: &ImageArtifact,
    batch_span: &tracing::Span,
    progress_fn: Option<ProgressFn<'_>>,
) -> ItemReport {
    let span = tracing::info_span!(parent: batch_span, "catalog_item", index, name = %image.name);
    let _guard = span.enter();
    let start = Instant::now();

    emit(
        progress_fn,
        BatchEvent::ItemStarted {
            index,
            item_name: image.name.clone(),
        },
    );

    let mut state = ItemState::Queued;
    let outcome = loop {
        let from = state.name();
        state = state.advance(ctx, image);
        tracing::debug!(from, to = state.name(), "Item state transition");
        match state {
            ItemState::Done(normalized) => {
                break ItemOutcome::Done {
                    metadata: normalized.mapping,
                    discarded_entries: normalized.discarded_entries,
                }
            }
            ItemState::Rejected { reason } => break ItemOutcome::Rejected { reason },
            ItemState::Failed { kind, reason } => break ItemOutcome::Failed { kind, reason },
            pending => state = pending,
        }
    };

    let elapsed_ms = start.elapsed().as_millis();
    match &outcome {
        ItemOutcome::Done { metadata, .. } => tracing::info!(
            fields = metadata.len(),
            elapsed_ms = %elapsed_ms,
            "Item cataloged"
        ),
        ItemOutcome::Rejected { reason } => tracing::info!(reason = %reason, "Item rejected"),
        ItemOutcome::Failed { kind, reason } => tracing::warn!(
            kind = ?kind,
            error = %reason,
            elapsed_ms = %elapsed_ms,
            "Item failed"
        ),
    }

    let report = ItemReport {
        index,
        item_name: image.name.clone(),
        outcome,
    };
    emit(
        progress_fn,
        BatchEvent::ItemFinished {
            index,
            item_name: report.item_name.clone(),
            status: report.status(),
        },
    );
    report
}

fn emit(progress_fn: Option<ProgressFn<'_>>, event: BatchEvent) {
    if let Some(progress) = progress_fn {
        progress(event);
    }
}
