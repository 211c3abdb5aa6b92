use super::BatchError;
use crate::pipeline::cataloging::ImageArtifact;
use crate::pipeline_config::PipelineConfig;

/// Ordered, bounded set of images submitted together for one batch run.
///
/// Tier limits are not applied here: a worklist may hold more items than
/// the caller's tier allows, and the orchestrator refuses it as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Worklist {
    items: Vec<ImageArtifact>,
}

impl Worklist {
    /// Accept `items` as-is, refusing more than `max_batch_items`.
    pub fn new(items: Vec<ImageArtifact>, config: &PipelineConfig) -> Result<Self, BatchError> {
        if items.len() > config.max_batch_items {
            return Err(BatchError::CapacityExceeded {
                limit: config.max_batch_items,
                requested: items.len(),
            });
        }
        Ok(Self { items })
    }

    /// Build the effective worklist from what a user offered.
    ///
    /// Uploaded files and URL-fetched images are each cut to
    /// `max_items_per_source`, files first, and the merged list is cut to
    /// `max_batch_items`.
    pub fn from_offered(
        files: Vec<ImageArtifact>,
        fetched: Vec<ImageArtifact>,
        config: &PipelineConfig,
    ) -> Self {
        let offered = files.len() + fetched.len();
        let items: Vec<ImageArtifact> = files
            .into_iter()
            .take(config.max_items_per_source)
            .chain(fetched.into_iter().take(config.max_items_per_source))
            .take(config.max_batch_items)
            .collect();

        if items.len() < offered {
            tracing::info!(
                offered,
                accepted = items.len(),
                "Worklist truncated to batch limits"
            );
        }
        Self { items }
    }

    pub fn items(&self) -> &[ImageArtifact] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
