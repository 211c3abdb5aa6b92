//! Per-item state machine.
//!
//! Every transition is a single call to [`ItemState::advance`], so each step
//! can be driven and asserted on its own. Terminal states advance to
//! themselves.

use crate::pipeline::cataloging::{
    try_normalize, CatalogingError, Classifier, DiscoveryVerdict, Extractor, FailureKind, FieldValue,
    ImageArtifact, Normalized,
};
use crate::pipeline::templates::{InstructionPair, TemplateResolver, Vocabulary};

/// Auxiliary key naming the classifier model on a completed mapping.
pub const SCOUT_ENGINE_KEY: &str = "scout_engine";
/// Auxiliary key naming the extraction model on a completed mapping.
pub const EXTRACTION_ENGINE_KEY: &str = "extraction_engine";

/// Everything an item needs to move through the stages; built once per batch.
pub struct StageContext<'a> {
    pub vocabulary: Vocabulary,
    pub classifier: Classifier<'a>,
    pub resolver: TemplateResolver<'a>,
    pub extractor: Extractor<'a>,
    pub scout_model: String,
    pub extraction_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Queued,
    Classifying,
    Resolving(DiscoveryVerdict),
    Extracting(InstructionPair),
    Normalizing(String),
    Done(Normalized),
    Rejected { reason: String },
    Failed { kind: FailureKind, reason: String },
}

impl ItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Rejected { .. } | Self::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Classifying => "classifying",
            Self::Resolving(_) => "resolving",
            Self::Extracting(_) => "extracting",
            Self::Normalizing(_) => "normalizing",
            Self::Done(_) => "done",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }

    /// Perform one transition for `image`.
    pub fn advance(self, ctx: &StageContext<'_>, image: &ImageArtifact) -> ItemState {
        match self {
            Self::Queued => Self::Classifying,

            Self::Classifying => match ctx.classifier.classify(image, &ctx.vocabulary) {
                Ok(verdict) if verdict.is_valid => Self::Resolving(verdict),
                Ok(verdict) => Self::Rejected {
                    reason: rejection_reason(&verdict),
                },
                Err(e) => Self::failed(e),
            },

            Self::Resolving(verdict) => match ctx.resolver.resolve(&verdict) {
                Ok(pair) => Self::Extracting(pair),
                Err(e) => Self::failed(CatalogingError::from(e)),
            },

            Self::Extracting(pair) => {
                match ctx.extractor.extract(image, &pair, &ctx.extraction_model) {
                    Ok(raw) => Self::Normalizing(raw),
                    Err(e) => Self::failed(e),
                }
            }

            Self::Normalizing(raw) => {
                let mut normalized = match try_normalize(&raw) {
                    Ok(normalized) => normalized,
                    Err(e) => return Self::failed(CatalogingError::from(e)),
                };
                // The model itself may answer with an error object.
                if let Some(error) = normalized.mapping.error() {
                    return Self::Failed {
                        kind: FailureKind::Normalization,
                        reason: format!("Model reported an error: {error}"),
                    };
                }
                normalized.mapping.insert(
                    SCOUT_ENGINE_KEY,
                    FieldValue::Text(ctx.scout_model.clone()),
                );
                normalized.mapping.insert(
                    EXTRACTION_ENGINE_KEY,
                    FieldValue::Text(ctx.extraction_model.clone()),
                );
                Self::Done(normalized)
            }

            terminal => terminal,
        }
    }

    fn failed(e: CatalogingError) -> Self {
        Self::Failed {
            kind: e.kind(),
            reason: e.to_string(),
        }
    }
}

fn rejection_reason(verdict: &DiscoveryVerdict) -> String {
    if verdict.label.is_empty() {
        "Invalid library item".to_string()
    } else {
        format!("Invalid library item (classified as '{}')", verdict.label)
    }
}
