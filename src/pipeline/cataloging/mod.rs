//! Two-stage cataloging: classify (scout) → resolve templates → extract
//! (librarian) → normalize.
//!
//! Each stage is a small struct over the [`InferenceClient`] trait so the
//! orchestrator can drive them one transition at a time.
//!
//! [`InferenceClient`]: crate::pipeline::inference::InferenceClient

pub mod types;
pub mod prompt;
pub mod normalize;
pub mod classify;
pub mod extract;

pub use types::*;
pub use prompt::*;
pub use normalize::*;
pub use classify::Classifier;
pub use extract::Extractor;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::inference::InferenceError;
use crate::pipeline::templates::{TemplateError, TemplateKind};

/// The model-backed stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classification,
    Extraction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification => write!(f, "classification"),
            Self::Extraction => write!(f, "extraction"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CatalogingError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model unavailable during {stage}: {source}")]
    ModelUnavailable {
        stage: Stage,
        #[source]
        source: InferenceError,
    },

    #[error("Malformed {stage} response: {reason}")]
    MalformedResponse { stage: Stage, reason: String },

    #[error("Could not normalize extraction output: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("No {which} template configured for '{key}'")]
    TemplateMissing { which: TemplateKind, key: String },

    #[error("Template store error: {0}")]
    TemplateStore(String),
}

impl From<TemplateError> for CatalogingError {
    fn from(e: TemplateError) -> Self {
        match e {
            TemplateError::Missing { which, key } => Self::TemplateMissing { which, key },
            other => Self::TemplateStore(other.to_string()),
        }
    }
}

/// Serializable classification of an item failure, for batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    ModelUnavailable,
    MalformedResponse,
    Normalization,
    TemplateMissing,
    TemplateStore,
}

impl CatalogingError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Configuration(_) => FailureKind::Configuration,
            Self::ModelUnavailable { .. } => FailureKind::ModelUnavailable,
            Self::MalformedResponse { .. } => FailureKind::MalformedResponse,
            Self::Normalization(_) => FailureKind::Normalization,
            Self::TemplateMissing { .. } => FailureKind::TemplateMissing,
            Self::TemplateStore(_) => FailureKind::TemplateStore,
        }
    }
}
