//! Metata: AI-assisted library cataloging.
//!
//! A two-stage vision pipeline (scout classifier, then librarian extractor)
//! turns photographed library items into catalog-tag metadata, and
//! [`marc`] encodes that metadata as MARC 21 binary records.

pub mod config;
pub mod logging;
pub mod marc;
pub mod pipeline;
pub mod pipeline_config;

pub use marc::{encode, encode_record, EncodeError};
pub use pipeline::batch::{
    BatchError, BatchEvent, BatchReport, BatchRequest, CatalogingPipeline, ItemOutcome,
    ItemReport, ItemStatus, Tier, Worklist,
};
pub use pipeline::cataloging::{ImageArtifact, MetadataMapping};
pub use pipeline::inference::{GeminiClient, InferenceClient, OllamaClient};
pub use pipeline::templates::{SqliteTemplateStore, TemplateError, TemplateStore};
pub use pipeline_config::PipelineConfig;

/// Open the template store at [`config::template_db_path`], seeding the
/// default vocabulary and model table on first use.
pub fn open_default_template_store() -> Result<SqliteTemplateStore, TemplateError> {
    let path = config::template_db_path();
    let store = SqliteTemplateStore::open(&path)?;
    store.seed_defaults()?;
    tracing::info!(path = %path.display(), "Template store ready");
    Ok(store)
}
