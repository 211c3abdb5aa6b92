//! Batch orchestration: worklist limits, tier enforcement, and the per-item
//! state machine.
//!
//! ```text
//! Queued → Classifying → Rejected
//!                      → Resolving → Extracting → Normalizing → Done
//!                      (any stage) → Failed
//! ```
//!
//! Batch-level problems (capacity, missing vocabulary or models) abort before
//! any inference call. Item-level problems only fail that item.

pub mod types;
pub mod worklist;
pub mod state;
pub mod runner;

pub use types::*;
pub use worklist::Worklist;
pub use state::{ItemState, StageContext};
pub use runner::{BatchRequest, CatalogingPipeline};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Batch capacity exceeded: limit is {limit} item(s), {requested} requested")]
    CapacityExceeded { limit: usize, requested: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),
}
