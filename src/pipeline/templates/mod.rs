//! Template store: per-label extraction instructions, per-language
//! formatting instructions, and the tier → model table.
//!
//! The vocabulary (known labels and languages) is data, not code: it is
//! loaded from the store at the start of every batch and checked at call
//! time, so adding a category never requires a rebuild.

pub mod types;
pub mod sqlite;
pub mod memory;
pub mod resolver;

pub use types::*;
pub use sqlite::SqliteTemplateStore;
pub use memory::InMemoryTemplateStore;
pub use resolver::TemplateResolver;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("No {which} template configured for '{key}'")]
    Missing { which: TemplateKind, key: String },

    #[error("Template database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Template database migration v{version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Template store lock poisoned")]
    LockPoisoned,
}

impl TemplateError {
    pub fn missing(which: TemplateKind, key: &str) -> Self {
        Self::Missing {
            which,
            key: key.to_string(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}
