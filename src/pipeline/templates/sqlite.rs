use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::types::{TemplateKind, TemplateStore};
use super::TemplateError;

const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS schema_version (
         version INTEGER PRIMARY KEY,
         applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
     );
     CREATE TABLE IF NOT EXISTS item_prompts (
         label TEXT PRIMARY KEY,
         prompt_text TEXT NOT NULL
     );
     CREATE TABLE IF NOT EXISTS language_prompts (
         lang_code TEXT PRIMARY KEY,
         formatting_instruction TEXT NOT NULL
     );
     CREATE TABLE IF NOT EXISTS model_settings (
         tier_name TEXT PRIMARY KEY,
         model_id TEXT NOT NULL
     );
     INSERT INTO schema_version (version) VALUES (1);",
)];

/// Default vocabulary shipped with a fresh database.
const DEFAULT_ITEM_PROMPTS: &[(&str, &str)] = &[
    (
        "modern_book",
        "This image shows a book cover or title page. Extract MARC 21 bibliographic data: \
         020 (a: ISBN), 100 (a: main author, inverted), 245 (a: title, b: remainder of title, \
         c: statement of responsibility), 250 (a: edition), 264 (a: place, b: publisher, \
         c: date), 300 (a: extent). Only record what is visible.",
    ),
    (
        "film_poster",
        "This image shows a film poster. Extract MARC 21 data for a visual material record: \
         245 (a: title, b: tagline, c: director), 257 (a: country of production), \
         264 (b: studio or distributor, c: release year), 508 (a: production credits), \
         511 (a: cast). Only record what is visible.",
    ),
];

const DEFAULT_LANGUAGE_PROMPTS: &[(&str, &str)] = &[
    (
        "en",
        "Transcribe English text exactly as printed and apply RDA capitalization in 245.",
    ),
    (
        "zh",
        "Record Chinese text in the original script. Do not translate. Do not add romanization.",
    ),
    (
        "mi",
        "Preserve te reo Māori macrons (ā, ē, ī, ō, ū) exactly as printed. \
         Do not anglicize names.",
    ),
];

const DEFAULT_MODELS: &[(&str, &str)] = &[
    ("scout", "gemma3:4b"),
    ("free", "gemma3:4b"),
    ("paid", "gemma3:27b"),
];

/// SQLite-backed template store.
///
/// Table layout mirrors the hosted deployment (`item_prompts`,
/// `language_prompts`, `model_settings`) so exported rows load unchanged.
pub struct SqliteTemplateStore {
    conn: Mutex<Connection>,
}

impl SqliteTemplateStore {
    /// Open (or create) a store at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, TemplateError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!(path = %parent.display(), error = %e, "Cannot create template directory");
                }
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, TemplateError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, TemplateError> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, TemplateError> {
        self.conn.lock().map_err(|_| TemplateError::LockPoisoned)
    }

    pub fn upsert_item_template(&self, label: &str, prompt_text: &str) -> Result<(), TemplateError> {
        self.conn()?.execute(
            "INSERT INTO item_prompts (label, prompt_text) VALUES (?1, ?2)
             ON CONFLICT(label) DO UPDATE SET prompt_text = excluded.prompt_text",
            params![label, prompt_text],
        )?;
        Ok(())
    }

    pub fn upsert_language_template(
        &self,
        lang_code: &str,
        formatting_instruction: &str,
    ) -> Result<(), TemplateError> {
        self.conn()?.execute(
            "INSERT INTO language_prompts (lang_code, formatting_instruction) VALUES (?1, ?2)
             ON CONFLICT(lang_code) DO UPDATE SET formatting_instruction = excluded.formatting_instruction",
            params![lang_code, formatting_instruction],
        )?;
        Ok(())
    }

    pub fn upsert_model_setting(&self, tier_name: &str, model_id: &str) -> Result<(), TemplateError> {
        self.conn()?.execute(
            "INSERT INTO model_settings (tier_name, model_id) VALUES (?1, ?2)
             ON CONFLICT(tier_name) DO UPDATE SET model_id = excluded.model_id",
            params![tier_name, model_id],
        )?;
        Ok(())
    }

    /// Insert the default vocabulary and model table, keeping existing rows.
    pub fn seed_defaults(&self) -> Result<(), TemplateError> {
        let conn = self.conn()?;
        for (label, text) in DEFAULT_ITEM_PROMPTS {
            conn.execute(
                "INSERT OR IGNORE INTO item_prompts (label, prompt_text) VALUES (?1, ?2)",
                params![label, text],
            )?;
        }
        for (code, text) in DEFAULT_LANGUAGE_PROMPTS {
            conn.execute(
                "INSERT OR IGNORE INTO language_prompts (lang_code, formatting_instruction) VALUES (?1, ?2)",
                params![code, text],
            )?;
        }
        for (tier, model) in DEFAULT_MODELS {
            conn.execute(
                "INSERT OR IGNORE INTO model_settings (tier_name, model_id) VALUES (?1, ?2)",
                params![tier, model],
            )?;
        }
        tracing::debug!("Template store seeded with defaults");
        Ok(())
    }

    fn lookup(
        &self,
        sql: &str,
        key: &str,
        which: TemplateKind,
    ) -> Result<String, TemplateError> {
        let value: Option<String> = self
            .conn()?
            .query_row(sql, params![key], |row| row.get(0))
            .optional()?;

        match value {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(TemplateError::missing(which, key)),
        }
    }

    fn list(&self, sql: &str) -> Result<BTreeSet<String>, TemplateError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = BTreeSet::new();
        for row in rows {
            keys.insert(row?);
        }
        Ok(keys)
    }
}

impl TemplateStore for SqliteTemplateStore {
    fn get_item_template(&self, label: &str) -> Result<String, TemplateError> {
        self.lookup(
            "SELECT prompt_text FROM item_prompts WHERE label = ?1",
            label,
            TemplateKind::Label,
        )
    }

    fn get_language_template(&self, lang_code: &str) -> Result<String, TemplateError> {
        self.lookup(
            "SELECT formatting_instruction FROM language_prompts WHERE lang_code = ?1",
            lang_code,
            TemplateKind::Language,
        )
    }

    fn get_model_for_tier(&self, tier_name: &str) -> Result<String, TemplateError> {
        self.lookup(
            "SELECT model_id FROM model_settings WHERE tier_name = ?1",
            tier_name,
            TemplateKind::ModelTier,
        )
    }

    fn list_known_labels(&self) -> Result<BTreeSet<String>, TemplateError> {
        self.list("SELECT label FROM item_prompts ORDER BY label")
    }

    fn list_known_languages(&self) -> Result<BTreeSet<String>, TemplateError> {
        self.list("SELECT lang_code FROM language_prompts ORDER BY lang_code")
    }
}

/// Run all pending migrations.
fn run_migrations(conn: &Connection) -> Result<(), TemplateError> {
    let current_version = get_current_version(conn);

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            tracing::info!("Running template store migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| TemplateError::MigrationFailed {
                    version: *version,
                    reason: e.to_string(),
                })?;
        }
    }
    Ok(())
}

/// Current schema version (0 if no schema exists yet).
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteTemplateStore {
        let store = SqliteTemplateStore::open_in_memory().unwrap();
        store.seed_defaults().unwrap();
        store
    }

    #[test]
    fn seeded_store_lists_default_vocabulary() {
        let store = seeded();
        let labels = store.list_known_labels().unwrap();
        assert!(labels.contains("modern_book"));
        assert!(labels.contains("film_poster"));
        let langs = store.list_known_languages().unwrap();
        assert_eq!(
            langs.into_iter().collect::<Vec<_>>(),
            vec!["en".to_string(), "mi".to_string(), "zh".to_string()]
        );
    }

    #[test]
    fn every_seeded_label_and_language_resolves() {
        let store = seeded();
        for label in store.list_known_labels().unwrap() {
            assert!(!store.get_item_template(&label).unwrap().is_empty());
        }
        for lang in store.list_known_languages().unwrap() {
            assert!(!store.get_language_template(&lang).unwrap().is_empty());
        }
    }

    #[test]
    fn missing_label_is_distinct_error() {
        let store = seeded();
        let err = store.get_item_template("map").unwrap_err();
        match err {
            TemplateError::Missing { which, key } => {
                assert_eq!(which, TemplateKind::Label);
                assert_eq!(key, "map");
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn blank_template_counts_as_missing() {
        let store = seeded();
        store.upsert_language_template("fr", "   ").unwrap();
        assert!(store.get_language_template("fr").unwrap_err().is_missing());
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let store = seeded();
        store.upsert_model_setting("paid", "gemini-2.5-pro").unwrap();
        assert_eq!(store.get_model_for_tier("paid").unwrap(), "gemini-2.5-pro");
        assert_eq!(store.get_model_for_tier("scout").unwrap(), "gemma3:4b");
    }

    #[test]
    fn seeding_keeps_custom_rows() {
        let store = SqliteTemplateStore::open_in_memory().unwrap();
        store.upsert_item_template("modern_book", "custom").unwrap();
        store.seed_defaults().unwrap();
        assert_eq!(store.get_item_template("modern_book").unwrap(), "custom");
    }

    #[test]
    fn reopening_file_store_skips_applied_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("templates.db");
        {
            let store = SqliteTemplateStore::open(&path).unwrap();
            store.upsert_item_template("zine", "Extract 245.").unwrap();
        }
        let store = SqliteTemplateStore::open(&path).unwrap();
        assert_eq!(store.get_item_template("zine").unwrap(), "Extract 245.");
    }

    #[test]
    fn empty_store_has_empty_vocabulary() {
        let store = SqliteTemplateStore::open_in_memory().unwrap();
        assert!(store.list_known_labels().unwrap().is_empty());
        assert!(store.get_model_for_tier("scout").unwrap_err().is_missing());
    }
}
