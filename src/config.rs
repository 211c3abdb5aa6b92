use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Metata";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name of the template database inside the data directory.
pub const TEMPLATE_DB_FILE: &str = "templates.db";

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "metata_lib=info"
}

/// Get the application data directory.
/// `~/Metata/` on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the SQLite template store.
pub fn template_db_path() -> PathBuf {
    app_data_dir().join(TEMPLATE_DB_FILE)
}
