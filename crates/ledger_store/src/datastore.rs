//! A datastore is a directory holding `wageline.json` and, for SQLite, the
//! database file next to it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{LedgerConfig, LedgerError, LedgerResult, LedgerStore};

pub const CONFIG_FILE: &str = "wageline.json";
pub const SQLITE_FILE: &str = "wageline.sqlite";

pub fn default_sqlite_path(dir: &Path) -> PathBuf {
    dir.join(SQLITE_FILE)
}

/// Reads `wageline.json` from `dir`, writing a SQLite default first when the
/// directory has none.
pub fn load_or_init_config(dir: &Path) -> LedgerResult<LedgerConfig> {
    let file = dir.join(CONFIG_FILE);
    if file.exists() {
        let raw = fs::read_to_string(&file)
            .map_err(|err| LedgerError::internal(format!("read {}: {err}", file.display())))?;
        return serde_json::from_str(&raw)
            .map_err(|err| LedgerError::bad_request(format!("parse {}: {err}", file.display())));
    }

    fs::create_dir_all(dir)
        .map_err(|err| LedgerError::internal(format!("create {}: {err}", dir.display())))?;
    let config = LedgerConfig::default_sqlite(SQLITE_FILE);
    let payload = serde_json::to_string_pretty(&config)
        .map_err(|err| LedgerError::internal(format!("encode config: {err}")))?;
    fs::write(&file, payload)
        .map_err(|err| LedgerError::internal(format!("write {}: {err}", file.display())))?;
    Ok(config)
}

/// Opens the datastore under `dir`, using its own subjects table as the registry.
pub async fn open_store(dir: &Path) -> LedgerResult<LedgerStore> {
    let config = load_or_init_config(dir)?;
    LedgerStore::connect_with_sql_registry(&config, dir).await
}
