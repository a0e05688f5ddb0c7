//! Ledger settings as stored in a datastore's `wageline.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sea_orm::ConnectOptions;
use serde::{Deserialize, Serialize};

use wageline_ledger_core::{LedgerError, LedgerResult};

const DEFAULT_TRANSACTION_TIMEOUT_MS: u64 = 30_000;

/// Where intervals are kept. SQLite paths are resolved against the datastore
/// directory unless absolute.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite {
        path: Option<String>,
    },
    Postgres {
        url: String,
    },
    Mysql {
        url: String,
    },
}

impl DatabaseConfig {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::Postgres { .. } => "postgres",
            Self::Mysql { .. } => "mysql",
        }
    }
}

/// Connection pool overrides. Unset fields keep the driver defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

impl PoolConfig {
    pub(crate) fn apply(&self, options: &mut ConnectOptions) {
        if let Some(max) = self.max_connections {
            options.max_connections(max);
        }
        if let Some(min) = self.min_connections {
            options.min_connections(min);
        }
        if let Some(ms) = self.connect_timeout_ms {
            options.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.acquire_timeout_ms {
            options.acquire_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.idle_timeout_ms {
            options.idle_timeout(Duration::from_millis(ms));
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Deadline for acquiring the subject lock and doing a write's work. The
    /// commit itself is not bounded. `None` disables the deadline.
    pub timeout_ms: Option<u64>,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Some(DEFAULT_TRANSACTION_TIMEOUT_MS),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub transactions: Option<TransactionConfig>,
    /// Named fault injection points; writes fail with an internal error
    /// when they reach one.
    pub failpoints: Option<Vec<String>>,
}

impl LedgerConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            transactions: Some(TransactionConfig::default()),
            failpoints: None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.database.backend_name()
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> LedgerResult<PathBuf> {
        let DatabaseConfig::Sqlite { path } = &self.database else {
            return Err(LedgerError::bad_request(format!(
                "{} datastores have no sqlite file",
                self.backend_name()
            )));
        };
        let file = PathBuf::from(path.as_deref().unwrap_or(crate::datastore::SQLITE_FILE));
        Ok(if file.is_absolute() {
            file
        } else {
            base_dir.join(file)
        })
    }

    /// Driver URL for this datastore. SQLite files are created on first use.
    pub fn connection_url(&self, base_dir: &Path) -> LedgerResult<String> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => {
                let path = self.sqlite_path(base_dir)?;
                Ok(format!("sqlite://{}?mode=rwc", path.display()))
            }
            DatabaseConfig::Postgres { url } | DatabaseConfig::Mysql { url } => Ok(url.clone()),
        }
    }

    pub fn transaction_timeout(&self) -> Option<Duration> {
        self.transactions
            .as_ref()
            .and_then(|cfg| cfg.timeout_ms)
            .map(Duration::from_millis)
    }

    pub(crate) fn connect_options(&self, base_dir: &Path) -> LedgerResult<ConnectOptions> {
        let mut options = ConnectOptions::new(self.connection_url(base_dir)?);
        // One connection queues SQLite writers instead of failing them with SQLITE_BUSY.
        if matches!(self.database, DatabaseConfig::Sqlite { .. }) {
            options.max_connections(1);
        }
        if let Some(pool) = &self.pool {
            pool.apply(&mut options);
        }
        options.sqlx_logging(false);
        Ok(options)
    }
}
