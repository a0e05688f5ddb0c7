pub mod config;
pub mod datastore;
mod db;
pub mod locks;
pub mod migration;
pub mod registry;
mod sql;
pub mod store;

pub use wageline_ledger_core::*;
pub use config::{DatabaseConfig, LedgerConfig, PoolConfig, TransactionConfig};
pub use datastore::{default_sqlite_path, load_or_init_config, open_store};
pub use locks::{SubjectGuard, SubjectLocks};
pub use registry::SqlSubjectRegistry;
pub use store::{
    LedgerStore, FAILPOINT_CREATE_AFTER_CLOSE, FAILPOINT_CREATE_BEFORE_COMMIT,
    FAILPOINT_UPDATE_BEFORE_COMMIT,
};
