use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{
    ConnectOptions, Database, DatabaseBackend, DatabaseConnection, DatabaseTransaction,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use tabula_core::{Record, TabulaError, TabulaResult};

use crate::config::{DEFAULT_MAX_BULK_ROWS, DEFAULT_SELECT_LIMIT};
use crate::migration::Migrator;
use crate::records::Records;
use crate::TabulaConfig;

/// Limits and failpoints shared by every handle of one store.
#[derive(Clone, Debug)]
pub struct StoreSettings {
    pub default_select_limit: u64,
    pub max_bulk_rows: usize,
    failpoints: HashSet<String>,
}

impl StoreSettings {
    pub fn from_config(config: &TabulaConfig) -> Self {
        let limits = config.limits.as_ref();
        Self {
            default_select_limit: limits
                .and_then(|limits| limits.default_select_limit)
                .unwrap_or(DEFAULT_SELECT_LIMIT),
            max_bulk_rows: limits
                .and_then(|limits| limits.max_bulk_rows)
                .unwrap_or(DEFAULT_MAX_BULK_ROWS)
                .max(1),
            failpoints: config
                .failpoints
                .clone()
                .unwrap_or_default()
                .into_iter()
                .collect(),
        }
    }

    pub(crate) fn maybe_failpoint(&self, key: &str) -> TabulaResult<()> {
        if self.failpoints.contains(key) {
            Err(TabulaError::storage(format!("failpoint {key}")))
        } else {
            Ok(())
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            default_select_limit: DEFAULT_SELECT_LIMIT,
            max_bulk_rows: DEFAULT_MAX_BULK_ROWS,
            failpoints: HashSet::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackendCapabilities {
    pub returning: bool,
    pub on_conflict_upsert: bool,
    pub transactional_ddl: bool,
}

impl BackendCapabilities {
    pub fn for_backend(backend: DatabaseBackend) -> Self {
        match backend {
            DatabaseBackend::Postgres => BackendCapabilities {
                returning: backend.support_returning(),
                on_conflict_upsert: true,
                transactional_ddl: true,
            },
            DatabaseBackend::MySql => BackendCapabilities {
                returning: backend.support_returning(),
                on_conflict_upsert: false,
                transactional_ddl: false,
            },
            _ => BackendCapabilities {
                returning: backend.support_returning(),
                on_conflict_upsert: true,
                transactional_ddl: false,
            },
        }
    }
}

#[derive(Clone)]
pub struct TabulaStore {
    conn: DatabaseConnection,
    backend: DatabaseBackend,
    settings: Arc<StoreSettings>,
}

impl TabulaStore {
    pub async fn connect(config: &TabulaConfig, base_dir: &Path) -> TabulaResult<Self> {
        let url = config.connection_url(base_dir)?;
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        let conn = Database::connect(options).await?;
        let backend = conn.get_database_backend();
        Migrator::up(&conn, None).await?;
        log::debug!("tabula store connected ({})", config.backend_name());
        Ok(Self {
            conn,
            backend,
            settings: Arc::new(StoreSettings::from_config(config)),
        })
    }

    pub async fn connect_sqlite(path: &Path) -> TabulaResult<Self> {
        let config = TabulaConfig::default_sqlite(path.to_string_lossy());
        Self::connect(&config, path.parent().unwrap_or_else(|| Path::new("."))).await
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::for_backend(self.backend)
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Record access on the pooled connection. With `auto_commit` every
    /// write runs in its own transaction.
    pub fn records<R: Record>(&self) -> Records<'_, R, DatabaseConnection> {
        Records::new(&self.conn, &self.settings)
    }

    /// Opens a caller-owned transaction. Dropping the session without
    /// committing rolls it back.
    pub async fn begin(&self) -> TabulaResult<Session> {
        let tx = self.conn.begin().await?;
        Ok(Session {
            tx,
            settings: Arc::clone(&self.settings),
        })
    }
}

/// A transaction shared by several operations.
///
/// Operations on a session must be awaited one at a time.
pub struct Session {
    tx: DatabaseTransaction,
    settings: Arc<StoreSettings>,
}

impl Session {
    /// Record access inside this transaction. `auto_commit` writes run in a
    /// savepoint; deferred writes stay pending until [`Session::commit`].
    pub fn records<R: Record>(&self) -> Records<'_, R, DatabaseTransaction> {
        Records::new(&self.tx, &self.settings)
    }

    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.tx
    }

    pub async fn commit(self) -> TabulaResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> TabulaResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::DatabaseBackend;

    use super::{BackendCapabilities, StoreSettings};
    use crate::{LimitsConfig, TabulaConfig};

    #[test]
    fn settings_fall_back_to_default_limits() {
        let mut config = TabulaConfig::default_sqlite("x.sqlite");
        config.limits = Some(LimitsConfig {
            default_select_limit: Some(5),
            max_bulk_rows: Some(0),
        });
        config.failpoints = Some(vec!["after_insert".to_string()]);
        let settings = StoreSettings::from_config(&config);
        assert_eq!(settings.default_select_limit, 5);
        assert_eq!(settings.max_bulk_rows, 1);
        assert!(settings.maybe_failpoint("after_insert").is_err());
        assert!(settings.maybe_failpoint("after_update").is_ok());
    }

    #[test]
    fn mysql_upserts_check_before_writing() {
        let caps = BackendCapabilities::for_backend(DatabaseBackend::MySql);
        assert!(!caps.on_conflict_upsert);
        let caps = BackendCapabilities::for_backend(DatabaseBackend::Postgres);
        assert!(caps.returning && caps.transactional_ddl);
    }
}
