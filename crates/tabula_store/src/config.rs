use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tabula_core::{TabulaError, TabulaResult};

const DEFAULT_CONFIG_NAME: &str = "tabula.json";
pub const DEFAULT_SELECT_LIMIT: u64 = 100;
pub const DEFAULT_MAX_BULK_ROWS: usize = 500;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Page size of `select_by_filter` when the caller gives no limit.
    pub default_select_limit: Option<u64>,
    /// Rows per `INSERT` statement in a bulk insert.
    pub max_bulk_rows: Option<usize>,
}

impl LimitsConfig {
    pub fn with_defaults() -> Self {
        Self {
            default_select_limit: Some(DEFAULT_SELECT_LIMIT),
            max_bulk_rows: Some(DEFAULT_MAX_BULK_ROWS),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TabulaConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub limits: Option<LimitsConfig>,
    pub failpoints: Option<Vec<String>>,
}

impl TabulaConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            limits: Some(LimitsConfig::with_defaults()),
            failpoints: None,
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> TabulaResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| TabulaError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| TabulaError::storage(format!("read config: {err}")))?;
            let config: TabulaConfig =
                serde_json::from_str(&raw).map_err(|err| TabulaError::invalid(err.to_string()))?;
            return Ok(config);
        }
        let default = TabulaConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| TabulaError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| TabulaError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> TabulaResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| "tabula.sqlite".to_string());
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(TabulaError::invalid("config is not sqlite backend")),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
            DatabaseConfig::Mysql { .. } => "mysql",
        }
    }

    pub fn connection_url(&self, base_dir: &Path) -> TabulaResult<String> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => {
                let path = self.sqlite_path(base_dir)?;
                Ok(format!("sqlite://{}?mode=rwc", path.display()))
            }
            DatabaseConfig::Postgres { url } | DatabaseConfig::Mysql { url } => Ok(url.clone()),
        }
    }
}
