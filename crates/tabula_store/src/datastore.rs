use std::path::{Path, PathBuf};

use crate::{TabulaConfig, TabulaResult, TabulaStore};

const DEFAULT_DB_NAME: &str = "tabula.sqlite";

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_DB_NAME)
}

/// Reads `tabula.json` under `base`, writing a SQLite default first if the
/// directory has none.
pub fn load_or_init_config(base: &Path) -> TabulaResult<TabulaConfig> {
    TabulaConfig::load_or_init(base, &default_sqlite_path(base))
}

pub async fn open_store(base: &Path) -> TabulaResult<TabulaStore> {
    open_store_with(base, |_| {}).await
}

/// Opens the store under `base` after `adjust` has edited the loaded config.
/// The edits apply to this store only; `tabula.json` is left as it was.
pub async fn open_store_with(
    base: &Path,
    adjust: impl FnOnce(&mut TabulaConfig),
) -> TabulaResult<TabulaStore> {
    let mut config = load_or_init_config(base)?;
    adjust(&mut config);
    TabulaStore::connect(&config, base).await
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{default_sqlite_path, load_or_init_config, open_store, open_store_with};
    use crate::config::DEFAULT_MAX_BULK_ROWS;
    use crate::{LimitsConfig, TabulaResult};

    #[tokio::test]
    async fn adjustments_stay_out_of_the_config_file() -> TabulaResult<()> {
        let dir = tempdir().expect("tempdir");
        let base = dir.path();
        let tuned = open_store_with(base, |config| {
            config.limits = Some(LimitsConfig {
                default_select_limit: Some(7),
                max_bulk_rows: Some(3),
            });
            config.failpoints = Some(vec!["after_insert".to_string()]);
        })
        .await?;
        assert_eq!(tuned.settings().default_select_limit, 7);
        assert_eq!(tuned.settings().max_bulk_rows, 3);
        assert!(default_sqlite_path(base).exists());
        drop(tuned);

        let stored = load_or_init_config(base)?;
        assert!(stored.failpoints.is_none());
        let plain = open_store(base).await?;
        assert_eq!(plain.settings().max_bulk_rows, DEFAULT_MAX_BULK_ROWS);
        Ok(())
    }
}
