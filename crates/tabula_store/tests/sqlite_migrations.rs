use std::collections::HashSet;

use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use tabula_store::{TabulaConfig, TabulaError, TabulaResult, TabulaStore};
use tempfile::tempdir;

async fn list_names(store: &TabulaStore, kind: &str) -> TabulaResult<HashSet<String>> {
    let rows = store
        .connection()
        .query_all_raw(Statement::from_string(
            DatabaseBackend::Sqlite,
            format!("SELECT name FROM sqlite_master WHERE type = '{kind}'"),
        ))
        .await
        .map_err(TabulaError::from)?;
    let mut names = HashSet::new();
    for row in rows {
        let name: String = row.try_get("", "name").map_err(TabulaError::from)?;
        names.insert(name);
    }
    Ok(names)
}

#[tokio::test]
async fn sqlite_migrations_create_tables_indexes_and_triggers() -> TabulaResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let config = TabulaConfig::default_sqlite(base.join("tabula.sqlite").to_string_lossy());
    let store = TabulaStore::connect(&config, base).await?;

    let tables = list_names(&store, "table").await?;
    for table in ["tabula_table_stat", "tabula_task", "seaql_migrations"] {
        assert!(tables.contains(table), "expected table '{table}' to exist");
    }
    let indexes = list_names(&store, "index").await?;
    for index in [
        "ix__tabula_table_stat__created_at",
        "ix__tabula_task__created_at",
    ] {
        assert!(indexes.contains(index), "expected index '{index}' to exist");
    }
    let triggers = list_names(&store, "trigger").await?;
    for trigger in ["tr__tabula_task__stat_insert", "tr__tabula_task__stat_delete"] {
        assert!(triggers.contains(trigger), "expected trigger '{trigger}' to exist");
    }

    let stat = store.table_stat("tabula_task").await?.expect("stat row");
    assert_eq!(stat.row_count, 0);
    assert!(!stat.id.is_empty());

    // Idempotency check.
    let again = TabulaStore::connect(&config, base).await?;
    assert_eq!(again.table_stats().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn timestamps_default_to_the_store_clock() -> TabulaResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = TabulaStore::connect_sqlite(&dir.path().join("tabula.sqlite")).await?;
    store
        .connection()
        .execute_raw(Statement::from_string(
            DatabaseBackend::Sqlite,
            "INSERT INTO tabula_task (id, name) VALUES ('raw', 'inserted by hand')",
        ))
        .await
        .map_err(TabulaError::from)?;
    let row = store
        .connection()
        .query_one_raw(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT point, created_at, updated_at FROM tabula_task WHERE id = 'raw'",
        ))
        .await
        .map_err(TabulaError::from)?
        .expect("row");
    let point: i64 = row.try_get("", "point").map_err(TabulaError::from)?;
    let created_at: i64 = row.try_get("", "created_at").map_err(TabulaError::from)?;
    let updated_at: i64 = row.try_get("", "updated_at").map_err(TabulaError::from)?;
    assert_eq!(point, 70);
    // Any plausible epoch-millisecond value, not seconds.
    assert!(created_at > 1_600_000_000_000);
    assert_eq!(created_at, updated_at);
    Ok(())
}
