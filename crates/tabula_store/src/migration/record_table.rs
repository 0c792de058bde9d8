use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use sea_orm_migration::sea_query::ExprTrait;

use tabula_core::{
    CREATED_AT_COLUMN, Column, ID_COLUMN, MAX_ID_LEN, Record, UPDATED_AT_COLUMN, ValueType,
    generate_id,
};

use crate::db::{STAT_TABLE, TabulaTableStat};
use crate::sql::{build_stmt, col, now_expr, table, value_to_sea};

const FN_GENERATE_PK: &str = "tabula_fn_generate_pk";
const FN_UPDATED_AT: &str = "tabula_fn_updated_at";
const FN_STAT_COUNT: &str = "tabula_fn_stat_count";

async fn execute_sql(manager: &SchemaManager<'_>, sql: String) -> Result<(), DbErr> {
    let backend = manager.get_database_backend();
    manager
        .get_connection()
        .execute_raw(Statement::from_string(backend, sql))
        .await?;
    Ok(())
}

fn column_def(column: &Column) -> ColumnDef {
    let mut def = ColumnDef::new(col(column.name));
    match (column.value_type, column.max_len) {
        (ValueType::Str, Some(max_len)) => def.string_len(max_len),
        (ValueType::Str, None) | (ValueType::Json, _) => def.text(),
        (ValueType::I64, _) => def.big_integer(),
        (ValueType::F64, _) => def.double(),
        (ValueType::Bool, _) => def.boolean(),
    };
    if column.nullable {
        def.null();
    } else {
        def.not_null();
    }
    if let Some(default) = column.default {
        def.default(value_to_sea(column.value_type, &default.to_value()));
    }
    def
}

/// `created_at` / `updated_at` as epoch milliseconds defaulting to the store
/// clock.
pub(crate) fn timestamp_def(backend: DatabaseBackend, name: &str) -> ColumnDef {
    ColumnDef::new(col(name))
        .big_integer()
        .not_null()
        .default(Expr::cust(now_expr(backend)))
        .to_owned()
}

pub(crate) fn created_at_index_name(table_name: &str) -> String {
    format!("ix__{table_name}__created_at")
}

/// Trigger functions shared by every record table. Postgres only.
pub(crate) async fn install_functions(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.get_database_backend() != DatabaseBackend::Postgres {
        return Ok(());
    }
    let now = now_expr(DatabaseBackend::Postgres);
    execute_sql(
        manager,
        format!(
            "CREATE OR REPLACE FUNCTION {FN_GENERATE_PK}() RETURNS trigger AS $$ \
             BEGIN \
               IF NEW.id IS NULL THEN \
                 NEW.id := md5(random()::text || clock_timestamp()::text); \
               END IF; \
               RETURN NEW; \
             END; $$ LANGUAGE plpgsql"
        ),
    )
    .await?;
    execute_sql(
        manager,
        format!(
            "CREATE OR REPLACE FUNCTION {FN_UPDATED_AT}() RETURNS trigger AS $$ \
             BEGIN \
               NEW.updated_at := {now}; \
               RETURN NEW; \
             END; $$ LANGUAGE plpgsql"
        ),
    )
    .await?;
    execute_sql(
        manager,
        format!(
            "CREATE OR REPLACE FUNCTION {FN_STAT_COUNT}() RETURNS trigger AS $$ \
             BEGIN \
               IF TG_OP = 'INSERT' THEN \
                 UPDATE {STAT_TABLE} SET insert_count = insert_count + 1, \
                   row_count = row_count + 1, updated_at = {now} \
                   WHERE table_name = TG_TABLE_NAME; \
               ELSIF TG_OP = 'DELETE' THEN \
                 UPDATE {STAT_TABLE} SET delete_count = delete_count + 1, \
                   row_count = row_count - 1, updated_at = {now} \
                   WHERE table_name = TG_TABLE_NAME; \
               END IF; \
               RETURN NULL; \
             END; $$ LANGUAGE plpgsql"
        ),
    )
    .await
}

pub(crate) async fn drop_functions(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.get_database_backend() != DatabaseBackend::Postgres {
        return Ok(());
    }
    for function in [FN_STAT_COUNT, FN_UPDATED_AT, FN_GENERATE_PK] {
        execute_sql(manager, format!("DROP FUNCTION IF EXISTS {function}() CASCADE")).await?;
    }
    Ok(())
}

/// Postgres `BEFORE` triggers filling a missing `id` and moving `updated_at`
/// on every update.
pub(crate) async fn create_row_triggers(
    manager: &SchemaManager<'_>,
    table_name: &str,
) -> Result<(), DbErr> {
    if manager.get_database_backend() != DatabaseBackend::Postgres {
        return Ok(());
    }
    let triggers = [
        ("generate_pk", "BEFORE INSERT", FN_GENERATE_PK),
        ("updated_at", "BEFORE UPDATE", FN_UPDATED_AT),
    ];
    for (suffix, timing, function) in triggers {
        let trigger = format!("tr__{table_name}__{suffix}");
        execute_sql(
            manager,
            format!("DROP TRIGGER IF EXISTS {trigger} ON \"{table_name}\""),
        )
        .await?;
        execute_sql(
            manager,
            format!(
                "CREATE TRIGGER {trigger} {timing} ON \"{table_name}\" \
                 FOR EACH ROW EXECUTE FUNCTION {function}()"
            ),
        )
        .await?;
    }
    Ok(())
}

async fn create_stat_triggers(manager: &SchemaManager<'_>, table_name: &str) -> Result<(), DbErr> {
    let backend = manager.get_database_backend();
    match backend {
        DatabaseBackend::Sqlite => {
            let now = now_expr(backend);
            let triggers = [
                (
                    "stat_insert",
                    "INSERT",
                    "insert_count = insert_count + 1, row_count = row_count + 1",
                ),
                (
                    "stat_delete",
                    "DELETE",
                    "delete_count = delete_count + 1, row_count = row_count - 1",
                ),
            ];
            for (suffix, event, counters) in triggers {
                execute_sql(
                    manager,
                    format!(
                        "CREATE TRIGGER IF NOT EXISTS tr__{table_name}__{suffix} \
                         AFTER {event} ON \"{table_name}\" FOR EACH ROW BEGIN \
                           UPDATE {STAT_TABLE} SET {counters}, updated_at = {now} \
                           WHERE table_name = '{table_name}'; \
                         END"
                    ),
                )
                .await?;
            }
            Ok(())
        }
        DatabaseBackend::Postgres => {
            let trigger = format!("tr__{table_name}__stat_count");
            execute_sql(
                manager,
                format!("DROP TRIGGER IF EXISTS {trigger} ON \"{table_name}\""),
            )
            .await?;
            execute_sql(
                manager,
                format!(
                    "CREATE TRIGGER {trigger} AFTER INSERT OR DELETE ON \"{table_name}\" \
                     FOR EACH ROW EXECUTE FUNCTION {FN_STAT_COUNT}()"
                ),
            )
            .await
        }
        _ => Ok(()),
    }
}

async fn seed_stat_row(manager: &SchemaManager<'_>, table_name: &str) -> Result<(), DbErr> {
    let backend = manager.get_database_backend();
    let insert = Query::insert()
        .into_table(TabulaTableStat::Table)
        .columns([TabulaTableStat::Id, TabulaTableStat::TableName])
        .values_panic([generate_id().into(), table_name.into()])
        .on_conflict(
            OnConflict::column(TabulaTableStat::TableName)
                .do_nothing()
                .to_owned(),
        )
        .to_owned();
    let (sql, values) = build_stmt(backend, &insert);
    manager
        .get_connection()
        .execute_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(())
}

/// Creates the table of `R` with its `created_at` index, its row-count
/// triggers and its row in `tabula_table_stat`, which must already exist.
///
/// Intended for application migrations that add record types.
pub async fn create_record_table<R: Record>(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    let backend = manager.get_database_backend();
    let mut create = Table::create();
    create.table(table::<R>()).if_not_exists().col(
        ColumnDef::new(col(ID_COLUMN))
            .string_len(MAX_ID_LEN as u32)
            .not_null()
            .primary_key(),
    );
    for column in R::COLUMNS {
        create.col(column_def(column));
    }
    create
        .col(timestamp_def(backend, CREATED_AT_COLUMN))
        .col(timestamp_def(backend, UPDATED_AT_COLUMN));
    manager.create_table(create).await?;

    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name(created_at_index_name(R::TABLE))
                .table(table::<R>())
                .col(col(CREATED_AT_COLUMN))
                .to_owned(),
        )
        .await?;

    install_functions(manager).await?;
    create_row_triggers(manager, R::TABLE).await?;
    create_stat_triggers(manager, R::TABLE).await?;
    seed_stat_row(manager, R::TABLE).await
}

/// Drops the table of `R`, its triggers and its statistics row.
pub async fn drop_record_table<R: Record>(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if manager.get_database_backend() == DatabaseBackend::Sqlite {
        for suffix in ["stat_insert", "stat_delete"] {
            execute_sql(
                manager,
                format!("DROP TRIGGER IF EXISTS tr__{}__{suffix}", R::TABLE),
            )
            .await?;
        }
    }
    manager
        .drop_table(Table::drop().table(table::<R>()).if_exists().to_owned())
        .await?;
    let delete = Query::delete()
        .from_table(TabulaTableStat::Table)
        .and_where(Expr::col(TabulaTableStat::TableName).eq(R::TABLE))
        .to_owned();
    let backend = manager.get_database_backend();
    let (sql, values) = build_stmt(backend, &delete);
    manager
        .get_connection()
        .execute_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(())
}
