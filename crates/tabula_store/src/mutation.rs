use std::collections::HashSet;
use std::slice;

use sea_orm::sea_query::{Expr, ExprTrait, InsertStatement, OnConflict, Query, UpdateStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend};

use tabula_core::{
    Column, Fields, FilterSpec, ID_COLUMN, InsertMode, MutationRequest, Record, SelectOptions,
    TabulaError, TabulaResult, UPDATED_AT_COLUMN, UpsertMode, Value, ValueType, WriteOptions,
    WriteOutcome, check_id, generate_id,
};

use crate::filter::build_condition;
use crate::read::{exists, fetch_by_id, get, select_by_filter, select_by_ids};
use crate::sql::{
    col, column_type, decode, decode_all, exec, id_value, now_expr, query_all, table,
    value_to_sea,
};
use crate::store::{BackendCapabilities, StoreSettings};

/// Declared column paired with the value to write into it.
pub(crate) type Changes = Vec<(&'static Column, Value)>;

pub(crate) struct PreparedInsert<R> {
    pub(crate) id: String,
    pub(crate) row: Fields,
    /// Set when the record was built in memory before the write.
    pub(crate) constructed: Option<R>,
}

pub(crate) struct PreparedUpsert {
    pub(crate) id: String,
    pub(crate) request: MutationRequest,
    pub(crate) changes: Changes,
}

pub(crate) struct PreparedBulk {
    pub(crate) ids: Vec<String>,
    pub(crate) columns: Vec<&'static str>,
    pub(crate) rows: Vec<Fields>,
}

fn coerce(column: &Column, value: Value) -> Value {
    match (column.value_type, value) {
        (ValueType::F64, Value::I64(number)) => Value::F64(number as f64),
        (_, value) => value,
    }
}

pub(crate) fn apply_changes<R: Record>(
    record: &mut R,
    changes: &[(&'static Column, Value)],
) -> TabulaResult<()> {
    for (column, value) in changes {
        record.set_field(column.name, coerce(column, value.clone()))?;
    }
    Ok(())
}

/// Every domain column of `record`, for writes that replace the whole row.
fn full_changes<R: Record>(record: &R) -> Changes {
    let fields = record.to_fields();
    R::COLUMNS
        .iter()
        .map(|column| (column, fields.get(column.name).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn unique_ids<R: Record>(records: &[R]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|record| record.id().to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn construct<R: Record>(id: &str, request: &MutationRequest) -> TabulaResult<R> {
    let mut fields = Fields::new();
    fields.insert(ID_COLUMN, id);
    for column in R::COLUMNS {
        let value = match request.get(column.name) {
            Some(Some(value)) => coerce(column, value.clone()),
            _ => column.implicit_value().ok_or_else(|| {
                TabulaError::invalid(format!("'{}' requires '{}'", R::TABLE, column.name))
            })?,
        };
        fields.insert(column.name, value);
    }
    R::from_fields(fields)
}

pub(crate) fn prepare_insert<R: Record>(
    request: &MutationRequest,
    mode: InsertMode,
) -> TabulaResult<PreparedInsert<R>> {
    request.validate::<R>()?;
    let id = request.id().map(str::to_string).unwrap_or_else(generate_id);
    match mode {
        InsertMode::Statement => {
            let mut row = Fields::new();
            row.insert(ID_COLUMN, id.as_str());
            for (column, value) in request.changes::<R>() {
                row.insert(column.name, value);
            }
            Ok(PreparedInsert {
                id,
                row,
                constructed: None,
            })
        }
        InsertMode::Construct => {
            let record = construct::<R>(&id, request)?;
            Ok(PreparedInsert {
                id,
                row: record.to_fields(),
                constructed: Some(record),
            })
        }
    }
}

pub(crate) fn prepare_upsert<R: Record>(request: MutationRequest) -> TabulaResult<PreparedUpsert> {
    request.validate::<R>()?;
    let id = request.id().map(str::to_string).unwrap_or_else(generate_id);
    let changes = request.changes::<R>();
    Ok(PreparedUpsert {
        request: request.with_id(id.as_str()),
        id,
        changes,
    })
}

pub(crate) fn prepare_save<R: Record>(
    mut record: R,
    overrides: &MutationRequest,
) -> TabulaResult<R> {
    check_id(&Value::from(record.id()))?;
    overrides.validate_entries::<R>()?;
    apply_changes(&mut record, &overrides.changes::<R>())?;
    Ok(record)
}

/// Changes of an update request. `id` and unset fields never reach the
/// statement.
pub(crate) fn prepare_update<R: Record>(request: &MutationRequest) -> TabulaResult<Changes> {
    request.validate::<R>()?;
    Ok(request.changes::<R>())
}

pub(crate) fn prepare_bulk<R: Record>(requests: &[MutationRequest]) -> TabulaResult<PreparedBulk> {
    if requests.is_empty() {
        return Err(TabulaError::invalid(format!(
            "bulk insert into '{}' needs at least one row",
            R::TABLE
        )));
    }
    for request in requests {
        request.validate::<R>()?;
    }
    let provided = |column: &Column| {
        requests
            .iter()
            .any(|request| matches!(request.get(column.name), Some(Some(_))))
    };
    let written: Vec<&'static Column> = R::COLUMNS
        .iter()
        .filter(|column| provided(*column))
        .collect();
    let mut columns = vec![ID_COLUMN];
    columns.extend(written.iter().map(|column| column.name));

    let mut ids = Vec::with_capacity(requests.len());
    let mut rows = Vec::with_capacity(requests.len());
    for (index, request) in requests.iter().enumerate() {
        let id = request.id().map(str::to_string).unwrap_or_else(generate_id);
        let mut row = Fields::new();
        row.insert(ID_COLUMN, id.as_str());
        for column in R::COLUMNS {
            match request.get(column.name) {
                Some(Some(value)) => row.insert(column.name, value.clone()),
                _ => {
                    let implicit = column.implicit_value().ok_or_else(|| {
                        TabulaError::invalid(format!(
                            "row {index} of '{}' is missing '{}'",
                            R::TABLE,
                            column.name
                        ))
                    })?;
                    if written.iter().any(|other| other.name == column.name) {
                        row.insert(column.name, implicit);
                    }
                }
            }
        }
        ids.push(id);
        rows.push(row);
    }
    Ok(PreparedBulk { ids, columns, rows })
}

fn insert_stmt<R: Record>(columns: &[&str], rows: &[Fields]) -> TabulaResult<InsertStatement> {
    let types = columns
        .iter()
        .map(|name| {
            column_type::<R>(name).ok_or_else(|| {
                TabulaError::invalid(format!("'{}' has no column '{name}'", R::TABLE))
            })
        })
        .collect::<TabulaResult<Vec<_>>>()?;
    let mut insert = Query::insert();
    insert
        .into_table(table::<R>())
        .columns(columns.iter().map(|name| col(name)));
    for row in rows {
        insert.values_panic(columns.iter().zip(&types).map(|(name, value_type)| {
            value_to_sea(*value_type, row.get(name).unwrap_or(&Value::Null)).into()
        }));
    }
    Ok(insert)
}

/// `UPDATE` of the given columns. `updated_at` always moves to the store
/// clock.
fn update_stmt<R: Record>(
    backend: DatabaseBackend,
    changes: &[(&'static Column, Value)],
) -> UpdateStatement {
    let mut update = Query::update();
    update.table(table::<R>());
    for (column, value) in changes {
        update.value(col(column.name), value_to_sea(column.value_type, value));
    }
    update.value(col(UPDATED_AT_COLUMN), Expr::cust(now_expr(backend)));
    update
}

/// Runs the update against `ids`, `max_bulk_rows` ids per statement.
async fn update_ids<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    changes: &[(&'static Column, Value)],
    ids: &[String],
) -> TabulaResult<u64> {
    let backend = conn.get_database_backend();
    let mut affected = 0;
    for chunk in ids.chunks(settings.max_bulk_rows) {
        let mut update = update_stmt::<R>(backend, changes);
        update.and_where(Expr::col(col(ID_COLUMN)).is_in(chunk.iter().map(|id| id_value(id))));
        affected += exec(conn, &update).await?;
    }
    Ok(affected)
}

/// Writes one row and reads it back, through `RETURNING` when the backend
/// has it.
async fn write_and_fetch<C: ConnectionTrait, R: Record>(
    conn: &C,
    mut insert: InsertStatement,
    id: &str,
) -> TabulaResult<R> {
    if conn.get_database_backend().support_returning() {
        insert.returning_all();
        if let Some(row) = query_all(conn, &insert).await?.first() {
            return decode::<R>(row);
        }
    } else {
        exec(conn, &insert).await?;
    }
    fetch_by_id::<C, R>(conn, id)
        .await?
        .ok_or_else(|| TabulaError::storage(format!("{} '{id}' was not persisted", R::TABLE)))
}

pub(crate) async fn insert_on<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    prepared: PreparedInsert<R>,
    options: WriteOptions,
) -> TabulaResult<WriteOutcome<R>> {
    let columns: Vec<&str> = prepared.row.iter().map(|(name, _)| name.as_str()).collect();
    let insert = insert_stmt::<R>(&columns, slice::from_ref(&prepared.row))?;
    let outcome = match prepared.constructed {
        None if !options.returning => WriteOutcome::Affected(exec(conn, &insert).await?),
        Some(record) if !options.returning => {
            exec(conn, &insert).await?;
            WriteOutcome::Returned(record)
        }
        _ => WriteOutcome::Returned(write_and_fetch::<C, R>(conn, insert, &prepared.id).await?),
    };
    settings.maybe_failpoint("after_insert")?;
    Ok(outcome)
}

pub(crate) async fn save_on<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    record: R,
    options: WriteOptions,
) -> TabulaResult<R> {
    if exists::<C, R>(conn, record.id()).await? {
        let changes = full_changes(&record);
        let mut saved = update_records_on(conn, settings, vec![record], &changes, options).await?;
        return saved
            .pop()
            .ok_or_else(|| TabulaError::storage(format!("saved '{}' row vanished", R::TABLE)));
    }
    let prepared = PreparedInsert {
        id: record.id().to_string(),
        row: record.to_fields(),
        constructed: Some(record),
    };
    insert_on(conn, settings, prepared, options)
        .await?
        .returned()
        .ok_or_else(|| TabulaError::storage(format!("saved '{}' row was not returned", R::TABLE)))
}

/// Whether `changes` supplies every column that has neither a default nor
/// NULL to fall back on.
fn covers_required<R: Record>(changes: &[(&'static Column, Value)]) -> bool {
    R::COLUMNS.iter().all(|column| {
        column.implicit_value().is_some()
            || changes.iter().any(|(changed, _)| changed.name == column.name)
    })
}

pub(crate) async fn upsert_on<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    prepared: PreparedUpsert,
    mode: UpsertMode,
    options: WriteOptions,
) -> TabulaResult<WriteOutcome<R>> {
    let backend = conn.get_database_backend();
    // The insert half of ON CONFLICT is checked for NOT NULL before the
    // conflict resolves, so partial requests go through check-then-write.
    let single_statement = mode == UpsertMode::OnConflict
        && BackendCapabilities::for_backend(backend).on_conflict_upsert
        && covers_required::<R>(&prepared.changes);
    let outcome = if single_statement {
        let mut row = Fields::new();
        row.insert(ID_COLUMN, prepared.id.as_str());
        for (column, value) in &prepared.changes {
            row.insert(column.name, value.clone());
        }
        let columns: Vec<&str> = row.iter().map(|(name, _)| name.as_str()).collect();
        let mut insert = insert_stmt::<R>(&columns, slice::from_ref(&row))?;
        insert.on_conflict(
            OnConflict::column(col(ID_COLUMN))
                .update_columns(prepared.changes.iter().map(|(column, _)| col(column.name)))
                .value(col(UPDATED_AT_COLUMN), Expr::cust(now_expr(backend)))
                .to_owned(),
        );
        if options.returning {
            WriteOutcome::Returned(write_and_fetch::<C, R>(conn, insert, &prepared.id).await?)
        } else {
            WriteOutcome::Affected(exec(conn, &insert).await?)
        }
    } else {
        let record = match fetch_by_id::<C, R>(conn, &prepared.id).await? {
            Some(existing) => {
                update_records_on(conn, settings, vec![existing], &prepared.changes, options)
                    .await?
                    .pop()
                    .ok_or_else(|| {
                        TabulaError::storage(format!("upserted '{}' row vanished", R::TABLE))
                    })?
            }
            None => {
                let insert = prepare_insert::<R>(&prepared.request, InsertMode::Construct)?;
                insert_on(conn, settings, insert, options)
                    .await?
                    .returned()
                    .ok_or_else(|| {
                        let message = format!("upserted '{}' row was not returned", R::TABLE);
                        TabulaError::storage(message)
                    })?
            }
        };
        if options.returning {
            WriteOutcome::Returned(record)
        } else {
            WriteOutcome::Affected(1)
        }
    };
    settings.maybe_failpoint("after_upsert")?;
    Ok(outcome)
}

pub(crate) async fn bulk_insert_on<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    prepared: PreparedBulk,
    options: WriteOptions,
) -> TabulaResult<WriteOutcome<Vec<R>>> {
    let use_returning = options.returning && conn.get_database_backend().support_returning();
    let mut affected = 0;
    let mut returned = Vec::with_capacity(prepared.rows.len());
    for chunk in prepared.rows.chunks(settings.max_bulk_rows) {
        let mut insert = insert_stmt::<R>(&prepared.columns, chunk)?;
        if use_returning {
            insert.returning_all();
            let rows = query_all(conn, &insert).await?;
            affected += rows.len() as u64;
            returned.extend(decode_all::<R>(&rows)?);
        } else {
            affected += exec(conn, &insert).await?;
        }
    }
    log::debug!("tabula bulk insert into '{}': {affected} rows", R::TABLE);
    settings.maybe_failpoint("after_bulk_insert")?;
    if !options.returning {
        return Ok(WriteOutcome::Affected(affected));
    }
    if !use_returning {
        returned = select_by_ids::<C, R>(conn, settings, &prepared.ids).await?;
    }
    Ok(WriteOutcome::Returned(returned))
}

/// Applies `changes` to each record and writes them with one statement.
/// Fails when a record no longer has a row.
pub(crate) async fn update_records_on<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    mut records: Vec<R>,
    changes: &[(&'static Column, Value)],
    options: WriteOptions,
) -> TabulaResult<Vec<R>> {
    if records.is_empty() {
        return Ok(records);
    }
    for record in &mut records {
        apply_changes(record, changes)?;
    }
    let ids = unique_ids(&records);
    let affected = update_ids::<C, R>(conn, settings, changes, &ids).await?;
    if affected < ids.len() as u64 {
        return Err(TabulaError::storage(format!(
            "updated {affected} of {} '{}' rows",
            ids.len(),
            R::TABLE
        )));
    }
    settings.maybe_failpoint("after_update")?;
    if options.returning {
        return select_by_ids::<C, R>(conn, settings, &ids).await;
    }
    Ok(records)
}

pub(crate) async fn update_by_id_on<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    id: &str,
    changes: &[(&'static Column, Value)],
    check_exists: bool,
    options: WriteOptions,
) -> TabulaResult<Option<R>> {
    if check_exists {
        let Some(record) = get::<C, R>(conn, id, false).await? else {
            return Err(TabulaError::not_found(format!("{} '{id}'", R::TABLE)));
        };
        let mut updated = update_records_on(conn, settings, vec![record], changes, options).await?;
        return Ok(updated.pop());
    }
    let mut update = update_stmt::<R>(conn.get_database_backend(), changes);
    update.and_where(Expr::col(col(ID_COLUMN)).eq(id_value(id)));
    let record = if conn.get_database_backend().support_returning() {
        update.returning_all();
        let rows = query_all(conn, &update).await?;
        rows.first().map(decode::<R>).transpose()?
    } else if exec(conn, &update).await? == 0 {
        None
    } else {
        fetch_by_id::<C, R>(conn, id).await?
    };
    settings.maybe_failpoint("after_update")?;
    Ok(record)
}

pub(crate) async fn update_by_filter_on<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    filter: &FilterSpec,
    changes: &[(&'static Column, Value)],
    check_exists: bool,
    options: WriteOptions,
) -> TabulaResult<WriteOutcome<Vec<R>>> {
    if check_exists {
        let records =
            select_by_filter::<C, R>(conn, settings, filter, SelectOptions::unbounded()).await?;
        let updated = update_records_on(conn, settings, records, changes, options).await?;
        return Ok(WriteOutcome::Returned(updated));
    }
    let condition = build_condition::<R>(filter)?;
    let backend = conn.get_database_backend();
    let outcome = if !options.returning {
        let mut update = update_stmt::<R>(backend, changes);
        update.cond_where(condition);
        WriteOutcome::Affected(exec(conn, &update).await?)
    } else if backend.support_returning() {
        let mut update = update_stmt::<R>(backend, changes);
        update.cond_where(condition).returning_all();
        let rows = query_all(conn, &update).await?;
        WriteOutcome::Returned(decode_all::<R>(&rows)?)
    } else {
        // Matched ids are taken first since the update may change the
        // columns the filter looks at.
        let select = Query::select()
            .column(col(ID_COLUMN))
            .from(table::<R>())
            .cond_where(condition)
            .to_owned();
        let ids = query_all(conn, &select)
            .await?
            .iter()
            .map(|row| row.try_get::<String>("", ID_COLUMN))
            .collect::<Result<Vec<_>, _>>()?;
        update_ids::<C, R>(conn, settings, changes, &ids).await?;
        WriteOutcome::Returned(select_by_ids::<C, R>(conn, settings, &ids).await?)
    };
    settings.maybe_failpoint("after_update")?;
    Ok(outcome)
}

pub(crate) async fn update_all_on<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    changes: &[(&'static Column, Value)],
) -> TabulaResult<u64> {
    log::warn!("tabula update_all: rewriting every row of '{}'", R::TABLE);
    let update = update_stmt::<R>(conn.get_database_backend(), changes);
    let affected = exec(conn, &update).await?;
    settings.maybe_failpoint("after_update_all")?;
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use tabula_core::{MutationRequest, Task};

    use super::{covers_required, prepare_update};

    #[test]
    fn requests_without_required_columns_are_partial() {
        let partial = prepare_update::<Task>(&MutationRequest::new().set("point", 5))
            .expect("changes");
        assert!(!covers_required::<Task>(&partial));
        let full = prepare_update::<Task>(&MutationRequest::new().set("name", "n"))
            .expect("changes");
        assert!(covers_required::<Task>(&full));
    }
}
