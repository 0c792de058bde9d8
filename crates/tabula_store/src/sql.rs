use sea_orm::sea_query::{
    Alias, MysqlQueryBuilder, PostgresQueryBuilder, QueryStatementWriter, SqliteQueryBuilder,
    Value as SeaValue,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, QueryResult, Statement};

use tabula_core::{
    CREATED_AT_COLUMN, Fields, ID_COLUMN, Record, TabulaError, TabulaResult, UPDATED_AT_COLUMN,
    Value, ValueType,
};

/// Store clock in epoch milliseconds, as a parenthesized SQL expression usable
/// both as a column default and on the right of `SET`.
pub(crate) fn now_expr(backend: DatabaseBackend) -> &'static str {
    match backend {
        DatabaseBackend::Postgres => {
            "(CAST(EXTRACT(EPOCH FROM clock_timestamp()) * 1000 AS BIGINT))"
        }
        DatabaseBackend::MySql => "(CAST(UNIX_TIMESTAMP(NOW(3)) * 1000 AS SIGNED))",
        _ => "(CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))",
    }
}

pub(crate) fn table<R: Record>() -> Alias {
    Alias::new(R::TABLE)
}

pub(crate) fn col(name: &str) -> Alias {
    Alias::new(name)
}

pub(crate) fn all_columns<R: Record>() -> Vec<Alias> {
    R::column_names().into_iter().map(col).collect()
}

pub(crate) fn col_name(column: impl sea_orm::sea_query::Iden) -> String {
    column.to_string()
}

/// Type of a column as the store sees it, system columns included.
pub(crate) fn column_type<R: Record>(name: &str) -> Option<ValueType> {
    if name == ID_COLUMN {
        return Some(ValueType::Str);
    }
    if name == CREATED_AT_COLUMN || name == UPDATED_AT_COLUMN {
        return Some(ValueType::I64);
    }
    R::column(name).map(|column| column.value_type)
}

pub(crate) fn value_to_sea(value_type: ValueType, value: &Value) -> SeaValue {
    match (value_type, value) {
        (ValueType::Str, Value::Str(text)) => SeaValue::String(Some(text.clone())),
        (ValueType::Str, _) => SeaValue::String(None),
        (ValueType::I64, Value::I64(number)) => SeaValue::BigInt(Some(*number)),
        (ValueType::I64, _) => SeaValue::BigInt(None),
        (ValueType::F64, Value::F64(number)) => SeaValue::Double(Some(*number)),
        (ValueType::F64, Value::I64(number)) => SeaValue::Double(Some(*number as f64)),
        (ValueType::F64, _) => SeaValue::Double(None),
        (ValueType::Bool, Value::Bool(flag)) => SeaValue::Bool(Some(*flag)),
        (ValueType::Bool, _) => SeaValue::Bool(None),
        (ValueType::Json, Value::Json(json)) => SeaValue::String(Some(json.to_string())),
        (ValueType::Json, _) => SeaValue::String(None),
    }
}

pub(crate) fn id_value(id: &str) -> SeaValue {
    SeaValue::String(Some(id.to_string()))
}

fn read_value(row: &QueryResult, name: &str, value_type: ValueType) -> TabulaResult<Value> {
    let value = match value_type {
        ValueType::Str => row.try_get::<Option<String>>("", name)?.map(Value::Str),
        ValueType::I64 => row.try_get::<Option<i64>>("", name)?.map(Value::I64),
        ValueType::F64 => row.try_get::<Option<f64>>("", name)?.map(Value::F64),
        ValueType::Bool => row.try_get::<Option<bool>>("", name)?.map(Value::Bool),
        ValueType::Json => row
            .try_get::<Option<String>>("", name)?
            .map(|raw| {
                serde_json::from_str(&raw)
                    .map(Value::Json)
                    .map_err(|err| TabulaError::storage(format!("decode json '{name}': {err}")))
            })
            .transpose()?,
    };
    Ok(value.unwrap_or(Value::Null))
}

pub(crate) fn read_fields<R: Record>(row: &QueryResult) -> TabulaResult<Fields> {
    let mut fields = Fields::new();
    let id: String = row.try_get("", ID_COLUMN)?;
    fields.insert(ID_COLUMN, id);
    for column in R::COLUMNS {
        fields.insert(column.name, read_value(row, column.name, column.value_type)?);
    }
    for name in [CREATED_AT_COLUMN, UPDATED_AT_COLUMN] {
        let millis: i64 = row.try_get("", name)?;
        fields.insert(name, millis);
    }
    Ok(fields)
}

pub(crate) fn decode<R: Record>(row: &QueryResult) -> TabulaResult<R> {
    R::from_fields(read_fields::<R>(row)?)
}

pub(crate) fn decode_all<R: Record>(rows: &[QueryResult]) -> TabulaResult<Vec<R>> {
    rows.iter().map(decode::<R>).collect()
}

pub(crate) fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
        _ => stmt.build(SqliteQueryBuilder),
    }
}

/// Executes a statement and returns the affected-row count.
pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> TabulaResult<u64>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let result = conn
        .execute_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> TabulaResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let rows = conn
        .query_all_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(rows)
}

pub(crate) async fn query_one<C, S>(conn: &C, stmt: &S) -> TabulaResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let row = conn
        .query_one_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use sea_orm::sea_query::Value as SeaValue;
    use tabula_core::{Task, Value, ValueType};

    use super::{column_type, value_to_sea};

    #[test]
    fn converts_values_with_typed_nulls() {
        assert_eq!(
            value_to_sea(ValueType::Str, &Value::Null),
            SeaValue::String(None)
        );
        assert_eq!(
            value_to_sea(ValueType::F64, &Value::I64(2)),
            SeaValue::Double(Some(2.0))
        );
        assert_eq!(
            value_to_sea(ValueType::Json, &Value::Json(serde_json::json!({ "a": 1 }))),
            SeaValue::String(Some("{\"a\":1}".to_string()))
        );
    }

    #[test]
    fn resolves_system_and_domain_column_types() {
        assert_eq!(column_type::<Task>("id"), Some(ValueType::Str));
        assert_eq!(column_type::<Task>("updated_at"), Some(ValueType::I64));
        assert_eq!(column_type::<Task>("point"), Some(ValueType::I64));
        assert_eq!(column_type::<Task>("colour"), None);
    }
}
