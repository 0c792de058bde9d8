use std::collections::HashMap;

use sea_orm::ConnectionTrait;
use sea_orm::sea_query::{Alias, Expr, ExprTrait, Func, Order, Query, SelectStatement};

use tabula_core::{
    CREATED_AT_COLUMN, FilterSpec, ID_COLUMN, Record, SelectOptions, TabulaError, TabulaResult,
};

use crate::filter::build_condition;
use crate::sql::{all_columns, col, decode, decode_all, id_value, query_all, query_one, table};
use crate::store::StoreSettings;

fn select_all<R: Record>() -> SelectStatement {
    Query::select()
        .columns(all_columns::<R>())
        .from(table::<R>())
        .to_owned()
}

pub(crate) async fn fetch_by_id<C: ConnectionTrait, R: Record>(
    conn: &C,
    id: &str,
) -> TabulaResult<Option<R>> {
    let select = select_all::<R>()
        .and_where(Expr::col(col(ID_COLUMN)).eq(id_value(id)))
        .to_owned();
    let row = query_one(conn, &select).await?;
    row.as_ref().map(decode::<R>).transpose()
}

pub(crate) async fn get<C: ConnectionTrait, R: Record>(
    conn: &C,
    id: &str,
    allow_no_result: bool,
) -> TabulaResult<Option<R>> {
    let record = fetch_by_id::<C, R>(conn, id).await?;
    if record.is_none() && !allow_no_result {
        return Err(TabulaError::not_found(format!("{} '{id}'", R::TABLE)));
    }
    Ok(record)
}

pub(crate) async fn exists<C: ConnectionTrait, R: Record>(
    conn: &C,
    id: &str,
) -> TabulaResult<bool> {
    let select = Query::select()
        .column(col(ID_COLUMN))
        .from(table::<R>())
        .and_where(Expr::col(col(ID_COLUMN)).eq(id_value(id)))
        .limit(1)
        .to_owned();
    Ok(query_one(conn, &select).await?.is_some())
}

pub(crate) async fn select_by_filter<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    filter: &FilterSpec,
    options: SelectOptions,
) -> TabulaResult<Vec<R>> {
    let mut select = select_all::<R>()
        .cond_where(build_condition::<R>(filter)?)
        .order_by(col(CREATED_AT_COLUMN), Order::Asc)
        .order_by(col(ID_COLUMN), Order::Asc)
        .to_owned();
    if !options.disable_limit {
        select.limit(options.limit.unwrap_or(settings.default_select_limit));
    }
    let rows = query_all(conn, &select).await?;
    decode_all::<R>(&rows)
}

/// Rows for `ids`, in the order the ids were given. Ids without a row are
/// skipped. Long id lists are read `max_bulk_rows` at a time.
pub(crate) async fn select_by_ids<C: ConnectionTrait, R: Record>(
    conn: &C,
    settings: &StoreSettings,
    ids: &[String],
) -> TabulaResult<Vec<R>> {
    let mut by_id: HashMap<String, R> = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(settings.max_bulk_rows) {
        let select = select_all::<R>()
            .and_where(Expr::col(col(ID_COLUMN)).is_in(chunk.iter().map(|id| id_value(id))))
            .to_owned();
        let rows = query_all(conn, &select).await?;
        by_id.extend(
            decode_all::<R>(&rows)?
                .into_iter()
                .map(|record| (record.id().to_string(), record)),
        );
    }
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

pub(crate) async fn count_by_filter<C: ConnectionTrait, R: Record>(
    conn: &C,
    filter: &FilterSpec,
) -> TabulaResult<u64> {
    let select = Query::select()
        .expr_as(Func::count(Expr::col(col(ID_COLUMN))), Alias::new("total"))
        .from(table::<R>())
        .cond_where(build_condition::<R>(filter)?)
        .to_owned();
    let Some(row) = query_one(conn, &select).await? else {
        return Ok(0);
    };
    let total: i64 = row.try_get("", "total")?;
    Ok(u64::try_from(total).unwrap_or(0))
}
