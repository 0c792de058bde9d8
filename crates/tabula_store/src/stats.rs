use sea_orm::QueryResult;
use sea_orm::sea_query::{Expr, ExprTrait, Order, Query, SelectStatement};
use serde::{Deserialize, Serialize};

use tabula_core::{TabulaResult, Timestamp};

use crate::TabulaStore;
use crate::db::TabulaTableStat;
use crate::sql::{col_name, query_all, query_one};

/// Row counters the store's triggers keep per record table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStat {
    pub id: String,
    pub table_name: String,
    pub insert_count: i64,
    pub delete_count: i64,
    pub row_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn select_stats() -> SelectStatement {
    Query::select()
        .columns([
            TabulaTableStat::Id,
            TabulaTableStat::TableName,
            TabulaTableStat::InsertCount,
            TabulaTableStat::DeleteCount,
            TabulaTableStat::RowCount,
            TabulaTableStat::CreatedAt,
            TabulaTableStat::UpdatedAt,
        ])
        .from(TabulaTableStat::Table)
        .to_owned()
}

fn read_stat(row: &QueryResult) -> TabulaResult<TableStat> {
    Ok(TableStat {
        id: row.try_get("", &col_name(TabulaTableStat::Id))?,
        table_name: row.try_get("", &col_name(TabulaTableStat::TableName))?,
        insert_count: row.try_get("", &col_name(TabulaTableStat::InsertCount))?,
        delete_count: row.try_get("", &col_name(TabulaTableStat::DeleteCount))?,
        row_count: row.try_get("", &col_name(TabulaTableStat::RowCount))?,
        created_at: Timestamp::from_millis(
            row.try_get("", &col_name(TabulaTableStat::CreatedAt))?,
        ),
        updated_at: Timestamp::from_millis(
            row.try_get("", &col_name(TabulaTableStat::UpdatedAt))?,
        ),
    })
}

impl TabulaStore {
    pub async fn table_stat(&self, table_name: &str) -> TabulaResult<Option<TableStat>> {
        let select = select_stats()
            .and_where(Expr::col(TabulaTableStat::TableName).eq(table_name))
            .to_owned();
        let row = query_one(self.connection(), &select).await?;
        row.as_ref().map(read_stat).transpose()
    }

    pub async fn table_stats(&self) -> TabulaResult<Vec<TableStat>> {
        let select = select_stats()
            .order_by(TabulaTableStat::TableName, Order::Asc)
            .to_owned();
        let rows = query_all(self.connection(), &select).await?;
        rows.iter().map(read_stat).collect()
    }
}
