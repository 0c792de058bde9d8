use sea_orm::DeriveIden;

pub const STAT_TABLE: &str = "tabula_table_stat";

#[derive(DeriveIden, Clone, Copy)]
pub enum TabulaTableStat {
    Table,
    Id,
    TableName,
    InsertCount,
    DeleteCount,
    RowCount,
    CreatedAt,
    UpdatedAt,
}
