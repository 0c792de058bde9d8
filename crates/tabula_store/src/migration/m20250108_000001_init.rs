use sea_orm_migration::prelude::*;

use tabula_core::{MAX_ID_LEN, Task};

use crate::db::{STAT_TABLE, TabulaTableStat};
use crate::sql::col_name;

use super::record_table::{
    create_record_table, create_row_triggers, created_at_index_name, drop_functions,
    drop_record_table, timestamp_def,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();

        manager
            .create_table(
                Table::create()
                    .table(TabulaTableStat::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TabulaTableStat::Id)
                            .string_len(MAX_ID_LEN as u32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TabulaTableStat::TableName)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(TabulaTableStat::InsertCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TabulaTableStat::DeleteCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TabulaTableStat::RowCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(timestamp_def(backend, &col_name(TabulaTableStat::CreatedAt)))
                    .col(timestamp_def(backend, &col_name(TabulaTableStat::UpdatedAt)))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name(created_at_index_name(STAT_TABLE))
                    .table(TabulaTableStat::Table)
                    .col(TabulaTableStat::CreatedAt)
                    .to_owned(),
            )
            .await?;

        create_record_table::<Task>(manager).await?;
        create_row_triggers(manager, STAT_TABLE).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_record_table::<Task>(manager).await?;
        manager
            .drop_table(
                Table::drop()
                    .table(TabulaTableStat::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        drop_functions(manager).await
    }
}
