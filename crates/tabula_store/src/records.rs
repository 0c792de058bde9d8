use std::marker::PhantomData;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseTransaction, TransactionTrait};

use tabula_core::{
    FilterSpec, InsertMode, MutationRequest, Record, RecordReadApi, RecordWriteApi,
    SelectOptions, TabulaError, TabulaResult, UpsertMode, WriteOptions, WriteOutcome,
};

use crate::mutation::{
    bulk_insert_on, insert_on, prepare_bulk, prepare_insert, prepare_save, prepare_update,
    prepare_upsert, save_on, update_all_on, update_by_filter_on, update_by_id_on,
    update_records_on, upsert_on,
};
use crate::read;
use crate::store::StoreSettings;
use crate::tx::write_scope;

/// Typed access to the table of `R` through one connection or transaction.
///
/// Requests are validated before a transaction is opened, so argument errors
/// never touch the store.
pub struct Records<'c, R, C> {
    conn: &'c C,
    settings: &'c StoreSettings,
    _record: PhantomData<fn() -> R>,
}

impl<'c, R, C> Records<'c, R, C>
where
    R: Record,
    C: ConnectionTrait + TransactionTrait<Transaction = DatabaseTransaction> + Send + Sync,
{
    pub(crate) fn new(conn: &'c C, settings: &'c StoreSettings) -> Self {
        Self {
            conn,
            settings,
            _record: PhantomData,
        }
    }

    /// Rows for `ids` in the given order; missing ids are skipped.
    pub async fn select_by_ids(&self, ids: &[String]) -> TabulaResult<Vec<R>> {
        read::select_by_ids::<C, R>(self.conn, self.settings, ids).await
    }
}

impl<R, C> Clone for Records<'_, R, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, C> Copy for Records<'_, R, C> {}

#[async_trait]
impl<R, C> RecordReadApi<R> for Records<'_, R, C>
where
    R: Record,
    C: ConnectionTrait + TransactionTrait<Transaction = DatabaseTransaction> + Send + Sync,
{
    async fn get(&self, id: &str, allow_no_result: bool) -> TabulaResult<Option<R>> {
        read::get::<C, R>(self.conn, id, allow_no_result).await
    }

    async fn exists(&self, id: &str) -> TabulaResult<bool> {
        read::exists::<C, R>(self.conn, id).await
    }

    async fn select_by_filter(
        &self,
        filter: &FilterSpec,
        options: SelectOptions,
    ) -> TabulaResult<Vec<R>> {
        read::select_by_filter::<C, R>(self.conn, self.settings, filter, options).await
    }

    async fn count_by_filter(&self, filter: &FilterSpec) -> TabulaResult<u64> {
        read::count_by_filter::<C, R>(self.conn, filter).await
    }
}

#[async_trait]
impl<R, C> RecordWriteApi<R> for Records<'_, R, C>
where
    R: Record,
    C: ConnectionTrait + TransactionTrait<Transaction = DatabaseTransaction> + Send + Sync,
{
    async fn insert(
        &self,
        request: MutationRequest,
        mode: InsertMode,
        options: WriteOptions,
    ) -> TabulaResult<WriteOutcome<R>> {
        let prepared = prepare_insert::<R>(&request, mode)?;
        let settings = self.settings;
        write_scope!(self.conn, options.auto_commit, "insert", |conn| {
            insert_on(conn, settings, prepared, options)
        })
    }

    async fn save(
        &self,
        record: R,
        overrides: MutationRequest,
        options: WriteOptions,
    ) -> TabulaResult<R> {
        let record = prepare_save(record, &overrides)?;
        let settings = self.settings;
        write_scope!(self.conn, options.auto_commit, "save", |conn| {
            save_on(conn, settings, record, options)
        })
    }

    async fn upsert(
        &self,
        request: MutationRequest,
        mode: UpsertMode,
        options: WriteOptions,
    ) -> TabulaResult<WriteOutcome<R>> {
        let prepared = prepare_upsert::<R>(request)?;
        let settings = self.settings;
        write_scope!(self.conn, options.auto_commit, "upsert", |conn| {
            upsert_on::<_, R>(conn, settings, prepared, mode, options)
        })
    }

    async fn bulk_insert(
        &self,
        requests: Vec<MutationRequest>,
        options: WriteOptions,
    ) -> TabulaResult<WriteOutcome<Vec<R>>> {
        let prepared = prepare_bulk::<R>(&requests)?;
        let settings = self.settings;
        write_scope!(self.conn, options.auto_commit, "bulk insert", |conn| {
            bulk_insert_on::<_, R>(conn, settings, prepared, options)
        })
    }

    async fn update(
        &self,
        record: R,
        request: MutationRequest,
        options: WriteOptions,
    ) -> TabulaResult<R> {
        let mut updated = self.update_records(vec![record], request, options).await?;
        updated
            .pop()
            .ok_or_else(|| TabulaError::storage("updated row was not returned"))
    }

    async fn update_records(
        &self,
        records: Vec<R>,
        request: MutationRequest,
        options: WriteOptions,
    ) -> TabulaResult<Vec<R>> {
        let changes = prepare_update::<R>(&request)?;
        let settings = self.settings;
        write_scope!(self.conn, options.auto_commit, "update", |conn| {
            update_records_on(conn, settings, records, &changes, options)
        })
    }

    async fn update_by_id(
        &self,
        id: &str,
        request: MutationRequest,
        check_exists: bool,
        options: WriteOptions,
    ) -> TabulaResult<Option<R>> {
        let changes = prepare_update::<R>(&request)?;
        let settings = self.settings;
        write_scope!(self.conn, options.auto_commit, "update by id", |conn| {
            update_by_id_on::<_, R>(conn, settings, id, &changes, check_exists, options)
        })
    }

    async fn update_by_filter(
        &self,
        filter: &FilterSpec,
        request: MutationRequest,
        check_exists: bool,
        options: WriteOptions,
    ) -> TabulaResult<WriteOutcome<Vec<R>>> {
        filter.groups::<R>()?;
        let changes = prepare_update::<R>(&request)?;
        let settings = self.settings;
        write_scope!(self.conn, options.auto_commit, "update by filter", |conn| {
            update_by_filter_on::<_, R>(conn, settings, filter, &changes, check_exists, options)
        })
    }

    async fn update_all(
        &self,
        request: MutationRequest,
        options: WriteOptions,
    ) -> TabulaResult<u64> {
        let changes = prepare_update::<R>(&request)?;
        let settings = self.settings;
        write_scope!(self.conn, options.auto_commit, "update all", |conn| {
            update_all_on::<_, R>(conn, settings, &changes)
        })
    }
}
