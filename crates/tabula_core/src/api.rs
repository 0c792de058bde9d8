use async_trait::async_trait;

use crate::{
    FilterSpec, InsertMode, MutationRequest, Record, SelectOptions, TabulaResult, UpsertMode,
    WriteOptions, WriteOutcome,
};

#[async_trait]
pub trait RecordReadApi<R: Record>: Send + Sync {
    /// `allow_no_result = false` turns a missing row into `NotFound`.
    async fn get(&self, id: &str, allow_no_result: bool) -> TabulaResult<Option<R>>;

    async fn exists(&self, id: &str) -> TabulaResult<bool>;

    async fn select_by_filter(
        &self,
        filter: &FilterSpec,
        options: SelectOptions,
    ) -> TabulaResult<Vec<R>>;

    async fn count_by_filter(&self, filter: &FilterSpec) -> TabulaResult<u64>;
}

#[async_trait]
pub trait RecordWriteApi<R: Record>: RecordReadApi<R> {
    async fn insert(
        &self,
        request: MutationRequest,
        mode: InsertMode,
        options: WriteOptions,
    ) -> TabulaResult<WriteOutcome<R>>;

    async fn save(
        &self,
        record: R,
        overrides: MutationRequest,
        options: WriteOptions,
    ) -> TabulaResult<R>;

    async fn upsert(
        &self,
        request: MutationRequest,
        mode: UpsertMode,
        options: WriteOptions,
    ) -> TabulaResult<WriteOutcome<R>>;

    async fn bulk_insert(
        &self,
        requests: Vec<MutationRequest>,
        options: WriteOptions,
    ) -> TabulaResult<WriteOutcome<Vec<R>>>;

    async fn update(
        &self,
        record: R,
        request: MutationRequest,
        options: WriteOptions,
    ) -> TabulaResult<R>;

    async fn update_records(
        &self,
        records: Vec<R>,
        request: MutationRequest,
        options: WriteOptions,
    ) -> TabulaResult<Vec<R>>;

    /// Without `check_exists` a missing row yields `Ok(None)`.
    async fn update_by_id(
        &self,
        id: &str,
        request: MutationRequest,
        check_exists: bool,
        options: WriteOptions,
    ) -> TabulaResult<Option<R>>;

    async fn update_by_filter(
        &self,
        filter: &FilterSpec,
        request: MutationRequest,
        check_exists: bool,
        options: WriteOptions,
    ) -> TabulaResult<WriteOutcome<Vec<R>>>;

    /// Rewrites every row of the table. There is no filter and no confirmation.
    async fn update_all(&self, request: MutationRequest, options: WriteOptions)
    -> TabulaResult<u64>;
}
