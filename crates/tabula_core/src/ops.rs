use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Commit (or roll back) inside the call. When false the caller owns the
    /// transaction boundary.
    pub auto_commit: bool,
    /// Re-read the persisted row(s) after writing.
    pub returning: bool,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deferred(mut self) -> Self {
        self.auto_commit = false;
        self
    }

    pub fn without_returning(mut self) -> Self {
        self.returning = false;
        self
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            auto_commit: true,
            returning: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum InsertMode {
    /// Build the record in memory first, applying declared defaults.
    Construct,
    /// Insert only the supplied fields and let the store fill the rest.
    #[default]
    Statement,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum UpsertMode {
    /// Look the id up, then update or insert.
    CheckThenWrite,
    /// One `INSERT .. ON CONFLICT (id) DO UPDATE` statement.
    #[default]
    OnConflict,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SelectOptions {
    pub disable_limit: bool,
    pub limit: Option<u64>,
}

impl SelectOptions {
    pub fn unbounded() -> Self {
        Self {
            disable_limit: true,
            limit: None,
        }
    }

    pub fn limit(limit: u64) -> Self {
        Self {
            disable_limit: false,
            limit: Some(limit),
        }
    }
}

/// Materialized rows when the call asked for them, otherwise the driver's
/// affected-row count.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOutcome<T> {
    Returned(T),
    Affected(u64),
}

impl<T> WriteOutcome<T> {
    pub fn returned(self) -> Option<T> {
        match self {
            WriteOutcome::Returned(value) => Some(value),
            WriteOutcome::Affected(_) => None,
        }
    }

    pub fn as_returned(&self) -> Option<&T> {
        match self {
            WriteOutcome::Returned(value) => Some(value),
            WriteOutcome::Affected(_) => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            WriteOutcome::Returned(_) => None,
            WriteOutcome::Affected(count) => Some(*count),
        }
    }
}
