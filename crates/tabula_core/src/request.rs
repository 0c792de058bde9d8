use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    Column, Fields, ID_COLUMN, Record, TabulaError, TabulaResult, Value, check_id,
    is_timestamp_column,
};

/// Desired write, keyed by column name.
///
/// `None` marks a field as unset: updates leave the column untouched and
/// inserts fall back to the column default. `Some(Value::Null)` writes SQL NULL.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    fields: BTreeMap<String, Option<Value>>,
}

impl MutationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), Some(value.into()));
        self
    }

    pub fn set_opt<V: Into<Value>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.fields.insert(name.into(), value.map(Into::into));
        self
    }

    pub fn set_null(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), Some(Value::Null));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<Value>) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Option<Value>> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// The requested id, if one was given with a value.
    pub fn id(&self) -> Option<&str> {
        match self.fields.get(ID_COLUMN) {
            Some(Some(Value::Str(id))) => Some(id),
            _ => None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.fields
            .insert(ID_COLUMN.to_string(), Some(Value::Str(id.into())));
        self
    }

    /// Rejects empty requests and anything the record does not declare,
    /// before any statement is built.
    pub fn validate<R: Record>(&self) -> TabulaResult<()> {
        if self.fields.is_empty() {
            return Err(TabulaError::invalid(format!(
                "no data provided for '{}'",
                R::TABLE
            )));
        }
        self.validate_entries::<R>()
    }

    /// Same as [`validate`](Self::validate) but an empty request is allowed.
    pub fn validate_entries<R: Record>(&self) -> TabulaResult<()> {
        for (name, value) in &self.fields {
            if name == ID_COLUMN {
                if let Some(value) = value {
                    check_id(value)?;
                }
                continue;
            }
            if is_timestamp_column(name) {
                return Err(TabulaError::invalid(format!(
                    "'{name}' is managed by the store"
                )));
            }
            let column = R::column(name).ok_or_else(|| {
                TabulaError::invalid(format!("'{}' has no column '{name}'", R::TABLE))
            })?;
            if let Some(value) = value {
                column.check(value)?;
            }
        }
        Ok(())
    }

    /// Domain columns that carry a value, in column-name order. `id` and
    /// unset fields are left out.
    pub fn changes<R: Record>(&self) -> Vec<(&'static Column, Value)> {
        self.fields
            .iter()
            .filter(|(name, _)| name.as_str() != ID_COLUMN)
            .filter_map(|(name, value)| {
                let value = value.clone()?;
                R::column(name).map(|column| (column, value))
            })
            .collect()
    }
}

impl From<Fields> for MutationRequest {
    fn from(fields: Fields) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| (name, Some(value)))
                .collect(),
        }
    }
}
