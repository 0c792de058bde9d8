use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use crate::{TabulaError, TabulaResult, Timestamp, Value, ValueType, is_valid_id};

pub const ID_COLUMN: &str = "id";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Columns every record table carries on top of its declared ones.
pub const SYSTEM_COLUMNS: [&str; 3] = [ID_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN];

pub fn is_timestamp_column(name: &str) -> bool {
    name == CREATED_AT_COLUMN || name == UPDATED_AT_COLUMN
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnDefault {
    Str(&'static str),
    I64(i64),
    F64(f64),
    Bool(bool),
}

impl ColumnDefault {
    pub fn to_value(self) -> Value {
        match self {
            ColumnDefault::Str(value) => Value::Str(value.to_string()),
            ColumnDefault::I64(value) => Value::I64(value),
            ColumnDefault::F64(value) => Value::F64(value),
            ColumnDefault::Bool(value) => Value::Bool(value),
        }
    }
}

/// Declaration of one domain column of a record table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub value_type: ValueType,
    pub nullable: bool,
    pub max_len: Option<u32>,
    pub default: Option<ColumnDefault>,
}

impl Column {
    pub const fn new(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            nullable: false,
            max_len: None,
            default: None,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn max_len(mut self, max_len: u32) -> Self {
        self.max_len = Some(max_len);
        self
    }

    pub const fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Value to use when an insert leaves the column out.
    pub fn implicit_value(&self) -> Option<Value> {
        match self.default {
            Some(default) => Some(default.to_value()),
            None if self.nullable => Some(Value::Null),
            None => None,
        }
    }

    pub fn check(&self, value: &Value) -> TabulaResult<()> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(TabulaError::invalid(format!(
                "column '{}' is not nullable",
                self.name
            )));
        }
        if !value.fits(self.value_type) {
            return Err(TabulaError::invalid(format!(
                "column '{}' expects {}",
                self.name,
                self.value_type.name()
            )));
        }
        if let (Some(max_len), Value::Str(text)) = (self.max_len, value)
            && text.chars().count() > max_len as usize
        {
            return Err(TabulaError::invalid(format!(
                "column '{}' is limited to {max_len} characters",
                self.name
            )));
        }
        Ok(())
    }
}

/// Column name to value mapping, ordered by column name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields(BTreeMap<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn take_str(&mut self, name: &str) -> TabulaResult<String> {
        match self.take_opt_str(name)? {
            Some(value) => Ok(value),
            None => Err(TabulaError::invalid(format!("missing column '{name}'"))),
        }
    }

    pub fn take_opt_str(&mut self, name: &str) -> TabulaResult<Option<String>> {
        match self.0.remove(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Str(value)) => Ok(Some(value)),
            Some(_) => Err(TabulaError::invalid(format!("column '{name}' expects str"))),
        }
    }

    pub fn take_i64(&mut self, name: &str) -> TabulaResult<i64> {
        match self.take_opt_i64(name)? {
            Some(value) => Ok(value),
            None => Err(TabulaError::invalid(format!("missing column '{name}'"))),
        }
    }

    pub fn take_opt_i64(&mut self, name: &str) -> TabulaResult<Option<i64>> {
        match self.0.remove(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::I64(value)) => Ok(Some(value)),
            Some(_) => Err(TabulaError::invalid(format!("column '{name}' expects i64"))),
        }
    }

    pub fn take_timestamp(&mut self, name: &str) -> TabulaResult<Option<Timestamp>> {
        Ok(self.take_opt_i64(name)?.map(Timestamp::from_millis))
    }
}

impl IntoIterator for Fields {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// A persisted entity type: one table, an `id` primary key, declared domain
/// columns and the two store-managed timestamps.
pub trait Record: Clone + Send + Sync + Sized + 'static {
    const TABLE: &'static str;
    /// Domain columns only; `id` and the timestamps are implied.
    const COLUMNS: &'static [Column];

    fn id(&self) -> &str;

    fn created_at(&self) -> Option<Timestamp>;

    fn updated_at(&self) -> Option<Timestamp>;

    /// Builds an instance from `id`, every domain column and, when the fields
    /// were read back from the store, both timestamps.
    fn from_fields(fields: Fields) -> TabulaResult<Self>;

    /// `id` plus every domain column.
    fn to_fields(&self) -> Fields;

    /// Assigns one domain column. Callers have already checked the value
    /// against the column declaration.
    fn set_field(&mut self, name: &str, value: Value) -> TabulaResult<()>;

    fn column(name: &str) -> Option<&'static Column> {
        Self::COLUMNS.iter().find(|column| column.name == name)
    }

    fn column_names() -> Vec<&'static str> {
        let mut names = Vec::with_capacity(Self::COLUMNS.len() + SYSTEM_COLUMNS.len());
        names.push(ID_COLUMN);
        names.extend(Self::COLUMNS.iter().map(|column| column.name));
        names.push(CREATED_AT_COLUMN);
        names.push(UPDATED_AT_COLUMN);
        names
    }
}

pub fn check_id(value: &Value) -> TabulaResult<&str> {
    match value {
        Value::Str(id) if is_valid_id(id) => Ok(id),
        _ => Err(TabulaError::invalid("id must be a non-empty string of at most 64 characters")),
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, ColumnDefault, Fields, check_id};
    use crate::{Value, ValueType};

    #[test]
    fn column_check_enforces_null_type_and_length() {
        let name = Column::new("name", ValueType::Str).max_len(4);
        assert!(name.check(&Value::from("abcd")).is_ok());
        assert!(name.check(&Value::from("abcde")).is_err());
        assert!(name.check(&Value::Null).is_err());
        assert!(name.check(&Value::from(1)).is_err());
        let note = Column::new("note", ValueType::Str).nullable();
        assert!(note.check(&Value::Null).is_ok());
    }

    #[test]
    fn implicit_values_come_from_defaults_then_nullability() {
        let point = Column::new("point", ValueType::I64).default(ColumnDefault::I64(70));
        assert_eq!(point.implicit_value(), Some(Value::I64(70)));
        let note = Column::new("note", ValueType::Str).nullable();
        assert_eq!(note.implicit_value(), Some(Value::Null));
        let name = Column::new("name", ValueType::Str);
        assert_eq!(name.implicit_value(), None);
    }

    #[test]
    fn typed_takers_consume_fields() {
        let mut fields = Fields::new().with("name", "alpha").with("point", 3);
        assert_eq!(fields.take_str("name").expect("name"), "alpha");
        assert!(fields.take_str("name").is_err());
        assert!(fields.take_str("point").is_err());
        assert_eq!(fields.take_opt_i64("missing").expect("missing"), None);
    }

    #[test]
    fn ids_must_be_non_empty_strings() {
        assert!(check_id(&Value::from("a")).is_ok());
        assert!(check_id(&Value::from("")).is_err());
        assert!(check_id(&Value::from(1)).is_err());
    }
}
