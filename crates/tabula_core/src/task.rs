use serde::{Deserialize, Serialize};

use crate::{
    Column, ColumnDefault, Fields, ID_COLUMN, Record, TabulaError, TabulaResult, Timestamp, Value,
    ValueType,
};

pub const TASK_TABLE: &str = "tabula_task";
pub const DEFAULT_TASK_POINT: i64 = 70;

const TASK_COLUMNS: &[Column] = &[
    Column::new("name", ValueType::Str).max_len(64),
    Column::new("point", ValueType::I64).default(ColumnDefault::I64(DEFAULT_TASK_POINT)),
    Column::new("note", ValueType::Str).nullable(),
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub point: i64,
    pub note: Option<String>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl Record for Task {
    const TABLE: &'static str = TASK_TABLE;
    const COLUMNS: &'static [Column] = TASK_COLUMNS;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<Timestamp> {
        self.created_at
    }

    fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }

    fn from_fields(mut fields: Fields) -> TabulaResult<Self> {
        Ok(Self {
            id: fields.take_str(ID_COLUMN)?,
            name: fields.take_str("name")?,
            point: fields.take_i64("point")?,
            note: fields.take_opt_str("note")?,
            created_at: fields.take_timestamp("created_at")?,
            updated_at: fields.take_timestamp("updated_at")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with(ID_COLUMN, self.id.as_str())
            .with("name", self.name.as_str())
            .with("point", self.point)
            .with(
                "note",
                self.note.clone().map(Value::Str).unwrap_or(Value::Null),
            )
    }

    fn set_field(&mut self, name: &str, value: Value) -> TabulaResult<()> {
        match (name, value) {
            ("name", Value::Str(name)) => self.name = name,
            ("point", Value::I64(point)) => self.point = point,
            ("note", Value::Str(note)) => self.note = Some(note),
            ("note", Value::Null) => self.note = None,
            (name, _) => {
                return Err(TabulaError::invalid(format!(
                    "cannot assign '{name}' on '{TASK_TABLE}'"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Task;
    use crate::{Fields, Record, Value};

    #[test]
    fn builds_from_fields_and_back() {
        let fields = Fields::new()
            .with("id", "t1")
            .with("name", "write docs")
            .with("point", 70)
            .with("note", Value::Null)
            .with("created_at", 5)
            .with("updated_at", 6);
        let task = Task::from_fields(fields).expect("task");
        assert_eq!(task.note, None);
        assert_eq!(task.created_at.map(|ts| ts.as_millis()), Some(5));
        let back = task.to_fields();
        assert_eq!(back.get("name"), Some(&Value::from("write docs")));
        assert!(!back.contains("created_at"));
    }

    #[test]
    fn set_field_rejects_undeclared_columns() {
        let mut task = Task::from_fields(
            Fields::new()
                .with("id", "t1")
                .with("name", "a")
                .with("point", 1),
        )
        .expect("task");
        assert!(task.set_field("id", Value::from("t2")).is_err());
        task.set_field("note", Value::from("n")).expect("note");
        assert_eq!(task.note.as_deref(), Some("n"));
    }
}
