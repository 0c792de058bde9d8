use serde::{Deserialize, Serialize};

use crate::{Fields, ID_COLUMN, Record, TabulaError, TabulaResult, ValueType, is_timestamp_column};

/// Declarative row selection.
///
/// `All` is a conjunction of equality conditions. `Any` is a disjunction of
/// such conjunctions. `All(m)` and `Any(vec![m])` select the same rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    All(Fields),
    Any(Vec<Fields>),
}

impl FilterSpec {
    pub fn eq(name: impl Into<String>, value: impl Into<crate::Value>) -> Self {
        FilterSpec::All(Fields::new().with(name, value))
    }

    /// Validated AND-groups to be OR-ed together. No groups means no rows.
    ///
    /// An empty mapping, alone or inside a sequence, would select the whole
    /// table and is refused.
    pub fn groups<R: Record>(&self) -> TabulaResult<Vec<&Fields>> {
        let groups: Vec<&Fields> = match self {
            FilterSpec::All(fields) => vec![fields],
            FilterSpec::Any(groups) => groups.iter().collect(),
        };
        for group in &groups {
            if group.is_empty() {
                return Err(TabulaError::invalid_filter(format!(
                    "empty condition mapping for '{}'",
                    R::TABLE
                )));
            }
            for (name, value) in group.iter() {
                let expected = if name == ID_COLUMN {
                    ValueType::Str
                } else if is_timestamp_column(name) {
                    ValueType::I64
                } else {
                    R::column(name)
                        .ok_or_else(|| {
                            TabulaError::invalid_filter(format!(
                                "'{}' has no column '{name}'",
                                R::TABLE
                            ))
                        })?
                        .value_type
                };
                if !value.fits(expected) {
                    return Err(TabulaError::invalid_filter(format!(
                        "'{name}' expects {}",
                        expected.name()
                    )));
                }
            }
        }
        Ok(groups)
    }
}

impl From<Fields> for FilterSpec {
    fn from(fields: Fields) -> Self {
        FilterSpec::All(fields)
    }
}

impl From<Vec<Fields>> for FilterSpec {
    fn from(groups: Vec<Fields>) -> Self {
        FilterSpec::Any(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::FilterSpec;
    use crate::{Fields, TabulaError, Task};

    #[test]
    fn empty_sequence_selects_nothing() {
        let spec = FilterSpec::Any(vec![]);
        assert!(spec.groups::<Task>().expect("groups").is_empty());
    }

    #[test]
    fn empty_mapping_is_ambiguous() {
        let err = FilterSpec::All(Fields::new()).groups::<Task>().unwrap_err();
        assert!(matches!(err, TabulaError::InvalidFilter { .. }));
        let err = FilterSpec::Any(vec![Fields::new().with("name", "a"), Fields::new()])
            .groups::<Task>()
            .unwrap_err();
        assert!(matches!(err, TabulaError::InvalidFilter { .. }));
    }

    #[test]
    fn unknown_columns_and_mismatched_values_are_rejected() {
        assert!(FilterSpec::eq("colour", "red").groups::<Task>().is_err());
        assert!(FilterSpec::eq("point", "high").groups::<Task>().is_err());
        assert!(FilterSpec::eq("id", "abc").groups::<Task>().is_ok());
        assert!(FilterSpec::eq("created_at", 0).groups::<Task>().is_ok());
    }

    #[test]
    fn deserializes_mapping_and_sequence_forms() {
        let single: FilterSpec =
            serde_json::from_value(serde_json::json!({ "name": { "Str": "a" } })).expect("map");
        assert!(matches!(single, FilterSpec::All(_)));
        let many: FilterSpec = serde_json::from_value(serde_json::json!([
            { "name": { "Str": "a" } },
            { "point": { "I64": 3 } }
        ]))
        .expect("seq");
        match many {
            FilterSpec::Any(groups) => assert_eq!(groups.len(), 2),
            other => panic!("expected sequence, got {other:?}"),
        }
    }
}
