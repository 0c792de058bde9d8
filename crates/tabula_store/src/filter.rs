use sea_orm::sea_query::{Condition, Expr, ExprTrait};

use tabula_core::{FilterSpec, Record, TabulaError, TabulaResult, Value};

use crate::sql::{col, column_type, value_to_sea};

/// Translates a filter specification into a `WHERE` condition.
///
/// Every specification goes through the same OR-of-AND shape, so a bare
/// mapping and a one-element sequence render identically.
pub fn build_condition<R: Record>(filter: &FilterSpec) -> TabulaResult<Condition> {
    let groups = filter.groups::<R>()?;
    if groups.is_empty() {
        return Ok(Condition::all().add(Expr::cust("1 = 0")));
    }
    let mut any = Condition::any();
    for group in groups {
        let mut all = Condition::all();
        for (name, value) in group.iter() {
            let value_type = column_type::<R>(name).ok_or_else(|| {
                TabulaError::invalid_filter(format!("'{}' has no column '{name}'", R::TABLE))
            })?;
            all = match value {
                Value::Null => all.add(Expr::col(col(name)).is_null()),
                value => all.add(Expr::col(col(name)).eq(value_to_sea(value_type, value))),
            };
        }
        any = any.add(all);
    }
    Ok(any)
}
