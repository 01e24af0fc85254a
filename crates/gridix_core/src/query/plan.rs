//! Binding and access planning.
//!
//! Binding resolves field names to entry columns and substitutes
//! parameters, rejecting literals that do not fit the declared field type.
//! Planning picks one access path from the top-level conjunction:
//! key equality, then indexed field equality, then key range, then indexed
//! field range. Without a usable range, an `ORDER BY` on the key or an
//! indexed field is served by scanning that index; otherwise the plan
//! scans every key. The bound predicate is always re-applied to the rows
//! the access path yields.

use crate::error::{CoreError, CoreResult};
use crate::index::{IndexEntry, ValueRange};
use crate::query::ast::{CompareOp, Expr, Operand};
use crate::schema::{FieldType, TypeDescriptor, KEY_FIELD, VALUE_FIELD};
use gridix_codec::Value;
use std::ops::Bound;

static NULL: Value = Value::Null;

/// A value readable from an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Column {
    Key,
    Value,
    Field(usize),
}

impl Column {
    /// Resolves a field name, including the `_key` and `_val` pseudo fields.
    pub(crate) fn resolve(descriptor: &TypeDescriptor, name: &str) -> CoreResult<Self> {
        if name.eq_ignore_ascii_case(KEY_FIELD) {
            Ok(Column::Key)
        } else if name.eq_ignore_ascii_case(VALUE_FIELD) {
            Ok(Column::Value)
        } else {
            descriptor.field_index(name).map(Column::Field).ok_or_else(|| {
                CoreError::schema(format!(
                    "type '{}' has no field '{name}'",
                    descriptor.name
                ))
            })
        }
    }

    /// Reads the column. Returns `None` for the value of a swapped entry.
    pub(crate) fn read(self, entry: &IndexEntry) -> Option<&Value> {
        match self {
            Column::Key => Some(entry.key()),
            Column::Value => entry.value(),
            Column::Field(index) => entry.field(index),
        }
    }

    pub(crate) fn name(self, descriptor: &TypeDescriptor) -> String {
        match self {
            Column::Key => KEY_FIELD.to_string(),
            Column::Value => VALUE_FIELD.to_string(),
            Column::Field(index) => descriptor
                .fields
                .get(index)
                .map(|field| field.name.clone())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn field_type(self, descriptor: &TypeDescriptor) -> FieldType {
        match self {
            Column::Field(index) => descriptor
                .fields
                .get(index)
                .map_or(FieldType::Any, |field| field.field_type),
            Column::Key | Column::Value => FieldType::Any,
        }
    }

    fn is_indexed(self, descriptor: &TypeDescriptor) -> bool {
        match self {
            Column::Key => true,
            Column::Value => false,
            Column::Field(index) => descriptor.fields.get(index).is_some_and(|f| f.indexed),
        }
    }
}

/// Predicate bound to columns, evaluated with SQL three-valued logic.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Compare {
        column: Column,
        op: CompareOp,
        value: Value,
    },
    Between {
        column: Column,
        low: Value,
        high: Value,
        negated: bool,
    },
    In {
        column: Column,
        list: Vec<Value>,
        negated: bool,
    },
    IsNull {
        column: Column,
        negated: bool,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluates the condition; `None` is SQL `UNKNOWN`.
    pub(crate) fn eval(&self, entry: &IndexEntry) -> Option<bool> {
        match self {
            Condition::Compare { column, op, value } => {
                let current = non_null(column.read(entry))?;
                if value.is_null() {
                    return None;
                }
                Some(op.holds(current.cmp(value)))
            }
            Condition::Between {
                column,
                low,
                high,
                negated,
            } => {
                let current = non_null(column.read(entry))?;
                if low.is_null() || high.is_null() {
                    return None;
                }
                let inside = current >= low && current <= high;
                Some(inside != *negated)
            }
            Condition::In {
                column,
                list,
                negated,
            } => {
                let current = non_null(column.read(entry))?;
                if list.contains(current) {
                    Some(!negated)
                } else if list.iter().any(Value::is_null) {
                    None
                } else {
                    Some(*negated)
                }
            }
            Condition::IsNull { column, negated } => {
                let is_null = column.read(entry).map_or(true, Value::is_null);
                Some(is_null != *negated)
            }
            Condition::And(left, right) => match (left.eval(entry), right.eval(entry)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Condition::Or(left, right) => match (left.eval(entry), right.eval(entry)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Condition::Not(inner) => inner.eval(entry).map(|b| !b),
        }
    }

    /// Returns true if the condition holds (not false, not unknown).
    pub(crate) fn matches(&self, entry: &IndexEntry) -> bool {
        self.eval(entry) == Some(true)
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Binds a parsed predicate against a descriptor.
pub(crate) fn bind(
    expr: &Expr,
    descriptor: &TypeDescriptor,
    params: &[Value],
) -> CoreResult<Condition> {
    let binder = Binder { descriptor, params };
    binder.bind(expr)
}

struct Binder<'a> {
    descriptor: &'a TypeDescriptor,
    params: &'a [Value],
}

impl Binder<'_> {
    fn bind(&self, expr: &Expr) -> CoreResult<Condition> {
        Ok(match expr {
            Expr::Compare { field, op, operand } => {
                let column = self.column(field)?;
                Condition::Compare {
                    column,
                    op: *op,
                    value: self.value(column, operand)?,
                }
            }
            Expr::Between {
                field,
                low,
                high,
                negated,
            } => {
                let column = self.column(field)?;
                Condition::Between {
                    column,
                    low: self.value(column, low)?,
                    high: self.value(column, high)?,
                    negated: *negated,
                }
            }
            Expr::In {
                field,
                list,
                negated,
            } => {
                let column = self.column(field)?;
                Condition::In {
                    column,
                    list: list
                        .iter()
                        .map(|operand| self.value(column, operand))
                        .collect::<CoreResult<_>>()?,
                    negated: *negated,
                }
            }
            Expr::IsNull { field, negated } => Condition::IsNull {
                column: self.column(field)?,
                negated: *negated,
            },
            Expr::And(left, right) => {
                Condition::And(Box::new(self.bind(left)?), Box::new(self.bind(right)?))
            }
            Expr::Or(left, right) => {
                Condition::Or(Box::new(self.bind(left)?), Box::new(self.bind(right)?))
            }
            Expr::Not(inner) => Condition::Not(Box::new(self.bind(inner)?)),
        })
    }

    fn column(&self, field: &str) -> CoreResult<Column> {
        match Column::resolve(self.descriptor, field)? {
            Column::Value => Err(CoreError::schema(format!(
                "'{VALUE_FIELD}' cannot be used in a predicate"
            ))),
            column => Ok(column),
        }
    }

    fn value(&self, column: Column, operand: &Operand) -> CoreResult<Value> {
        let value = match operand {
            Operand::Literal(value) => value.clone(),
            Operand::Param(index) => self.params.get(*index).cloned().ok_or_else(|| {
                CoreError::parse(format!("missing value for parameter {}", index + 1), 0)
            })?,
        };
        let field_type = column.field_type(self.descriptor);
        if !field_type.accepts(&value) {
            return Err(CoreError::schema(format!(
                "field '{}' of type '{}' is {field_type}, cannot compare with {}",
                column.name(self.descriptor),
                self.descriptor.name,
                value.kind_name()
            )));
        }
        Ok(value)
    }
}

/// How rows are fetched from the type table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Access {
    /// Walk the key map over a range.
    Keys(ValueRange),
    /// Walk one indexed field over a range.
    Field { field: usize, range: ValueRange },
}

/// Executable query plan.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub(crate) access: Access,
    pub(crate) descending: bool,
    pub(crate) condition: Option<Condition>,
    /// Set when the access path does not produce the requested order.
    pub(crate) sort: Option<(Column, bool)>,
    pub(crate) offset: usize,
    pub(crate) limit: Option<usize>,
}

impl Plan {
    /// Builds a plan for a bound condition and order.
    pub(crate) fn new(
        descriptor: &TypeDescriptor,
        condition: Option<Condition>,
        order_by: Option<(Column, bool)>,
        offset: usize,
        limit: Option<usize>,
    ) -> Self {
        let mut ranges: Vec<(Column, ValueRange)> = Vec::new();
        if let Some(condition) = &condition {
            let mut conjuncts = Vec::new();
            collect_conjuncts(condition, &mut conjuncts);
            for (column, range) in conjuncts.into_iter().filter_map(range_of) {
                if !column.is_indexed(descriptor) {
                    continue;
                }
                match ranges.iter_mut().find(|(c, _)| *c == column) {
                    Some((_, existing)) => *existing = existing.clone().intersect(&range),
                    None => ranges.push((column, range)),
                }
            }
        }

        let best = ranges
            .into_iter()
            .min_by_key(|(column, range)| match (column, range.is_point()) {
                (Column::Key, true) => 0,
                (_, true) => 1,
                (Column::Key, false) => 2,
                _ => 3,
            });

        let (access, served) = match best {
            Some((Column::Field(field), range)) => (Access::Field { field, range }, Column::Field(field)),
            Some((_, range)) => (Access::Keys(range), Column::Key),
            None => match order_by {
                Some((Column::Field(field), _)) if Column::Field(field).is_indexed(descriptor) => (
                    Access::Field {
                        field,
                        range: ValueRange::all(),
                    },
                    Column::Field(field),
                ),
                _ => (Access::Keys(ValueRange::all()), Column::Key),
            },
        };

        let (descending, sort) = match order_by {
            None => (false, None),
            Some((column, descending)) if column == served => (descending, None),
            Some(order) => (false, Some(order)),
        };

        Self {
            access,
            descending,
            condition,
            sort,
            offset,
            limit,
        }
    }

}

fn collect_conjuncts<'a>(condition: &'a Condition, out: &mut Vec<&'a Condition>) {
    match condition {
        Condition::And(left, right) => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

/// The range of a column implied by one conjunct, if any.
///
/// Open lower bounds exclude `NULL`, which sorts first and never matches
/// a comparison.
fn range_of(condition: &Condition) -> Option<(Column, ValueRange)> {
    match condition {
        Condition::Compare { column, op, value } if !value.is_null() => {
            let v = value.clone();
            let range = match op {
                CompareOp::Eq => ValueRange::point(v),
                CompareOp::Lt => ValueRange::new(Bound::Excluded(Value::Null), Bound::Excluded(v)),
                CompareOp::Le => ValueRange::new(Bound::Excluded(Value::Null), Bound::Included(v)),
                CompareOp::Gt => ValueRange::new(Bound::Excluded(v), Bound::Unbounded),
                CompareOp::Ge => ValueRange::new(Bound::Included(v), Bound::Unbounded),
                CompareOp::Ne => return None,
            };
            Some((*column, range))
        }
        Condition::Between {
            column,
            low,
            high,
            negated: false,
        } if !low.is_null() && !high.is_null() => Some((
            *column,
            ValueRange::new(Bound::Included(low.clone()), Bound::Included(high.clone())),
        )),
        _ => None,
    }
}

/// Orders entries by a column, ties broken by key.
///
/// Descending order reverses both, matching a reversed walk of an ordered
/// field index.
pub(crate) fn sort_entries<E: AsRef<IndexEntry>>(entries: &mut [E], column: Column, descending: bool) {
    entries.sort_by(|a, b| {
        let (a, b) = (a.as_ref(), b.as_ref());
        let ordering = column
            .read(a)
            .unwrap_or(&NULL)
            .cmp(column.read(b).unwrap_or(&NULL))
            .then_with(|| a.key().cmp(b.key()));
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse_clause;
    use crate::schema::FieldDescriptor;
    use crate::types::Version;

    fn person() -> TypeDescriptor {
        TypeDescriptor::new("Person")
            .field(FieldDescriptor::new("name", FieldType::Text).indexed())
            .field(FieldDescriptor::new("age", FieldType::Integer).indexed())
            .field(FieldDescriptor::new("city", FieldType::Text))
    }

    fn entry(key: i64, name: &str, age: Option<i64>) -> IndexEntry {
        IndexEntry::new(
            Value::Integer(key),
            vec![Value::from(name), Value::from(age), Value::Null],
            Value::Null,
            Version::from_u64(1),
            0,
        )
    }

    fn bound(clause: &str, params: &[Value]) -> CoreResult<Condition> {
        let stmt = parse_clause(clause)?;
        bind(&stmt.filter.expect("filter"), &person(), params)
    }

    fn plan(clause: &str) -> Plan {
        let desc = person();
        let stmt = parse_clause(clause).unwrap();
        let condition = stmt.filter.map(|f| bind(&f, &desc, &[]).unwrap());
        let order = stmt
            .order_by
            .map(|o| (Column::resolve(&desc, &o.field).unwrap(), o.descending));
        Plan::new(&desc, condition, order, 0, None)
    }

    #[test]
    fn three_valued_logic() {
        let unknown_age = entry(1, "ann", None);
        let cond = bound("age > 3", &[]).unwrap();
        assert_eq!(cond.eval(&unknown_age), None);

        let cond = bound("NOT age > 3", &[]).unwrap();
        assert_eq!(cond.eval(&unknown_age), None);

        let cond = bound("age > 3 OR name = 'ann'", &[]).unwrap();
        assert_eq!(cond.eval(&unknown_age), Some(true));

        let cond = bound("age > 3 AND name = 'bob'", &[]).unwrap();
        assert_eq!(cond.eval(&unknown_age), Some(false));

        let cond = bound("age IS NULL", &[]).unwrap();
        assert!(cond.matches(&unknown_age));

        let cond = bound("age NOT IN (1, NULL)", &[]).unwrap();
        assert_eq!(cond.eval(&entry(2, "x", Some(5))), None);
    }

    #[test]
    fn between_and_in() {
        let row = entry(1, "ann", Some(30));
        assert!(bound("age BETWEEN 30 AND 40", &[]).unwrap().matches(&row));
        assert!(!bound("age NOT BETWEEN 30 AND 40", &[]).unwrap().matches(&row));
        assert!(bound("name IN ('bob', 'ann')", &[]).unwrap().matches(&row));
        assert!(bound("_key = ?", &[Value::Integer(1)]).unwrap().matches(&row));
    }

    #[test]
    fn binding_errors() {
        let err = bound("age = 'old'", &[]).unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));

        let err = bound("age = ?", &[Value::from("x")]).unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));

        let err = bound("height = 3", &[]).unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));

        let err = bound("_val = 3", &[]).unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));

        assert!(bound("AGE = NULL", &[]).is_ok());
    }

    #[test]
    fn key_equality_beats_field_equality() {
        let plan = plan("name = 'ann' AND _key = 7");
        assert_eq!(plan.access, Access::Keys(ValueRange::point(Value::Integer(7))));
    }

    #[test]
    fn field_equality_beats_key_range() {
        let plan = plan("_key > 7 AND age = 30");
        assert_eq!(
            plan.access,
            Access::Field {
                field: 1,
                range: ValueRange::point(Value::Integer(30))
            }
        );
    }

    #[test]
    fn ranges_on_one_field_are_intersected() {
        let plan = plan("age >= 20 AND age < 30");
        assert_eq!(
            plan.access,
            Access::Field {
                field: 1,
                range: ValueRange::new(
                    Bound::Included(Value::Integer(20)),
                    Bound::Excluded(Value::Integer(30))
                )
            }
        );
    }

    #[test]
    fn unindexed_and_disjunctive_predicates_scan_keys() {
        assert_eq!(plan("city = 'x'").access, Access::Keys(ValueRange::all()));
        assert_eq!(plan("age = 1 OR age = 2").access, Access::Keys(ValueRange::all()));
    }

    #[test]
    fn order_by_indexed_field_uses_its_index() {
        let plan = plan("ORDER BY age DESC");
        assert!(matches!(plan.access, Access::Field { field: 1, .. }));
        assert!(plan.descending);
        assert!(plan.sort.is_none());
    }

    #[test]
    fn order_not_served_by_access_is_sorted() {
        let plan = plan("_key = 3 ORDER BY city");
        assert_eq!(plan.sort, Some((Column::Field(2), false)));
        assert!(!plan.descending);
    }

    #[test]
    fn sort_breaks_ties_by_key() {
        let mut rows = vec![
            std::sync::Arc::new(entry(3, "b", Some(1))),
            std::sync::Arc::new(entry(1, "b", Some(2))),
            std::sync::Arc::new(entry(2, "a", Some(3))),
        ];
        sort_entries(&mut rows, Column::Field(0), false);
        let keys: Vec<_> = rows.iter().map(|e| e.key().clone()).collect();
        assert_eq!(keys, vec![Value::Integer(2), Value::Integer(1), Value::Integer(3)]);

        sort_entries(&mut rows, Column::Field(0), true);
        let keys: Vec<_> = rows.iter().map(|e| e.key().clone()).collect();
        assert_eq!(keys, vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)]);
    }
}
