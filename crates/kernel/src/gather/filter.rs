//! Filter validation.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::registry::{FieldDescriptor, FieldKind, FieldRegistry};
use super::types::{Comparison, FilterOperator, FilterValue, Predicate, RawFilter, Scalar};
use crate::error::ValidationError;

/// A validated filter clause for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterClause {
    pub operator: FilterOperator,
    pub value: FilterValue,
}

/// Validated filter request. Serializes as `{field: {operator, value}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FilterRequest {
    clauses: BTreeMap<&'static str, FilterClause>,
}

impl FilterRequest {
    pub fn parse(raw: &RawFilter, registry: &FieldRegistry) -> Result<Self, ValidationError> {
        let mut clauses = BTreeMap::new();

        for (name, clause) in raw {
            let field = registry.resolve_filter(name)?;
            let operator = FilterOperator::parse(&clause.operator).ok_or_else(|| {
                ValidationError::UnknownOperator {
                    field: name.clone(),
                    operator: clause.operator.clone(),
                }
            })?;
            if !field.allows(operator) {
                return Err(ValidationError::OperatorNotAllowed {
                    field: name.clone(),
                    operator: clause.operator.clone(),
                });
            }

            let value = if operator == FilterOperator::In {
                let Value::Array(items) = &clause.value else {
                    return Err(invalid(field, "'in' takes a list"));
                };
                if items.is_empty() {
                    return Err(invalid(field, "'in' takes a non-empty list"));
                }
                let values = items
                    .iter()
                    .map(|item| coerce(field, item))
                    .collect::<Result<Vec<_>, _>>()?;
                FilterValue::Many(values)
            } else {
                if clause.value.is_array() {
                    return Err(invalid(
                        field,
                        &format!("'{operator}' takes a single value"),
                    ));
                }
                FilterValue::One(coerce(field, &clause.value)?)
            };

            clauses.insert(field.name, FilterClause { operator, value });
        }

        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&FilterClause> {
        self.clauses.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.clauses.keys().copied()
    }

    /// Compile into predicates, one per field, to be AND-combined.
    pub fn predicates(&self, registry: &FieldRegistry) -> Vec<Predicate> {
        let mut predicates = Vec::with_capacity(self.clauses.len());
        for (name, clause) in &self.clauses {
            let Some(field) = registry.get(name) else {
                continue;
            };
            let column = registry.accessor(field);
            let predicate = match (&clause.value, comparison(clause.operator)) {
                (FilterValue::Many(values), _) => Predicate::AnyOf(
                    values
                        .iter()
                        .map(|v| Predicate::eq(column, v.clone()))
                        .collect(),
                ),
                (FilterValue::One(value), Some(cmp)) => {
                    Predicate::compare(column, cmp, value.clone())
                }
                // `in` always carries a list after parsing.
                (FilterValue::One(value), None) => Predicate::eq(column, value.clone()),
            };
            predicates.push(predicate);
        }
        predicates
    }
}

fn comparison(operator: FilterOperator) -> Option<Comparison> {
    Some(match operator {
        FilterOperator::Eq => Comparison::Eq,
        FilterOperator::Ne => Comparison::Ne,
        FilterOperator::Lt => Comparison::Lt,
        FilterOperator::Lte => Comparison::Lte,
        FilterOperator::Gt => Comparison::Gt,
        FilterOperator::Gte => Comparison::Gte,
        FilterOperator::Contains => Comparison::Contains,
        FilterOperator::In => return None,
    })
}

fn invalid(field: &FieldDescriptor, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.name.to_string(),
        reason: reason.to_string(),
    }
}

/// Check a JSON value against the field kind.
fn coerce(field: &FieldDescriptor, value: &Value) -> Result<Scalar, ValidationError> {
    match field.kind {
        FieldKind::Numeric => {
            if let Some(i) = value.as_i64() {
                Ok(Scalar::Integer(i))
            } else if let Some(f) = value.as_f64() {
                Ok(Scalar::Float(f))
            } else {
                Err(invalid(field, "expected a number"))
            }
        }
        FieldKind::Identifier => value
            .as_i64()
            .map(Scalar::Integer)
            .ok_or_else(|| invalid(field, "expected an integer")),
        FieldKind::Text => value
            .as_str()
            .map(|s| Scalar::Text(s.to_string()))
            .ok_or_else(|| invalid(field, "expected a string")),
        FieldKind::Enum(variants) => match value.as_str() {
            Some(s) if variants.contains(&s) => Ok(Scalar::Text(s.to_string())),
            _ => Err(invalid(
                field,
                &format!("expected one of: {}", variants.join(", ")),
            )),
        },
    }
}
