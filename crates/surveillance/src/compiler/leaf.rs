//! Leaf comparators: one closure per `{field, operator, value}` condition.

use std::sync::Arc;

use killwatch_core::Killmail;
use serde_json::Value;

use crate::schema::{Field, FieldValue, FilterLeaf, Operator, FIELD_NAMES, OPERATOR_NAMES};

use super::error::{CompileError, EvaluationError};
use super::fuzzy::suggest;
use super::value::{describe, elements, Elem, Scalar};
use super::Predicate;

/// A leaf whose field, operator and literal(s) passed the whitelist checks.
#[derive(Debug, Clone)]
pub(crate) struct CheckedLeaf {
    pub field: Field,
    pub operator: Operator,
    pub literals: Vec<Scalar>,
}

/// Resolve names and literals, pushing every problem found onto `errors`.
pub(crate) fn check_leaf(
    leaf: &FilterLeaf,
    path: &str,
    errors: &mut Vec<CompileError>,
) -> Option<CheckedLeaf> {
    let field = Field::from_name(&leaf.field);
    if field.is_none() {
        errors.push(CompileError::UnknownField {
            path: format!("{path}.field"),
            field: leaf.field.clone(),
            suggestion: suggest(&leaf.field, FIELD_NAMES).map(str::to_string),
        });
    }

    let operator = Operator::from_name(&leaf.operator);
    if operator.is_none() {
        errors.push(CompileError::UnknownOperator {
            path: format!("{path}.operator"),
            operator: leaf.operator.clone(),
            suggestion: suggest(&leaf.operator, OPERATOR_NAMES).map(str::to_string),
        });
    }

    let (field, operator) = (field?, operator?);
    let value_path = format!("{path}.value");

    let literals = if operator.requires_list() {
        match &leaf.value {
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    Scalar::from_json(field, item).map_err(|reason| CompileError::InvalidValue {
                        path: format!("{value_path}[{i}]"),
                        reason,
                    })
                })
                .collect::<Result<Vec<_>, _>>(),
            _ => Err(CompileError::ExpectedList {
                path: value_path,
                operator,
            }),
        }
    } else {
        match &leaf.value {
            Value::Array(_) => Err(CompileError::ExpectedScalar {
                path: value_path,
                operator,
            }),
            other => Scalar::from_json(field, other)
                .map(|s| vec![s])
                .map_err(|reason| CompileError::InvalidValue {
                    path: value_path,
                    reason,
                }),
        }
    };

    let literals = match literals {
        Ok(l) => l,
        Err(e) => {
            errors.push(e);
            return None;
        }
    };

    if operator.is_numeric() && literals[0].as_f64().is_none() {
        errors.push(CompileError::InvalidValue {
            path: format!("{path}.value"),
            reason: format!("operator '{operator}' requires a numeric value"),
        });
        return None;
    }

    Some(CheckedLeaf {
        field,
        operator,
        literals,
    })
}

/// Build the comparator closure for a checked leaf.
pub(crate) fn compile_leaf(leaf: CheckedLeaf) -> Predicate {
    let CheckedLeaf {
        field,
        operator,
        literals,
    } = leaf;

    match operator {
        Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte => {
            // Checked above: the literal is numeric.
            let threshold = literals[0].as_f64().unwrap_or(f64::NAN);
            Arc::new(move |km: &Killmail| -> Result<bool, EvaluationError> {
                let actual = match numeric_value(field, operator, &field.extract(km))? {
                    Some(v) => v,
                    None => return Ok(false),
                };
                Ok(match operator {
                    Operator::Gt => actual > threshold,
                    Operator::Lt => actual < threshold,
                    Operator::Gte => actual >= threshold,
                    _ => actual <= threshold,
                })
            })
        }
        Operator::Eq | Operator::In | Operator::ContainsAny => {
            Arc::new(move |km: &Killmail| -> Result<bool, EvaluationError> {
                let value = field.extract(km);
                Ok(any_match(&elements(&value), &literals))
            })
        }
        Operator::Ne | Operator::NotIn | Operator::NotContains => {
            Arc::new(move |km: &Killmail| -> Result<bool, EvaluationError> {
                let value = field.extract(km);
                Ok(!any_match(&elements(&value), &literals))
            })
        }
        Operator::ContainsAll => {
            Arc::new(move |km: &Killmail| -> Result<bool, EvaluationError> {
                let value = field.extract(km);
                let elems = elements(&value);
                Ok(literals
                    .iter()
                    .all(|lit| elems.iter().any(|e| e.matches(lit))))
            })
        }
    }
}

fn any_match(elems: &[Elem<'_>], literals: &[Scalar]) -> bool {
    elems
        .iter()
        .any(|e| literals.iter().any(|lit| e.matches(lit)))
}

/// Coerce a killmail value into the numeric domain; `Ok(None)` when absent.
fn numeric_value(
    field: Field,
    operator: Operator,
    value: &FieldValue<'_>,
) -> Result<Option<f64>, EvaluationError> {
    let mismatch = || EvaluationError::TypeMismatch {
        field,
        operator,
        found: describe(value),
    };

    match value {
        FieldValue::Missing => Ok(None),
        FieldValue::IntList(_) | FieldValue::TextList(_) | FieldValue::Bool(_) => Err(mismatch()),
        _ => match elements(value).first().and_then(Elem::as_f64) {
            Some(v) => Ok(Some(v)),
            None => Err(mismatch()),
        },
    }
}
