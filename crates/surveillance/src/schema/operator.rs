//! Whitelisted leaf comparison operators.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
    ContainsAny,
    ContainsAll,
    NotContains,
}

/// Every whitelisted operator.
pub const ALL_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Gt,
    Operator::Lt,
    Operator::Gte,
    Operator::Lte,
    Operator::In,
    Operator::NotIn,
    Operator::ContainsAny,
    Operator::ContainsAll,
    Operator::NotContains,
];

/// Wire names of every whitelisted operator.
pub const OPERATOR_NAMES: &[&str] = &[
    "eq",
    "ne",
    "gt",
    "lt",
    "gte",
    "lte",
    "in",
    "not_in",
    "contains_any",
    "contains_all",
    "not_contains",
];

impl Operator {
    pub fn from_name(name: &str) -> Option<Operator> {
        ALL_OPERATORS.iter().copied().find(|op| op.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::ContainsAny => "contains_any",
            Operator::ContainsAll => "contains_all",
            Operator::NotContains => "not_contains",
        }
    }

    /// Operators whose value must be a non-empty list.
    pub fn requires_list(&self) -> bool {
        matches!(
            self,
            Operator::In
                | Operator::NotIn
                | Operator::ContainsAny
                | Operator::ContainsAll
                | Operator::NotContains
        )
    }

    /// Ordering comparisons over the numeric domain.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
