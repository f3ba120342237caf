//! Recursive AND/OR filter tree as stored on a surveillance profile.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node of a profile's filter tree.
///
/// Serialized as `{"and": [...]}` / `{"or": [...]}` for groups and
/// `{"field": ..., "operator": ..., "value": ...}` for leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FilterTreeRepr", into = "FilterTreeRepr")]
pub enum FilterTree {
    Group(FilterGroup),
    Leaf(FilterLeaf),
}

/// Boolean combination of child nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    pub operator: GroupOperator,
    pub children: Vec<FilterTree>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOperator {
    And,
    Or,
}

impl GroupOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupOperator::And => "and",
            GroupOperator::Or => "or",
        }
    }
}

/// A single condition.
///
/// `field` and `operator` stay raw strings here: the compiler checks them
/// against the whitelists so that a typo becomes a compile error with a
/// suggestion rather than an opaque parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterLeaf {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl FilterTree {
    pub fn and(children: Vec<FilterTree>) -> Self {
        FilterTree::Group(FilterGroup {
            operator: GroupOperator::And,
            children,
        })
    }

    pub fn or(children: Vec<FilterTree>) -> Self {
        FilterTree::Group(FilterGroup {
            operator: GroupOperator::Or,
            children,
        })
    }

    pub fn leaf(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        FilterTree::Leaf(FilterLeaf {
            field: field.into(),
            operator: operator.into(),
            value,
        })
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            FilterTree::Leaf(_) => 1,
            FilterTree::Group(g) => g.children.iter().map(FilterTree::leaf_count).sum(),
        }
    }
}

// ── Wire representation ─────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FilterTreeRepr {
    And { and: Vec<FilterTree> },
    Or { or: Vec<FilterTree> },
    Leaf(FilterLeaf),
}

impl From<FilterTreeRepr> for FilterTree {
    fn from(repr: FilterTreeRepr) -> Self {
        match repr {
            FilterTreeRepr::And { and } => FilterTree::and(and),
            FilterTreeRepr::Or { or } => FilterTree::or(or),
            FilterTreeRepr::Leaf(leaf) => FilterTree::Leaf(leaf),
        }
    }
}

impl From<FilterTree> for FilterTreeRepr {
    fn from(tree: FilterTree) -> Self {
        match tree {
            FilterTree::Group(FilterGroup {
                operator: GroupOperator::And,
                children,
            }) => FilterTreeRepr::And { and: children },
            FilterTree::Group(FilterGroup {
                operator: GroupOperator::Or,
                children,
            }) => FilterTreeRepr::Or { or: children },
            FilterTree::Leaf(leaf) => FilterTreeRepr::Leaf(leaf),
        }
    }
}
