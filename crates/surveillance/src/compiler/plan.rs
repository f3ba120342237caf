//! Inverted-index registration plans derived from a filter tree.
//!
//! A plan names index keys such that every killmail satisfying the filter
//! carries at least one of them. Filters with no such reduction fall back to
//! the full-scan set.

use std::collections::BTreeSet;

use crate::schema::{Field, Operator};

use super::leaf::CheckedLeaf;

/// An indexable (field, value) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    pub field: Field,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexPlan {
    /// Register the profile under each of these keys.
    Keys(BTreeSet<IndexKey>),
    /// Evaluate the profile against every killmail.
    FullScan,
}

impl IndexPlan {
    pub fn is_full_scan(&self) -> bool {
        matches!(self, IndexPlan::FullScan)
    }

    pub(crate) fn for_leaf(leaf: &CheckedLeaf) -> IndexPlan {
        if !leaf.field.is_indexable() {
            return IndexPlan::FullScan;
        }
        match leaf.operator {
            Operator::Eq | Operator::In | Operator::ContainsAny | Operator::ContainsAll => {
                let keys: Option<BTreeSet<IndexKey>> = leaf
                    .literals
                    .iter()
                    .map(|lit| {
                        lit.as_index_key().map(|value| IndexKey {
                            field: leaf.field,
                            value,
                        })
                    })
                    .collect();
                keys.map(IndexPlan::Keys).unwrap_or(IndexPlan::FullScan)
            }
            _ => IndexPlan::FullScan,
        }
    }

    /// AND: any child's keys are necessary; keep the most selective.
    pub(crate) fn all_of(children: Vec<IndexPlan>) -> IndexPlan {
        children
            .into_iter()
            .filter_map(|p| match p {
                IndexPlan::Keys(keys) => Some(keys),
                IndexPlan::FullScan => None,
            })
            .min_by_key(BTreeSet::len)
            .map(IndexPlan::Keys)
            .unwrap_or(IndexPlan::FullScan)
    }

    /// OR: indexable only when every branch is.
    pub(crate) fn any_of(children: Vec<IndexPlan>) -> IndexPlan {
        let mut union = BTreeSet::new();
        for child in children {
            match child {
                IndexPlan::Keys(keys) => union.extend(keys),
                IndexPlan::FullScan => return IndexPlan::FullScan,
            }
        }
        IndexPlan::Keys(union)
    }
}
