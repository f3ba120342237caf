//! Profile compiler: filter trees → executable predicates.
//!
//! Compilation walks the tree once, checking every leaf against the field
//! and operator whitelists, coercing literals, and producing:
//! - a [`Predicate`] closure tree (AND/OR short-circuit in declaration order)
//! - an [`IndexPlan`] telling the index manager where to register the profile
//!
//! The walk never stops at the first problem, so [`validate_filter_tree`]
//! can report every error in a profile at once.

mod error;
pub(crate) mod fuzzy;
mod leaf;
mod plan;
mod validate;
mod value;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use killwatch_core::Killmail;

use crate::schema::{FilterTree, GroupOperator, Profile, ProfileId};

pub use self::error::{CompileError, EvaluationError};
pub use self::plan::{IndexKey, IndexPlan};
pub use self::validate::{validate_filter_tree, ValidationIssue, ValidationReport};

use self::leaf::{check_leaf, compile_leaf};

/// Compiled, thread-safe boolean function over a normalized killmail.
pub type Predicate = Arc<dyn Fn(&Killmail) -> Result<bool, EvaluationError> + Send + Sync>;

/// Root path used in error locations.
const ROOT_PATH: &str = "filter_tree";

/// Output of a successful compilation.
#[derive(Clone)]
pub struct CompiledFilter {
    pub predicate: Predicate,
    pub plan: IndexPlan,
}

/// A profile's derived, non-persisted matching state.
#[derive(Clone)]
pub struct CompiledProfile {
    pub id: ProfileId,
    pub name: String,
    pub predicate: Predicate,
    pub plan: IndexPlan,
}

impl std::fmt::Debug for CompiledProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProfile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl CompiledProfile {
    pub fn matches(&self, km: &Killmail) -> Result<bool, EvaluationError> {
        (self.predicate)(km)
    }
}

/// Compile a filter tree into a predicate.
pub fn compile(tree: &FilterTree) -> Result<Predicate, CompileError> {
    compile_filter(tree).map(|c| c.predicate)
}

/// Compile a filter tree into a predicate plus its index plan.
pub fn compile_filter(tree: &FilterTree) -> Result<CompiledFilter, CompileError> {
    let mut errors = Vec::new();
    match compile_node(tree, ROOT_PATH, &mut errors) {
        Some((predicate, plan)) if errors.is_empty() => Ok(CompiledFilter { predicate, plan }),
        _ => Err(errors.into_iter().next().unwrap_or(CompileError::InvalidValue {
            path: ROOT_PATH.to_string(),
            reason: "filter tree could not be compiled".to_string(),
        })),
    }
}

/// Compile a profile's filter tree.
pub fn compile_profile(profile: &Profile) -> Result<CompiledProfile, CompileError> {
    let CompiledFilter { predicate, plan } = compile_filter(&profile.filter_tree)?;
    Ok(CompiledProfile {
        id: profile.id,
        name: profile.name.clone(),
        predicate,
        plan,
    })
}

/// Derive the index plan for a tree without keeping the predicate.
pub fn index_plan(tree: &FilterTree) -> Result<IndexPlan, CompileError> {
    compile_filter(tree).map(|c| c.plan)
}

/// Collect every compile error in a tree (empty when it compiles).
pub(crate) fn collect_errors(tree: &FilterTree) -> (Vec<CompileError>, Option<IndexPlan>) {
    let mut errors = Vec::new();
    let plan = compile_node(tree, ROOT_PATH, &mut errors).map(|(_, plan)| plan);
    (errors, plan)
}

fn compile_node(
    tree: &FilterTree,
    path: &str,
    errors: &mut Vec<CompileError>,
) -> Option<(Predicate, IndexPlan)> {
    match tree {
        FilterTree::Leaf(leaf) => {
            let checked = check_leaf(leaf, path, errors)?;
            let plan = IndexPlan::for_leaf(&checked);
            Some((compile_leaf(checked), plan))
        }
        FilterTree::Group(group) => {
            if group.children.is_empty() {
                errors.push(CompileError::EmptyGroup {
                    path: path.to_string(),
                });
                return None;
            }

            // Compile every child before bailing so all errors are reported.
            let compiled: Vec<Option<(Predicate, IndexPlan)>> = group
                .children
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    let child_path = format!("{path}.{}[{i}]", group.operator.as_str());
                    compile_node(child, &child_path, errors)
                })
                .collect();
            let compiled: Vec<(Predicate, IndexPlan)> = compiled.into_iter().collect::<Option<_>>()?;
            let (children, plans): (Vec<Predicate>, Vec<IndexPlan>) = compiled.into_iter().unzip();

            Some(match group.operator {
                GroupOperator::And => (all_of(children), IndexPlan::all_of(plans)),
                GroupOperator::Or => (any_of(children), IndexPlan::any_of(plans)),
            })
        }
    }
}

fn all_of(children: Vec<Predicate>) -> Predicate {
    Arc::new(move |km: &Killmail| -> Result<bool, EvaluationError> {
        for child in &children {
            if !child(km)? {
                return Ok(false);
            }
        }
        Ok(true)
    })
}

fn any_of(children: Vec<Predicate>) -> Predicate {
    Arc::new(move |km: &Killmail| -> Result<bool, EvaluationError> {
        for child in &children {
            if child(km)? {
                return Ok(true);
            }
        }
        Ok(false)
    })
}
