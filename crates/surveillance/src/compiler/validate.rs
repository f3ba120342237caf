//! Structured validation reports for profile editors.
//!
//! Unlike [`compile`](super::compile), validation never stops at the first
//! problem: every error in the tree is reported with its location and a
//! "Did you mean …?" hint where one exists.

use serde::{Deserialize, Serialize};

use crate::schema::FilterTree;

use super::collect_errors;

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// One problem found in a filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// JSON-path-like location, e.g. `"filter_tree.and[0].operator"`.
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationReport {
    fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }
}

/// Validate a filter tree, collecting every error plus advisory warnings.
pub fn validate_filter_tree(tree: &FilterTree) -> ValidationReport {
    let mut report = ValidationReport::new();
    let (errors, plan) = collect_errors(tree);

    for err in errors {
        report.valid = false;
        report.errors.push(ValidationIssue {
            path: err.path().to_string(),
            message: err.to_string(),
            suggestion: err.suggestion().map(|s| format!("Did you mean '{s}'?")),
        });
    }

    if report.valid {
        if let Some(plan) = plan {
            if plan.is_full_scan() {
                report.warn(
                    "filter_tree",
                    "filter has no indexable equality condition; it will be evaluated against every killmail",
                );
            }
        }
    }

    report
}
