//! Killmail surveillance matching engine.
//!
//! This crate provides:
//! - Profile filter trees (AND/OR of field/operator/value leaves) with serde support
//! - A compiler turning filter trees into thread-safe predicates and index plans
//! - An inverted profile index with generation-swapped snapshots and a match cache
//! - A parallel evaluator on a bounded `rayon` pool with fault isolation
//! - Profile stores (in-memory, and a YAML/JSON directory with hot-reload via `notify`)
//! - Batched match persistence (in-memory and JSON-lines recorders)
//! - The [`MatchingCoordinator`] tying it together per killmail

pub mod compiler;
pub mod coordinator;
pub mod error;
pub mod evaluator;
pub mod index;
pub mod recorder;
pub mod schema;
pub mod store;

#[cfg(test)]
mod test_support;

pub use coordinator::{MatchNotification, MatchingCoordinator, Phase};
pub use error::SurveillanceError;
