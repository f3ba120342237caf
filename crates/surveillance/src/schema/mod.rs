//! Profile and filter-tree schema types with serde deserialization.
//!
//! - `FilterTree`: recursive AND/OR groups over leaf conditions
//! - `Field` / `Operator`: the whitelists a leaf is checked against at compile time
//! - `Profile`: the read-only surveillance profile carrying a filter tree

mod field;
mod filter_tree;
mod operator;
mod profile;

pub use field::*;
pub use filter_tree::*;
pub use operator::*;
pub use profile::*;
