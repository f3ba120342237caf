//! Crate-level error type for coordinator lifecycle operations.

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SurveillanceError {
    #[error("profile store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build evaluator pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("index rebuild task failed: {0}")]
    Rebuild(String),
}

pub type Result<T> = std::result::Result<T, SurveillanceError>;
