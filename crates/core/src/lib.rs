pub mod config;
pub mod killmail;

pub use config::{Config, StorageConfig, SurveillanceConfig};
pub use killmail::*;
