// Core infrastructure module
// Configuration and value types the reconciler is driven by

pub mod config;
pub mod size;

pub use config::{Settings, SyncConfig, SyncMode};
pub use size::{SizeThreshold, SizeUnit};
