// Tree Sync Library
// Brings a slave directory tree up to date with a master tree, archiving
// outdated slave files into a rubbish bin

// Core infrastructure - configuration and value types
pub mod core;

// Errors shared by every module
pub mod error;

// Operations - listing, reconciliation and the sinks that carry it out
pub mod operations;

// Utilities - helper functions and tools
pub mod utilities;

// Re-export commonly used items for convenience
pub use crate::core::{Settings, SizeThreshold, SyncConfig, SyncMode};
pub use error::{Error, Result};
pub use operations::{
    reconcile, ExecuteSink, Listing, Operation, OperationSink, ReconcileReport, Reconciler,
    RecordSink,
};
