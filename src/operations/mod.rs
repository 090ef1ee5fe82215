// Operations module
// Tree listing, the merge join, the operation sinks and the reconciler built on them

pub mod listing;
pub mod merge;
pub mod reconcile;
pub mod sink;

pub use listing::{DirEntry, Listing};
pub use merge::{merge_join, MergeJoin};
pub use reconcile::{reconcile, validate_trees, ReconcileReport, Reconciler};
pub use sink::{ExecuteSink, Operation, OperationSink, RecordSink};
