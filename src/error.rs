// Error Types
// Every failure a reconciliation run can report

use std::path::PathBuf;

/// Result type for tree-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while listing or reconciling trees
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The size threshold could not be parsed
    #[error("Invalid size format: '{input}' (expected e.g. 500, 10MiB, 2GB)")]
    InvalidSizeFormat { input: String },

    /// MASTER, SLAVE or BIN is missing or not a directory
    #[error("Directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    /// A mutating operation failed while being executed
    #[error("Operation failed: {operation}: {source}")]
    FilesystemOperationFailed {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the filesystem (listing, stat, log output) failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operation log could not be written
    #[error("Failed to write operation log: {0}")]
    Log(#[source] std::io::Error),

    /// One of the three trees lies inside another
    #[error("{} lies inside {}; master, slave and bin must be separate trees", inner.display(), outer.display())]
    OverlappingTrees { outer: PathBuf, inner: PathBuf },

    /// The YAML settings file is malformed
    #[error("Failed to parse settings at {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn operation(operation: impl ToString, source: std::io::Error) -> Self {
        Self::FilesystemOperationFailed {
            operation: operation.to_string(),
            source,
        }
    }
}
