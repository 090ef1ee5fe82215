// Utilities module
// Helper functions and tools

pub mod paths;
pub mod shell;

pub use paths::{is_inside, normalize_path, relative_path};
pub use shell::quote;
