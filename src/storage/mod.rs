//! File system storage management
//!
//! Resolves client paths against the session root and performs the
//! filesystem side of each transfer's preflight check.

pub mod operations;
pub mod validation;

pub use operations::{list_directory, prepare_retrieval, prepare_storage};
pub use validation::{ensure_within_root, resolve_path};
