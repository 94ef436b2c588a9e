//! Error handling
//!
//! Defines error types for each layer and their mapping to FTP reply codes.

pub mod handlers;
pub mod types;

pub use handlers::reply_code;
pub use types::*;
