//! Server core functionality
//!
//! Binds the control listener, accepts connections and runs one session task
//! per client.

pub mod core;
pub mod registry;

pub use core::Server;
pub use registry::SessionRegistry;
