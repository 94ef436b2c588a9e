//! Session management
//!
//! One session per accepted control connection: its state machine and the
//! command loop that drives it.

pub mod handler;
pub mod state;

pub use handler::{SessionContext, handle_session};
pub use state::{Session, SessionState};
