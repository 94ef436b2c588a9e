//! FTP Protocol implementation
//!
//! Handles command parsing, control-line framing and reply formatting.

pub mod codec;
pub mod commands;
pub mod responses;

pub use codec::{ControlChannel, read_command, read_line, read_reply, write_reply};
pub use commands::{Command, parse_command};
pub use responses::Reply;
