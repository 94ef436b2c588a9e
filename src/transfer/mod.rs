//! Transfer module
//!
//! Active-mode data channel negotiation (PORT) and the data-exchange phase of
//! LIST, RETR and STOR.

pub mod data_channel;
pub mod operations;

pub use data_channel::{connect_data_channel, format_port_argument, parse_port_argument};
pub use operations::{receive_file, send_file, send_listing};
