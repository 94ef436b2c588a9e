//! FTP client
//!
//! Library side of the interactive client: one control connection, active
//! mode data transfers.

pub mod ftp_client;

pub use ftp_client::{DEFAULT_ACCEPT_TIMEOUT, FtpClient};
