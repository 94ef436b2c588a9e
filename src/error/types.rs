//! Error types
//!
//! Defines domain-specific error types for each module of the FTP endpoint pair.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Control channel framing errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("command line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("command line is not valid UTF-8")]
    InvalidEncoding,

    #[error("peer closed the control connection")]
    ConnectionClosed,

    #[error("malformed reply line: {0:?}")]
    MalformedReply(String),

    #[error("control channel I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Whether the session can keep reading after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::LineTooLong { .. } | CodecError::InvalidEncoding)
    }
}

/// Authentication sequencing errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("PASS received without a preceding USER")]
    BadSequence,

    #[error("invalid credentials for user {0}")]
    InvalidCredentials(String),

    #[error("user not logged in")]
    NotLoggedIn,
}

/// Filesystem access errors under the session root
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("path escapes the session root: {0}")]
    PathEscape(String),

    #[error("filesystem error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Data channel and transfer errors
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("missing argument for {0}")]
    MissingArgument(&'static str),

    #[error("invalid PORT argument: {0}")]
    InvalidPortArgument(String),

    #[error("no data endpoint announced; send PORT first")]
    NoDataEndpoint,

    #[error("failed to connect to data endpoint {addr}: {source}")]
    DataConnection {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {timeout:?} connecting to data endpoint {addr}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },

    #[error(transparent)]
    FileAccess(#[from] StorageError),

    #[error("transfer aborted: {0}")]
    Aborted(#[source] io::Error),

    #[error("control connection closed during transfer")]
    ControlClosed,
}

/// Errors surfaced by the FTP client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("unexpected reply {code} {text}")]
    UnexpectedReply { code: u16, text: String },

    #[error("server did not open the data connection within {0:?}")]
    AcceptTimeout(Duration),

    #[error("active mode needs an IPv4 control connection, local address is {0}")]
    UnsupportedAddress(SocketAddr),
}

/// Server startup errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server root {} is unusable: {source}", .path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
