//! Error handlers
//!
//! Maps protocol-facing errors to the single reply code each one produces.

use crate::error::types::{AuthError, CodecError, StorageError, TransferError};
use crate::protocol::responses;

/// Errors that end in exactly one reply line on the control channel.
pub trait ReplyCode {
    fn reply_code(&self) -> u16;
}

impl ReplyCode for CodecError {
    fn reply_code(&self) -> u16 {
        responses::UNRECOGNIZED
    }
}

impl ReplyCode for AuthError {
    fn reply_code(&self) -> u16 {
        match self {
            AuthError::BadSequence => responses::BAD_SEQUENCE,
            AuthError::InvalidCredentials(_) | AuthError::NotLoggedIn => responses::NOT_LOGGED_IN,
        }
    }
}

impl ReplyCode for StorageError {
    fn reply_code(&self) -> u16 {
        responses::FILE_UNAVAILABLE
    }
}

impl ReplyCode for TransferError {
    fn reply_code(&self) -> u16 {
        match self {
            TransferError::MissingArgument(_) | TransferError::InvalidPortArgument(_) => {
                responses::SYNTAX_ERROR
            }
            TransferError::NoDataEndpoint
            | TransferError::DataConnection { .. }
            | TransferError::ConnectTimeout { .. } => responses::CANT_OPEN_DATA,
            TransferError::FileAccess(e) => e.reply_code(),
            TransferError::Aborted(_) | TransferError::ControlClosed => responses::LOCAL_ERROR,
        }
    }
}

/// Convert an error to its FTP reply code
pub fn reply_code<E: ReplyCode + ?Sized>(err: &E) -> u16 {
    err.reply_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::SocketAddr;
    use std::time::Duration;

    #[test]
    fn transfer_errors_map_to_distinct_codes() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        assert_eq!(reply_code(&TransferError::MissingArgument("STOR")), 501);
        assert_eq!(reply_code(&TransferError::InvalidPortArgument("x".into())), 501);
        assert_eq!(reply_code(&TransferError::NoDataEndpoint), 425);
        assert_eq!(
            reply_code(&TransferError::ConnectTimeout {
                addr,
                timeout: Duration::from_secs(1)
            }),
            425
        );
        assert_eq!(
            reply_code(&TransferError::FileAccess(StorageError::PathEscape("..".into()))),
            550
        );
        assert_eq!(
            reply_code(&TransferError::Aborted(io::Error::from(io::ErrorKind::BrokenPipe))),
            451
        );
    }

    #[test]
    fn auth_errors() {
        assert_eq!(reply_code(&AuthError::BadSequence), 503);
        assert_eq!(reply_code(&AuthError::InvalidCredentials("bob".into())), 530);
        assert_eq!(reply_code(&AuthError::NotLoggedIn), 530);
    }

    #[test]
    fn codec_errors_are_unrecognized_commands() {
        assert_eq!(reply_code(&CodecError::LineTooLong { limit: 512 }), 500);
        assert_eq!(reply_code(&CodecError::InvalidEncoding), 500);
    }
}
