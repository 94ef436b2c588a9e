//! FTP Response handling
//!
//! Defines FTP reply codes, their standard texts and the reply type.

use std::fmt;

/// Standard FTP reply codes
pub const OPENING_DATA: u16 = 150;
pub const OK: u16 = 200;
pub const READY: u16 = 220;
pub const CLOSING: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const LOGIN_SUCCESS: u16 = 230;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const TOO_MANY_CLIENTS: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const LOCAL_ERROR: u16 = 451;
pub const UNRECOGNIZED: u16 = 500;
pub const SYNTAX_ERROR: u16 = 501;
pub const BAD_SEQUENCE: u16 = 503;
pub const NOT_LOGGED_IN: u16 = 530;
pub const FILE_UNAVAILABLE: u16 = 550;

/// Human text sent with each reply code.
pub fn default_text(code: u16) -> &'static str {
    match code {
        OPENING_DATA => "File status okay; about to open data connection.",
        OK => "Command okay.",
        READY => "Service ready for new user.",
        CLOSING => "Service closing control connection.",
        TRANSFER_COMPLETE => "Closing data connection. Requested file action successful.",
        LOGIN_SUCCESS => "User logged in, proceed.",
        PASSWORD_REQUIRED => "User name okay, need password.",
        TOO_MANY_CLIENTS => "Too many connections. Try again later.",
        CANT_OPEN_DATA => "Can't open data connection.",
        LOCAL_ERROR => "Requested action aborted: local error in processing.",
        UNRECOGNIZED => "Syntax error, command unrecognized.",
        SYNTAX_ERROR => "Syntax error in parameters or arguments.",
        BAD_SEQUENCE => "Bad sequence of commands.",
        NOT_LOGGED_IN => "Not logged in.",
        FILE_UNAVAILABLE => "Requested action not taken. File unavailable.",
        _ => "Unknown status.",
    }
}

/// Format an FTP response line, terminator included
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}

/// A three-digit status code plus human text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// Reply carrying the standard text for `code`.
    pub fn standard(code: u16) -> Self {
        Self::new(code, default_text(code))
    }

    /// 1xx: more replies follow for the same command.
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}
