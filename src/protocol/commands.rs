//! Module `commands`
//!
//! Defines the FTP commands understood by the server and the parser that
//! turns one control line into a [`Command`].

use std::fmt;

/// Represents an FTP command parsed from a control line.
///
/// Commands that take an argument keep the raw remainder of the line; an
/// empty string means the client sent the verb alone. Handlers decide whether
/// that is a syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    Port(String),
    List(Option<String>),
    Retr(String),
    Stor(String),
    Quit,
    /// Unsupported verb, upper-cased
    Unknown(String),
}

impl Command {
    pub fn verb(&self) -> &str {
        match self {
            Command::User(_) => "USER",
            Command::Pass(_) => "PASS",
            Command::Port(_) => "PORT",
            Command::List(_) => "LIST",
            Command::Retr(_) => "RETR",
            Command::Stor(_) => "STOR",
            Command::Quit => "QUIT",
            Command::Unknown(verb) => verb,
        }
    }

    /// Line sent on the wire, without the terminator.
    pub fn wire_line(&self) -> String {
        match self {
            Command::User(arg)
            | Command::Pass(arg)
            | Command::Port(arg)
            | Command::Retr(arg)
            | Command::Stor(arg) => format!("{} {}", self.verb(), arg),
            Command::List(Some(path)) => format!("LIST {}", path),
            Command::List(None) | Command::Quit | Command::Unknown(_) => self.verb().to_string(),
        }
    }
}

/// Log-safe rendering: the PASS argument is masked.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass(_) => write!(f, "PASS ****"),
            other => write!(f, "{}", other.wire_line()),
        }
    }
}

/// Parses a control line into a [`Command`].
///
/// The verb is everything up to the first whitespace run and is matched
/// case-insensitively; the argument is the trimmed remainder.
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim();
    let (verb, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (trimmed, ""),
    };
    let verb = verb.to_ascii_uppercase();

    match verb.as_str() {
        "USER" => Command::User(arg.to_string()),
        "PASS" => Command::Pass(arg.to_string()),
        "PORT" => Command::Port(arg.to_string()),
        "LIST" if arg.is_empty() => Command::List(None),
        "LIST" => Command::List(Some(arg.to_string())),
        "RETR" => Command::Retr(arg.to_string()),
        "STOR" => Command::Stor(arg.to_string()),
        "QUIT" => Command::Quit,
        _ => Command::Unknown(verb),
    }
}
