//! Configuration management for the duplex-ftp server
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `DUPLEX_FTP__*` environment variables. The binary applies CLI overrides on
//! top of the loaded value.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DUPLEX_FTP";

/// One entry of the credential table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    pub password: String,
}

impl UserEntry {
    pub fn new(name: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            password: password.to_string(),
        }
    }
}

/// Complete server configuration.
///
/// Everything here is fixed for the lifetime of the process; sessions receive
/// it behind an `Arc` and never mutate it.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address the control listener binds to
    pub bind_address: String,

    /// Port for the control connection; 0 picks a free port at bind time
    pub control_port: u16,

    /// Directory every session is confined to
    pub server_root: PathBuf,

    /// Chunk size for file and listing transfers
    pub buffer_size: usize,

    /// Upper bound on dialing the client's announced data endpoint
    pub data_connect_timeout_secs: u64,

    /// Longest accepted command line, terminator included
    pub max_command_length: usize,

    /// Concurrent control connections before new ones get a 421
    pub max_clients: usize,

    pub users: Vec<UserEntry>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            control_port: 2121,
            server_root: PathBuf::from("./server_root"),
            buffer_size: 8192,
            data_connect_timeout_secs: 10,
            max_command_length: 512,
            max_clients: 10,
            users: vec![
                UserEntry::new("alice", "alice123"),
                UserEntry::new("bob", "bob123"),
                UserEntry::new("admin", "admin123"),
            ],
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path` with environment overrides.
    ///
    /// A missing file is only an error when `required` is set; otherwise the
    /// defaults (plus environment) are used.
    pub fn load(path: &Path, required: bool) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.server_root.as_os_str().is_empty() {
            return Err(config::ConfigError::Message(
                "server_root cannot be empty".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_command_length < 16 {
            return Err(config::ConfigError::Message(
                "max_command_length must be at least 16".into(),
            ));
        }

        if self.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.users.is_empty() {
            return Err(config::ConfigError::Message(
                "at least one user must be configured".into(),
            ));
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if user.name.is_empty() {
                return Err(config::ConfigError::Message(
                    "user names cannot be empty".into(),
                ));
            }
            if !seen.insert(user.name.as_str()) {
                return Err(config::ConfigError::Message(format!(
                    "duplicate user name: {}",
                    user.name
                )));
            }
        }

        Ok(())
    }

    /// Bind address and control port joined for `TcpListener::bind`.
    pub fn control_socket(&self) -> String {
        if self.bind_address.contains(':') {
            format!("[{}]:{}", self.bind_address, self.control_port)
        } else {
            format!("{}:{}", self.bind_address, self.control_port)
        }
    }

    pub fn data_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.data_connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control_socket(), "127.0.0.1:2121");
        assert_eq!(config.data_connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_duplicate_users() {
        let mut config = ServerConfig::default();
        config.users.push(UserEntry::new("alice", "other"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_limits() {
        let mut config = ServerConfig::default();
        config.max_clients = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ephemeral_control_port_is_valid() {
        let config = ServerConfig {
            control_port: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.control_socket(), "127.0.0.1:0");
    }

    #[test]
    fn ipv6_bind_address_is_bracketed() {
        let config = ServerConfig {
            bind_address: "::1".into(),
            ..ServerConfig::default()
        };
        assert_eq!(config.control_socket(), "[::1]:2121");
    }

    #[test]
    fn loads_toml_file_and_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "control_port = 2200\nserver_root = \"/srv/ftp\"\n\n[[users]]\nname = \"Pablo\"\npassword = \"1234\""
        )
        .unwrap();

        let config = ServerConfig::load(file.path(), true).unwrap();
        assert_eq!(config.control_port, 2200);
        assert_eq!(config.server_root, PathBuf::from("/srv/ftp"));
        assert_eq!(config.buffer_size, 8192);
        assert_eq!(config.users, vec![UserEntry::new("Pablo", "1234")]);
    }

    #[test]
    fn missing_optional_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(&dir.path().join("absent.toml"), false).unwrap();
        assert_eq!(config.max_command_length, 512);
    }
}
