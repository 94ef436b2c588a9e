//! Module `state`
//!
//! Per-connection session state: login progress, the authenticated user and
//! the pending data endpoint. Transitions are plain methods with no I/O so
//! the state machine can be exercised directly.

use std::net::{SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};

use crate::auth::CredentialStore;
use crate::error::AuthError;

/// Login progress of a control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingUser,
    AwaitingPassword { username: String },
    Ready,
    Closed,
}

/// State of one accepted control connection.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    root: PathBuf,
    state: SessionState,
    authenticated_user: Option<String>,
    pending_data_endpoint: Option<SocketAddrV4>,
}

impl Session {
    pub fn new(peer: SocketAddr, root: PathBuf) -> Self {
        Self {
            peer,
            root,
            state: SessionState::AwaitingUser,
            authenticated_user: None,
            pending_data_endpoint: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// The directory this session is confined to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn authenticated_user(&self) -> Option<&str> {
        self.authenticated_user.as_deref()
    }

    /// USER: remember the name and wait for PASS.
    pub fn begin_login(&mut self, username: &str) {
        self.state = SessionState::AwaitingPassword {
            username: username.to_string(),
        };
    }

    /// PASS: only valid right after USER.
    ///
    /// On success the session becomes `Ready` and the user is recorded. On a
    /// mismatch it falls back to `AwaitingUser`. Without a preceding USER the
    /// state is left untouched.
    pub fn complete_login(
        &mut self,
        password: &str,
        credentials: &CredentialStore,
    ) -> Result<&str, AuthError> {
        let username = match &self.state {
            SessionState::AwaitingPassword { username } => username.clone(),
            _ => return Err(AuthError::BadSequence),
        };

        if credentials.check_password(&username, password) {
            self.state = SessionState::Ready;
            Ok(self.authenticated_user.insert(username).as_str())
        } else {
            self.state = SessionState::AwaitingUser;
            Err(AuthError::InvalidCredentials(username))
        }
    }

    /// PORT, LIST, RETR and STOR are allowed once a login has succeeded on
    /// this connection.
    pub fn require_login(&self) -> Result<(), AuthError> {
        if self.authenticated_user.is_some() {
            Ok(())
        } else {
            Err(AuthError::NotLoggedIn)
        }
    }

    /// Records the endpoint for the next transfer, replacing any unused one.
    pub fn set_data_endpoint(&mut self, endpoint: SocketAddrV4) -> Option<SocketAddrV4> {
        self.pending_data_endpoint.replace(endpoint)
    }

    /// Consumes the pending endpoint.
    pub fn take_data_endpoint(&mut self) -> Option<SocketAddrV4> {
        self.pending_data_endpoint.take()
    }

    /// Terminal transition; drops everything tied to the connection.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        self.authenticated_user = None;
        self.pending_data_endpoint = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserEntry;
    use std::net::Ipv4Addr;

    fn credentials() -> CredentialStore {
        CredentialStore::from_entries([UserEntry::new("alice", "alice123")].iter())
    }

    fn session() -> Session {
        Session::new("127.0.0.1:40000".parse().unwrap(), PathBuf::from("/srv"))
    }

    #[test]
    fn successful_login_reaches_ready() {
        let mut session = session();
        assert_eq!(session.require_login(), Err(AuthError::NotLoggedIn));

        session.begin_login("alice");
        assert_eq!(
            session.state(),
            &SessionState::AwaitingPassword {
                username: "alice".into()
            }
        );
        assert_eq!(session.complete_login("alice123", &credentials()), Ok("alice"));
        assert_eq!(session.state(), &SessionState::Ready);
        assert_eq!(session.authenticated_user(), Some("alice"));
        assert!(session.require_login().is_ok());
    }

    #[test]
    fn wrong_password_returns_to_awaiting_user() {
        let mut session = session();
        session.begin_login("alice");
        assert_eq!(
            session.complete_login("nope", &credentials()),
            Err(AuthError::InvalidCredentials("alice".into()))
        );
        assert_eq!(session.state(), &SessionState::AwaitingUser);

        // A second PASS now needs a fresh USER.
        assert_eq!(
            session.complete_login("alice123", &credentials()),
            Err(AuthError::BadSequence)
        );
    }

    #[test]
    fn pass_without_user_leaves_state_unchanged() {
        let mut session = session();
        assert_eq!(
            session.complete_login("alice123", &credentials()),
            Err(AuthError::BadSequence)
        );
        assert_eq!(session.state(), &SessionState::AwaitingUser);
    }

    #[test]
    fn user_after_login_keeps_authorization() {
        let mut session = session();
        session.begin_login("alice");
        session.complete_login("alice123", &credentials()).unwrap();

        session.begin_login("bob");
        assert!(matches!(session.state(), SessionState::AwaitingPassword { .. }));
        assert!(session.require_login().is_ok());
    }

    #[test]
    fn port_overwrites_and_transfer_consumes_endpoint() {
        let mut session = session();
        let first = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 2000);
        let second = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000);

        assert_eq!(session.set_data_endpoint(first), None);
        assert_eq!(session.set_data_endpoint(second), Some(first));
        assert_eq!(session.take_data_endpoint(), Some(second));
        assert_eq!(session.take_data_endpoint(), None);
    }

    #[test]
    fn close_clears_everything() {
        let mut session = session();
        session.begin_login("alice");
        session.complete_login("alice123", &credentials()).unwrap();
        session.set_data_endpoint(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 2000));

        session.close();
        assert_eq!(session.state(), &SessionState::Closed);
        assert_eq!(session.authenticated_user(), None);
        assert_eq!(session.take_data_endpoint(), None);
    }
}
