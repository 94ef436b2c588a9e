//! Authentication system
//!
//! Holds the credential table shared read-only by every session.

pub mod credentials;

pub use credentials::CredentialStore;
