//! Session registry
//!
//! Tracks active control connections for the connection limit and for
//! connect/disconnect logging.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Registry of active sessions keyed by peer address
pub struct SessionRegistry {
    sessions: HashMap<SocketAddr, Instant>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
        }
    }

    /// Registers `addr` unless the registry is full.
    pub fn try_register(&mut self, addr: SocketAddr) -> bool {
        if self.sessions.len() >= self.max_sessions {
            return false;
        }
        self.sessions.insert(addr, Instant::now());
        true
    }

    /// Removes `addr`, returning how long its session lasted.
    pub fn remove(&mut self, addr: &SocketAddr) -> Option<Duration> {
        self.sessions.remove(addr).map(|started| started.elapsed())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}
