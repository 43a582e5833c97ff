// Session Connector Port
// Establishes the single authenticated session to the vantage host

use super::command_executor::CommandExecutor;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Connection errors (fatal to the remote phase of a cycle)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("TCP connect to {addr} failed: {reason}")]
    Tcp { addr: String, reason: String },

    #[error("SSH handshake failed: {0}")]
    Handshake(String),

    #[error("Host key for {host} is not known and policy is reject")]
    HostKeyRejected { host: String },

    #[error("Host key for {host} does not match known_hosts")]
    HostKeyMismatch { host: String },

    #[error("Authentication failed for {user}: {reason}")]
    Auth { user: String, reason: String },

    #[error("Session error: {0}")]
    Session(String),
}

/// Session connector trait
///
/// The returned executor is shared by every remote probe until it breaks.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Open and authenticate a session
    ///
    /// # Errors
    /// - ConnectionError::Tcp / Handshake if the host cannot be reached
    /// - ConnectionError::HostKeyRejected / HostKeyMismatch per host key policy
    /// - ConnectionError::Auth if credentials are refused
    async fn connect(&self) -> Result<Arc<dyn CommandExecutor>, ConnectionError>;

    /// Vantage host name (for logs and observations)
    fn vantage(&self) -> &str;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock connector that hands out a fixed executor, or always fails
    pub struct MockSessionConnector {
        vantage: String,
        executor: Option<Arc<dyn CommandExecutor>>,
        connects: AtomicUsize,
    }

    impl MockSessionConnector {
        pub fn new(vantage: impl Into<String>, executor: Arc<dyn CommandExecutor>) -> Self {
            Self {
                vantage: vantage.into(),
                executor: Some(executor),
                connects: AtomicUsize::new(0),
            }
        }

        pub fn failing(vantage: impl Into<String>) -> Self {
            Self {
                vantage: vantage.into(),
                executor: None,
                connects: AtomicUsize::new(0),
            }
        }

        pub fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionConnector for MockSessionConnector {
        async fn connect(&self) -> Result<Arc<dyn CommandExecutor>, ConnectionError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match &self.executor {
                Some(executor) => Ok(Arc::clone(executor)),
                None => Err(ConnectionError::Auth {
                    user: "netmon".to_string(),
                    reason: "mock refuses".to_string(),
                }),
            }
        }

        fn vantage(&self) -> &str {
            &self.vantage
        }
    }
}
