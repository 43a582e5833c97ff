// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unknown platform: {0}")]
    InvalidPlatform(String),

    #[error("Unknown probe kind: {0}")]
    InvalidProbe(String),

    #[error("Invalid host {0}")]
    InvalidHost(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
