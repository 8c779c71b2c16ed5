//! Persistence seams shared by the score store, alert log, and scheduler state.

pub mod memory;

pub use memory::InMemoryStore;

use crate::error::ErrorKind;

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::NotFound => ErrorKind::NotFound,
            RepositoryError::Unavailable(_) => ErrorKind::InfrastructureFailure,
        }
    }
}
