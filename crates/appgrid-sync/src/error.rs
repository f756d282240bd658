//! Synchronization error types.

use appgrid_state::StateError;
use thiserror::Error;

/// Errors that can occur while reconciling component state.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no free plugin port left in {start}-{end}")]
    PortRangeExhausted { start: u16, end: u16 },

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("synchronization panicked: {0}")]
    Panicked(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Coarse classification used by callers to pick a user-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    System,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::State(e) if e.is_not_found() => ErrorKind::NotFound,
            SyncError::Conflict(_) | SyncError::PortRangeExhausted { .. } => ErrorKind::Conflict,
            SyncError::State(_) | SyncError::Panicked(_) => ErrorKind::System,
        }
    }

    /// Whether the message is meant for the tenant rather than operators.
    pub fn is_user_facing(&self) -> bool {
        self.kind() != ErrorKind::System
    }
}
