//! Errors raised by the sync service.

use marketsync_core::{ConnectionId, CredentialError};
use thiserror::Error;

use crate::platform::PlatformError;
use crate::store::StoreError;

/// Errors that can occur while syncing.
///
/// Most of these are recorded per item or per connection rather than
/// returned; see [`SyncService`](crate::sync::SyncService).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The connection exists but is not authorized any more.
    #[error("Connection {0} is not connected")]
    NotConnected(ConnectionId),

    /// No connection with this id belongs to the organization.
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The connection's stored credentials cannot build a client.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// A platform call failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// A store read or write failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The order window cannot be computed or ends before it starts.
    #[error("Invalid order window: {0}")]
    InvalidOrderWindow(String),

    /// The run was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether this error means the platform rejected the connection's
    /// tokens.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Platform(err) if err.is_unauthorized())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
