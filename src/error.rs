use thiserror::Error;

/// Failures reaching the relay target. Both kinds surface as
/// [`BridgeError::RelayFailed`] and are handled identically by callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("relay authentication failed: {0}")]
    AuthFailed(String),
    #[error("relay delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("session already exists")]
    AlreadyExists,
    #[error("session not found")]
    NotFound,
    #[error("WhatsApp not connected")]
    NotConnected,
    #[error("QR code not available")]
    NotAvailable,
    #[error("missing parameters")]
    MissingParameters,
    #[error("failed to send message: {0}")]
    SendFailed(String),
    #[error(transparent)]
    RelayFailed(#[from] RelayError),
    #[error("WhatsApp client error: {0}")]
    ClientFailed(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
