//! Error types for the channel and the controller.

use bingo_core::{CardError, PricingError, SelectionError};
use thiserror::Error;

use crate::protocol::ErrorCode;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("not connected")]
    NotConnected,
    #[error("gave up reconnecting after {attempts} attempts")]
    ConnectionExhausted { attempts: u32 },
    #[error("server rejected the connection ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("connection closed")]
    Closed,
    #[error("no tokio runtime available to drive the connection")]
    Runtime,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ChannelError {
    /// Errors that stop the channel until the caller reconnects explicitly.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChannelError::ConnectionExhausted { .. } | ChannelError::Rejected { .. }
        )
    }
}

/// Errors returned by [`GameSessionController`](crate::controller::GameSessionController).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    InvalidCard(#[from] CardError),
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: u64, required: u64 },
    #[error("purchase failed: {0}")]
    PurchaseFailed(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("card catalog unavailable: {0}")]
    Catalog(String),
    #[error("selection is empty")]
    EmptySelection,
    #[error("not in a session")]
    NotInSession,
    #[error("card {0} is not owned")]
    UnknownCard(String),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("cache error: {0}")]
    Cache(String),
}

impl SessionError {
    /// Rejected by local validation; nothing was sent and no state changed.
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            SessionError::Selection(_)
                | SessionError::Pricing(_)
                | SessionError::InvalidCard(_)
                | SessionError::InsufficientBalance { .. }
                | SessionError::EmptySelection
                | SessionError::NotInSession
                | SessionError::UnknownCard(_)
                | SessionError::NotAuthenticated
                | SessionError::Channel(ChannelError::NotConnected)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Channel(e) if e.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_is_fatal() {
        let err = SessionError::from(ChannelError::ConnectionExhausted { attempts: 5 });
        assert!(err.is_fatal());
        assert!(!err.is_local_rejection());
        assert_eq!(err.to_string(), "gave up reconnecting after 5 attempts");
    }

    #[test]
    fn test_local_rejections() {
        assert!(SessionError::EmptySelection.is_local_rejection());
        assert!(SessionError::from(ChannelError::NotConnected).is_local_rejection());
        assert!(!SessionError::PurchaseFailed("declined".into()).is_local_rejection());
    }
}
