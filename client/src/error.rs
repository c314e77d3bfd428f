//! Client error model

use mr600_crypto::CryptoError;
use mr600_protocol::FrameError;
use mr600_transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Network failure talking to the router
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Router answered with a status the step does not accept
    #[error("{endpoint} returned HTTP {status}")]
    UnexpectedStatus { endpoint: &'static str, status: u16 },

    /// Handshake or response body could not be parsed
    #[error("Malformed {context}: {detail}")]
    ProtocolFormat {
        context: &'static str,
        detail: String,
    },

    /// A handshake step did not yield the session cookie or token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Cookie/token pair rejected by the router
    #[error("Session expired (HTTP {status})")]
    SessionExpired { status: u16 },

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Router processed the frame but reported a non-zero error code
    #[error("Router returned error code {code}")]
    Router { code: i64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClientError {
    /// Network failures and 5xx answers; worth retrying for idempotent steps
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::UnexpectedStatus { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ClientError::Transport(TransportError::Timeout).is_retryable());
        assert!(
            ClientError::UnexpectedStatus {
                endpoint: "/cgi/login",
                status: 500
            }
            .is_retryable()
        );
        assert!(
            !ClientError::UnexpectedStatus {
                endpoint: "/cgi/login",
                status: 403
            }
            .is_retryable()
        );
        assert!(!ClientError::Authentication("no cookie".into()).is_retryable());
        assert!(!ClientError::SessionExpired { status: 500 }.is_retryable());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = ClientError::UnexpectedStatus {
            endpoint: "/cgi_gdpr",
            status: 403,
        };
        assert_eq!(err.to_string(), "/cgi_gdpr returned HTTP 403");

        let err = ClientError::ProtocolFormat {
            context: "encryption params",
            detail: "missing nn".into(),
        };
        assert_eq!(err.to_string(), "Malformed encryption params: missing nn");
    }
}
