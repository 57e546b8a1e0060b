//! Error types for the transport layer.

use mtls_core::TlsError;
use thiserror::Error;

/// Errors that can occur while establishing a connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("TLS configuration error: {0}")]
    Config(#[from] TlsError),

    #[error("handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    #[error("invalid server name: {0}")]
    ServerName(String),
}

impl TransportError {
    /// The configuration or verification error behind this failure, if the
    /// handshake was aborted by one of our callbacks.
    pub fn tls_error(&self) -> Option<&TlsError> {
        match self {
            TransportError::Config(e) => Some(e),
            TransportError::Handshake(io) => io
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<rustls::Error>())
                .and_then(TlsError::from_rustls),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
