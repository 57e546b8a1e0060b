//! Error types for handshake configuration and peer verification.
//!
//! Every failure in this crate aborts exactly one handshake. Errors handed to
//! `rustls` are wrapped in [`rustls::Error::Other`] so callers on the far side
//! of the runtime can downcast back to [`TlsError`] and tell a "not ready"
//! condition apart from a verification failure.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur within the `mtls-core` crate.
#[derive(Debug, Error)]
pub enum TlsError {
    // --- Not ready ---
    #[error("No server certificate, server is not yet ready to receive traffic")]
    ServerNotReady,

    #[error("No client certificate, client is not yet ready to talk to the server")]
    ClientNotReady,

    #[error("No ca certificate, server is not yet ready to receive traffic")]
    TrustNotReady,

    #[error("failed to get current CA bundle: {0}")]
    TrustSource(String),

    // --- Peer verification ---
    #[error("no client certificate provided")]
    NoPeerCertificate,

    #[error("failed to parse peer certificate: {0}")]
    PeerCertificateParse(String),

    #[error("could not verify peer certificate: {0}")]
    ChainVerification(String),

    #[error("common name is invalid, expected {expected}, but got {actual}")]
    CommonNameMismatch { expected: String, actual: String },

    // --- Loading / configuration ---
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("TLS configuration error: {0}")]
    TlsConfiguration(String),

    #[error("invalid cluster configuration: {0}")]
    ClusterConfig(#[from] serde_json::Error),
}

impl TlsError {
    /// Returns true for the startup-race errors a caller may retry later.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            TlsError::ServerNotReady | TlsError::ClientNotReady | TlsError::TrustNotReady
        )
    }

    /// Recover a [`TlsError`] from an error surfaced by the TLS runtime.
    pub fn from_rustls(err: &rustls::Error) -> Option<&TlsError> {
        match err {
            rustls::Error::Other(other) => other.0.downcast_ref::<TlsError>(),
            _ => None,
        }
    }
}

impl From<TlsError> for rustls::Error {
    fn from(err: TlsError) -> Self {
        rustls::Error::Other(rustls::OtherError(Arc::new(err)))
    }
}

/// Result type alias using [`TlsError`].
pub type Result<T> = std::result::Result<T, TlsError>;
