//! Server side: accept one connection with a per-client configuration.
//!
//! The ClientHello is read before any configuration exists, so the current
//! identity, trust pool and cluster policy are all looked up for this
//! client alone.

use std::sync::Arc;

use mtls_core::ServerHandshake;
use rustls::server::Acceptor;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{LazyConfigAcceptor, TlsStream};
use tracing::{info, warn};

use crate::connection::PeerConnection;
use crate::error::{Result, TransportError};

/// Accepts TLS connections for a server role.
#[derive(Clone)]
pub struct PeerAcceptor {
    handshake: Arc<dyn ServerHandshake>,
}

impl PeerAcceptor {
    pub fn new(handshake: Arc<dyn ServerHandshake>) -> Self {
        Self { handshake }
    }

    /// Run the server handshake over `io`.
    ///
    /// A configuration failure (not ready, trust source error) drops the
    /// connection without a TLS alert.
    pub async fn accept<IO>(&self, io: IO) -> Result<PeerConnection<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let start = LazyConfigAcceptor::new(Acceptor::default(), io)
            .await
            .map_err(TransportError::Handshake)?;

        let config = self.handshake.build_config_for_client().inspect_err(|e| {
            warn!(error = %e, "refusing connection");
        })?;

        let stream = start
            .into_stream(config)
            .await
            .map_err(TransportError::Handshake)?;

        let conn = PeerConnection::new(TlsStream::Server(stream));
        info!(
            peer = conn.peer_common_name().unwrap_or("<anonymous>"),
            version = ?conn.protocol_version(),
            "accepted connection"
        );
        Ok(conn)
    }
}
