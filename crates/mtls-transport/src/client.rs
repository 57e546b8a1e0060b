//! Client side: dial a peer with the live client configuration.

use std::sync::Arc;

use mtls_core::ClientHandshake;
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{TlsConnector, TlsStream};
use tracing::{info, warn};

use crate::connection::PeerConnection;
use crate::error::{Result, TransportError};

/// Opens TLS connections for the peer client role.
#[derive(Clone)]
pub struct PeerConnector {
    handshake: Arc<dyn ClientHandshake>,
}

impl PeerConnector {
    pub fn new(handshake: Arc<dyn ClientHandshake>) -> Self {
        Self { handshake }
    }

    /// Run the client handshake over `io`.
    ///
    /// `server_name` is sent as SNI only; the server's certificate is checked
    /// by subject, not by name. Fails without dialling while no client
    /// certificate is available.
    pub async fn connect<IO>(&self, server_name: &str, io: IO) -> Result<PeerConnection<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|e| TransportError::ServerName(e.to_string()))?;

        self.handshake.select_client_certificate().inspect_err(|e| {
            warn!(server = server_name, error = %e, "not connecting");
        })?;

        let connector = TlsConnector::from(self.handshake.client_config());
        let stream = connector
            .connect(name, io)
            .await
            .map_err(TransportError::Handshake)?;

        let conn = PeerConnection::new(TlsStream::Client(stream));
        info!(
            server = server_name,
            peer = conn.peer_common_name().unwrap_or("<anonymous>"),
            "connected"
        );
        Ok(conn)
    }
}
