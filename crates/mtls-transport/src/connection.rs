//! Established TLS connection wrapper.
//!
//! After the handshake succeeds, `PeerConnection` holds the stream and
//! caches the peer leaf's subject common name.

use mtls_core::tls::cert_extract;
use rustls::{CommonState, ProtocolVersion, SupportedCipherSuite};
use tokio_rustls::TlsStream;
use tracing::debug;

/// A TLS connection whose handshake, including peer verification, completed.
pub struct PeerConnection<IO> {
    stream: TlsStream<IO>,
    peer_common_name: Option<String>,
}

impl<IO> PeerConnection<IO> {
    pub(crate) fn new(stream: TlsStream<IO>) -> Self {
        let peer_common_name = match state(&stream).peer_certificates() {
            Some([leaf, ..]) => cert_extract::common_name(leaf)
                .inspect_err(|e| debug!(error = %e, "peer common name not readable"))
                .ok(),
            // The server allowed an anonymous client.
            _ => None,
        };
        Self {
            stream,
            peer_common_name,
        }
    }

    /// Subject common name of the peer's leaf.
    ///
    /// `None` for an anonymous peer, or when the name is not held in a
    /// UTF-8 compatible string type.
    pub fn peer_common_name(&self) -> Option<&str> {
        self.peer_common_name.as_deref()
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        state(&self.stream).protocol_version()
    }

    pub fn negotiated_cipher_suite(&self) -> Option<SupportedCipherSuite> {
        state(&self.stream).negotiated_cipher_suite()
    }

    pub fn get_ref(&self) -> &TlsStream<IO> {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut TlsStream<IO> {
        &mut self.stream
    }

    pub fn into_inner(self) -> TlsStream<IO> {
        self.stream
    }
}

fn state<IO>(stream: &TlsStream<IO>) -> &CommonState {
    match stream {
        TlsStream::Client(s) => s.get_ref().1,
        TlsStream::Server(s) => s.get_ref().1,
    }
}
