//! Per-handshake configuration surface.
//!
//! [`ServerHandshake`] and [`ClientHandshake`] are what a host runtime
//! drives: certificate selection, the configuration for one incoming client,
//! peer verification and the resolved protocol parameters. The `rustls`
//! adapters at the bottom of this module plug identity lookups into
//! `rustls`'s resolver traits.

use std::fmt;
use std::sync::Arc;

use rustls::client::ResolvesClientCert;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::{CipherSuite, ClientConfig, ProtocolVersion, ServerConfig, SignatureScheme};
use rustls_pki_types::CertificateDer;
use tracing::warn;

use crate::error::{Result, TlsError};
use crate::identity::IdentitySource;

/// Client certificate policy of a server role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientAuth {
    /// Never request a client certificate.
    None,
    /// Request one; verify it only if the client sends it.
    VerifyIfGiven,
    /// Require a certificate and verify it.
    RequireAndVerify,
}

impl ClientAuth {
    /// Whether a presented client certificate is checked against a trust pool.
    pub fn verifies(&self) -> bool {
        !matches!(self, ClientAuth::None)
    }
}

/// Protocol parameters resolved for one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeParameters {
    pub min_version: ProtocolVersion,
    /// Requested TLS 1.2 suites in preference order. Empty means runtime defaults.
    pub cipher_suites: Vec<CipherSuite>,
    pub client_auth: ClientAuth,
    /// False when hostname checks are replaced by subject verification.
    pub verify_hostname: bool,
}

/// Server side of a live TLS configuration.
pub trait ServerHandshake: Send + Sync {
    /// The certificate to serve right now.
    fn select_server_certificate(&self) -> Result<Arc<CertifiedKey>>;

    /// Build the configuration for one incoming client.
    ///
    /// Called after the ClientHello is read. Reads the current identity,
    /// trust pool and cluster policy.
    fn build_config_for_client(&self) -> Result<Arc<ServerConfig>>;

    /// Verify a client's chain (leaf first) the way the handshake would.
    fn verify_peer(&self, chain: &[CertificateDer<'_>]) -> Result<()>;

    /// The parameters the next handshake would use.
    fn parameters(&self) -> HandshakeParameters;
}

/// Client side of a live TLS configuration.
pub trait ClientHandshake: Send + Sync {
    /// The certificate to present right now.
    fn select_client_certificate(&self) -> Result<Arc<CertifiedKey>>;

    /// Verify a server's chain (leaf first) the way the handshake would.
    fn verify_peer(&self, chain: &[CertificateDer<'_>]) -> Result<()>;

    /// The `rustls` configuration; lookups happen inside its callbacks.
    fn client_config(&self) -> Arc<ClientConfig>;

    fn parameters(&self) -> HandshakeParameters;
}

pub(crate) fn server_certificate(identity: &dyn IdentitySource) -> Result<Arc<CertifiedKey>> {
    identity.current().ok_or(TlsError::ServerNotReady)
}

pub(crate) fn client_certificate(identity: &dyn IdentitySource) -> Result<Arc<CertifiedKey>> {
    identity.current().ok_or(TlsError::ClientNotReady)
}

// ---------------------------------------------------------------------------
// rustls adapters
// ---------------------------------------------------------------------------

/// Serves one certificate chosen before the handshake started.
#[derive(Debug)]
pub struct PinnedCertResolver {
    key: Arc<CertifiedKey>,
}

impl PinnedCertResolver {
    pub fn new(key: Arc<CertifiedKey>) -> Self {
        Self { key }
    }
}

impl ResolvesServerCert for PinnedCertResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(Arc::clone(&self.key))
    }
}

/// Presents the current client certificate at the moment the server asks.
pub struct IdentityCertResolver {
    identity: Arc<dyn IdentitySource>,
}

impl IdentityCertResolver {
    pub fn new(identity: Arc<dyn IdentitySource>) -> Self {
        Self { identity }
    }
}

impl fmt::Debug for IdentityCertResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCertResolver").finish_non_exhaustive()
    }
}

impl ResolvesClientCert for IdentityCertResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        match client_certificate(&*self.identity) {
            Ok(key) => Some(key),
            Err(e) => {
                // rustls sends an empty certificate; the server then refuses.
                warn!(error = %e, "no client certificate to present");
                None
            }
        }
    }

    fn has_certs(&self) -> bool {
        true
    }
}
