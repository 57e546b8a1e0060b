//! Peer certificate verification for internal mTLS connections.
//!
//! Internally issued peer certificates carry no DNS names or IP addresses, so
//! the runtime's hostname verification cannot be used. [`PeerVerifier`]
//! replaces it: the presented chain must lead to a root in the current
//! [`TrustPool`], the leaf must carry the required extended key usage, and,
//! unless identities are externally managed, the leaf's common name must be
//! exactly `<prefix>:system:<role>:<component>`.
//!
//! `PeerClientCertVerifier` (server side) and `PeerServerCertVerifier`
//! (client side) plug it into `rustls`. Signature verification of the
//! handshake itself is delegated to the crypto provider.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, Error as RustlsError, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::{error, warn};

use crate::error::{Result, TlsError};
use crate::identity::{IdentitySource, KeyPurpose, PeerRole, SubjectNaming};
use crate::tls::cert_extract;
use crate::tls::handshake::client_certificate;
use crate::trust::{TrustPool, TrustSource};

/// Verifies raw peer chains against a trust pool.
///
/// Immutable after construction; shared by every handshake of the process.
#[derive(Debug, Clone)]
pub struct PeerVerifier {
    algorithms: WebPkiSupportedAlgorithms,
    externally_managed: bool,
    naming: SubjectNaming,
}

impl PeerVerifier {
    pub fn new(
        algorithms: WebPkiSupportedAlgorithms,
        externally_managed: bool,
        naming: SubjectNaming,
    ) -> Self {
        Self {
            algorithms,
            externally_managed,
            naming,
        }
    }

    /// Verify a presented chain (leaf first).
    ///
    /// Intermediates are only considered when identities are externally
    /// managed; internally issued identities chain directly to a root.
    pub fn verify(
        &self,
        chain: &[CertificateDer<'_>],
        pool: &TrustPool,
        usage: KeyPurpose,
        role: PeerRole,
        now: UnixTime,
    ) -> Result<()> {
        // Unreachable when the handshake requires a certificate.
        let Some((leaf, rest)) = chain.split_first() else {
            return Err(TlsError::NoPeerCertificate);
        };

        let intermediates = if self.externally_managed {
            intermediate_pool(rest)
        } else {
            Vec::new()
        };

        let cert = webpki::EndEntityCert::try_from(leaf)
            .map_err(|e| TlsError::PeerCertificateParse(format!("{e:?}")))?;

        cert.verify_for_usage(
            self.algorithms.all,
            pool.anchors(),
            &intermediates,
            now,
            usage.to_webpki(),
            None,
            None,
        )
        .map_err(|e| TlsError::ChainVerification(format!("{e:?}")))?;

        // Foreign issuers may encode the subject in any string type.
        if !self.externally_managed {
            let common_name = cert_extract::common_name(leaf)?;
            let expected = self.naming.expected_common_name(role);
            if common_name != expected {
                return Err(TlsError::CommonNameMismatch {
                    expected,
                    actual: common_name,
                });
            }
        }

        Ok(())
    }

    pub fn algorithms(&self) -> &WebPkiSupportedAlgorithms {
        &self.algorithms
    }
}

/// Keep the intermediates that parse; the chain check is the real gate.
fn intermediate_pool<'a>(raw: &[CertificateDer<'a>]) -> Vec<CertificateDer<'a>> {
    raw.iter()
        .filter(|cert| {
            let ok = cert_extract::is_parsable(cert);
            if !ok {
                warn!("failed to parse peer intermediate certificate, skipping");
            }
            ok
        })
        .cloned()
        .collect()
}

fn presented_chain<'a>(
    end_entity: &CertificateDer<'a>,
    intermediates: &[CertificateDer<'a>],
) -> Vec<CertificateDer<'a>> {
    let mut chain = Vec::with_capacity(1 + intermediates.len());
    chain.push(end_entity.clone());
    chain.extend_from_slice(intermediates);
    chain
}

// ---------------------------------------------------------------------------
// Server side: verifies the connecting client's certificate
// ---------------------------------------------------------------------------

/// Client certificate verifier for the peer server role.
///
/// Holds the trust pool snapshot taken when the connection's configuration
/// was built, so the pool cannot change mid-handshake.
pub struct PeerClientCertVerifier {
    verifier: Arc<PeerVerifier>,
    pool: Arc<TrustPool>,
    role: PeerRole,
}

impl PeerClientCertVerifier {
    pub fn new(verifier: Arc<PeerVerifier>, pool: Arc<TrustPool>, role: PeerRole) -> Self {
        Self {
            verifier,
            pool,
            role,
        }
    }
}

impl fmt::Debug for PeerClientCertVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerClientCertVerifier")
            .field("role", &self.role)
            .field("roots", &self.pool.len())
            .finish()
    }
}

impl ClientCertVerifier for PeerClientCertVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        self.pool.subjects()
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, RustlsError> {
        let chain = presented_chain(end_entity, intermediates);
        self.verifier
            .verify(&chain, &self.pool, self.role.required_usage(), self.role, now)?;
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, RustlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, self.verifier.algorithms())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, RustlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, self.verifier.algorithms())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.verifier.algorithms().supported_schemes()
    }
}

// ---------------------------------------------------------------------------
// Client side: verifies the node's certificate
// ---------------------------------------------------------------------------

/// Server certificate verifier for the peer client role.
///
/// The server name is ignored; [`PeerVerifier`] checks the subject instead.
/// The trust pool is read from the [`TrustSource`] on every verification.
///
/// With an identity attached, verification also fails while no client
/// certificate is available. The server's certificate is checked before
/// ours is sent, so this is where a not-ready client aborts its handshake.
pub struct PeerServerCertVerifier {
    verifier: Arc<PeerVerifier>,
    trust: Arc<dyn TrustSource>,
    identity: Option<Arc<dyn IdentitySource>>,
    role: PeerRole,
}

impl PeerServerCertVerifier {
    pub fn new(verifier: Arc<PeerVerifier>, trust: Arc<dyn TrustSource>, role: PeerRole) -> Self {
        Self {
            verifier,
            trust,
            identity: None,
            role,
        }
    }

    /// Refuse to continue a handshake while `identity` has no certificate.
    pub fn with_identity(mut self, identity: Arc<dyn IdentitySource>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Verify `chain` against the current trust pool.
    pub fn verify_chain(&self, chain: &[CertificateDer<'_>], now: UnixTime) -> Result<()> {
        let pool = current_pool(&*self.trust)?;
        self.verifier
            .verify(chain, &pool, self.role.required_usage(), self.role, now)
    }
}

impl fmt::Debug for PeerServerCertVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerServerCertVerifier")
            .field("role", &self.role)
            .field("requires_identity", &self.identity.is_some())
            .finish_non_exhaustive()
    }
}

impl ServerCertVerifier for PeerServerCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, RustlsError> {
        if let Some(identity) = &self.identity {
            client_certificate(&**identity).inspect_err(|e| {
                warn!(error = %e, "aborting handshake");
            })?;
        }
        let chain = presented_chain(end_entity, intermediates);
        self.verify_chain(&chain, now)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, RustlsError> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, self.verifier.algorithms())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, RustlsError> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, self.verifier.algorithms())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.verifier.algorithms().supported_schemes()
    }
}

/// Read the current pool, mapping "not ready" and source failures to errors.
pub(crate) fn current_pool(trust: &dyn TrustSource) -> Result<Arc<TrustPool>> {
    match trust.current() {
        Ok(Some(pool)) => Ok(pool),
        Ok(None) => Err(TlsError::TrustNotReady),
        Err(e) => {
            error!(error = %e, "failed to get current CA bundle");
            Err(e)
        }
    }
}
