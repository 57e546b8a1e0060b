//! Process-wide TLS settings and the immutable context built from them.

use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::RootCertStore;
use serde::{Deserialize, Serialize};

use crate::cipher::CipherTable;
use crate::error::Result;
use crate::identity::subject::{DEFAULT_COMPONENT, DEFAULT_SUBJECT_PREFIX};
use crate::identity::SubjectNaming;
use crate::tls::verifier::PeerVerifier;

/// Startup settings. Fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsSettings {
    /// Identities come from an external issuer: accept intermediates and
    /// skip the subject name check.
    pub externally_managed: bool,
    pub subject_prefix: String,
    pub component: String,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            externally_managed: false,
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            component: DEFAULT_COMPONENT.to_string(),
        }
    }
}

impl TlsSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn naming(&self) -> SubjectNaming {
        SubjectNaming::new(self.subject_prefix.clone(), self.component.clone())
    }
}

/// Everything the config factory needs that never changes after startup.
///
/// Built once and shared by `Arc` across every handshake.
#[derive(Debug)]
pub struct TlsContext {
    provider: Arc<CryptoProvider>,
    ciphers: CipherTable,
    system_roots: Arc<RootCertStore>,
    verifier: Arc<PeerVerifier>,
}

impl TlsContext {
    pub fn new(settings: TlsSettings) -> Self {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let system_roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let verifier = PeerVerifier::new(
            provider.signature_verification_algorithms,
            settings.externally_managed,
            settings.naming(),
        );

        Self {
            provider,
            ciphers: CipherTable::new(),
            system_roots: Arc::new(system_roots),
            verifier: Arc::new(verifier),
        }
    }

    pub fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    pub fn cipher_table(&self) -> &CipherTable {
        &self.ciphers
    }

    /// Public web roots, used to check client certificates offered to the
    /// metrics endpoint.
    pub fn system_roots(&self) -> &Arc<RootCertStore> {
        &self.system_roots
    }

    pub fn peer_verifier(&self) -> &Arc<PeerVerifier> {
        &self.verifier
    }
}

impl Default for TlsContext {
    fn default() -> Self {
        Self::new(TlsSettings::default())
    }
}
