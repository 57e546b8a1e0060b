//! Process identity: the current leaf certificate and the naming contract
//! for internally issued peer certificates.
//!
//! The [`IdentitySource`] trait abstracts the external certificate-lifecycle
//! manager. Every handshake reads a fresh snapshot, so a rotated certificate
//! is served on the very next connection.

pub mod certificate;
pub mod subject;

use std::sync::{Arc, PoisonError, RwLock};

use rustls::sign::CertifiedKey;

pub use certificate::{load_certified_key, load_certified_key_der};
pub use subject::{KeyPurpose, PeerRole, SubjectNaming};

/// Read-only access to the current leaf certificate.
///
/// `None` means "not ready": no certificate has been issued yet.
pub trait IdentitySource: Send + Sync {
    fn current(&self) -> Option<Arc<CertifiedKey>>;
}

/// In-memory identity source backed by `RwLock<Option<Arc<CertifiedKey>>>`.
#[derive(Debug, Default)]
pub struct MemoryIdentity {
    current: RwLock<Option<Arc<CertifiedKey>>>,
}

impl MemoryIdentity {
    /// Create an identity source with no certificate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an identity source holding `key`.
    pub fn with_key(key: Arc<CertifiedKey>) -> Self {
        Self {
            current: RwLock::new(Some(key)),
        }
    }

    /// Replace the current certificate (rotation).
    pub fn set(&self, key: Arc<CertifiedKey>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
    }

    /// Drop the current certificate.
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentitySource for MemoryIdentity {
    fn current(&self) -> Option<Arc<CertifiedKey>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
