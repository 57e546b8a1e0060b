//! Trust pools and the capability that supplies the current one.
//!
//! The [`TrustSource`] trait abstracts the external CA manager. It is
//! consulted lazily inside handshake callbacks, so a rotated CA bundle takes
//! effect on the next handshake. [`MemoryTrust`] provides a swappable
//! in-memory implementation suitable for tests and short-lived processes.

use std::io::BufReader;
use std::sync::{Arc, PoisonError, RwLock};

use rustls::{DistinguishedName, RootCertStore};
use rustls_pki_types::{CertificateDer, TrustAnchor};

use crate::error::{Result, TlsError};

/// An immutable set of trusted root certificates.
#[derive(Debug, Clone)]
pub struct TrustPool {
    roots: Arc<RootCertStore>,
    subjects: Vec<DistinguishedName>,
}

impl TrustPool {
    /// Build a pool from DER-encoded root certificates.
    pub fn from_der<I>(certs: I) -> Result<Self>
    where
        I: IntoIterator<Item = CertificateDer<'static>>,
    {
        let mut store = RootCertStore::empty();
        for cert in certs {
            store
                .add(cert)
                .map_err(|e| TlsError::InvalidCertificate(format!("trust anchor: {e}")))?;
        }
        Ok(Self::from_root_store(store))
    }

    /// Build a pool from a PEM bundle containing one or more certificates.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let certs = rustls_pemfile::certs(&mut BufReader::new(pem))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TlsError::InvalidCertificate(format!("CA bundle PEM: {e}")))?;
        Self::from_der(certs)
    }

    /// Wrap an existing root store.
    pub fn from_root_store(store: RootCertStore) -> Self {
        let subjects = store.subjects();
        Self {
            roots: Arc::new(store),
            subjects,
        }
    }

    /// The roots as a shareable `rustls` store.
    pub fn root_store(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }

    /// The trust anchors for chain building.
    pub fn anchors(&self) -> &[TrustAnchor<'static>] {
        &self.roots.roots
    }

    /// Root subjects, advertised to clients as acceptable CA names.
    pub fn subjects(&self) -> &[DistinguishedName] {
        &self.subjects
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Read-only access to the current trust pool.
///
/// `Ok(None)` means "not ready": the control plane's root identity does not
/// exist yet. `Err` means the CA manager failed to produce a bundle.
pub trait TrustSource: Send + Sync {
    fn current(&self) -> Result<Option<Arc<TrustPool>>>;
}

/// In-memory trust source backed by `RwLock<Option<Arc<TrustPool>>>`.
#[derive(Debug, Default)]
pub struct MemoryTrust {
    current: RwLock<Option<Arc<TrustPool>>>,
}

impl MemoryTrust {
    /// Create an empty (not ready) trust source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trust source holding `pool`.
    pub fn with_pool(pool: TrustPool) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(pool))),
        }
    }

    /// Replace the current pool (CA rotation).
    pub fn set(&self, pool: TrustPool) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(pool));
    }

    /// Drop the current pool, returning the source to "not ready".
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl TrustSource for MemoryTrust {
    fn current(&self) -> Result<Option<Arc<TrustPool>>> {
        Ok(self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCa;

    #[test]
    fn pool_from_der_holds_every_root() {
        let a = TestCa::new("root-a");
        let b = TestCa::new("root-b");
        let pool = TrustPool::from_der([a.der(), b.der()]).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.anchors().len(), 2);
        assert_eq!(pool.subjects().len(), 2);
    }

    #[test]
    fn pool_from_pem_bundle() {
        let a = TestCa::new("root-a");
        let b = TestCa::new("root-b");
        let bundle = format!("{}{}", a.pem(), b.pem());
        let pool = TrustPool::from_pem(bundle.as_bytes()).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn garbage_root_rejected() {
        let result = TrustPool::from_der([CertificateDer::from(vec![0u8; 16])]);
        assert!(matches!(result, Err(TlsError::InvalidCertificate(_))));
    }

    #[test]
    fn empty_pem_yields_empty_pool() {
        let pool = TrustPool::from_pem(b"").unwrap();
        assert!(pool.is_empty());
    }

    #[test]
    fn memory_trust_starts_not_ready() {
        let source = MemoryTrust::new();
        assert!(source.current().unwrap().is_none());
    }

    #[test]
    fn memory_trust_rotates() {
        let first = TestCa::new("first");
        let second = TestCa::new("second");
        let source = MemoryTrust::with_pool(first.trust_pool());

        let before = source.current().unwrap().unwrap();
        source.set(second.trust_pool());
        let after = source.current().unwrap().unwrap();

        assert_ne!(before.anchors()[0].subject, after.anchors()[0].subject);

        source.clear();
        assert!(source.current().unwrap().is_none());
    }
}
