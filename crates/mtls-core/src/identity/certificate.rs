//! Loading leaf certificates into `rustls` signing identities.
//!
//! The certificate-lifecycle manager hands over PEM (from disk or a secret)
//! or DER material. Both paths produce a [`CertifiedKey`] ready to be served
//! from an [`IdentitySource`](super::IdentitySource).

use std::io::BufReader;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{Result, TlsError};

/// Build a [`CertifiedKey`] from a PEM certificate chain and PEM private key.
///
/// The chain is leaf first. PKCS#8, PKCS#1 and SEC1 keys are accepted.
pub fn load_certified_key(
    cert_pem: &[u8],
    key_pem: &[u8],
    provider: &CryptoProvider,
) -> Result<Arc<CertifiedKey>> {
    let chain = rustls_pemfile::certs(&mut BufReader::new(cert_pem))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TlsError::InvalidCertificate(format!("certificate PEM: {e}")))?;

    let key = rustls_pemfile::private_key(&mut BufReader::new(key_pem))
        .map_err(|e| TlsError::InvalidPrivateKey(format!("key PEM: {e}")))?
        .ok_or_else(|| TlsError::InvalidPrivateKey("no private key found in PEM".into()))?;

    load_certified_key_der(chain, key, provider)
}

/// Build a [`CertifiedKey`] from DER material.
pub fn load_certified_key_der(
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    provider: &CryptoProvider,
) -> Result<Arc<CertifiedKey>> {
    if chain.is_empty() {
        return Err(TlsError::InvalidCertificate(
            "certificate chain is empty".into(),
        ));
    }

    let signing_key = provider
        .key_provider
        .load_private_key(key)
        .map_err(|e| TlsError::InvalidPrivateKey(e.to_string()))?;

    Ok(Arc::new(CertifiedKey::new(chain, signing_key)))
}
