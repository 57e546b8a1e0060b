//! Throwaway PKI for tests.
//!
//! Builds root and intermediate CAs and issues leaf certificates with
//! `rcgen`, so verifiers and handshake configurations can be exercised
//! without a live certificate-lifecycle manager.
//!
//! Available under `cfg(test)` and the `test-support` feature.

use std::sync::Arc;

pub use rcgen::{BmpString, DnValue, ExtendedKeyUsagePurpose};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::sign::CertifiedKey;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::identity::load_certified_key_der;
use crate::trust::TrustPool;

fn params_with_cn(common_name: DnValue, sans: Vec<String>) -> CertificateParams {
    let mut params = CertificateParams::new(sans).expect("certificate params");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params
}

fn utf8(name: &str) -> DnValue {
    DnValue::Utf8String(name.to_string())
}

fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = params_with_cn(utf8(common_name), Vec::new());
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params
}

/// A certificate authority able to issue leaves and sub-CAs.
pub struct TestCa {
    cert: Certificate,
    key: KeyPair,
    /// Certificates between this CA and the root, this CA first. Empty for a root.
    path: Vec<CertificateDer<'static>>,
}

impl TestCa {
    /// Create a self-signed root CA.
    pub fn new(common_name: &str) -> Self {
        let key = KeyPair::generate().expect("CA key generation");
        let cert = ca_params(common_name)
            .self_signed(&key)
            .expect("self-signed CA");
        Self {
            cert,
            key,
            path: Vec::new(),
        }
    }

    /// Create an intermediate CA signed by this CA.
    pub fn intermediate(&self, common_name: &str) -> TestCa {
        let key = KeyPair::generate().expect("intermediate key generation");
        let cert = ca_params(common_name)
            .signed_by(&key, &self.cert, &self.key)
            .expect("intermediate CA");
        let mut path = vec![cert.der().clone()];
        path.extend(self.path.iter().cloned());
        TestCa { cert, key, path }
    }

    /// Issue a leaf with the given common name, usages and DNS names.
    pub fn issue(
        &self,
        common_name: &str,
        usages: Vec<ExtendedKeyUsagePurpose>,
        sans: Vec<String>,
    ) -> TestLeaf {
        self.issue_named(utf8(common_name), usages, sans)
    }

    /// Like [`TestCa::issue`], with the common name in any ASN.1 string type.
    pub fn issue_named(
        &self,
        common_name: DnValue,
        usages: Vec<ExtendedKeyUsagePurpose>,
        sans: Vec<String>,
    ) -> TestLeaf {
        let key = KeyPair::generate().expect("leaf key generation");
        let mut params = params_with_cn(common_name, sans);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = usages;
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("leaf certificate");

        let mut chain = vec![cert.der().clone()];
        chain.extend(self.path.iter().cloned());

        TestLeaf {
            chain,
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
            key_der: key.serialize_der(),
        }
    }

    /// Issue a client-authentication leaf without DNS names.
    pub fn issue_client(&self, common_name: &str) -> TestLeaf {
        self.issue(common_name, vec![ExtendedKeyUsagePurpose::ClientAuth], Vec::new())
    }

    /// Issue a server-authentication leaf for the given DNS names.
    pub fn issue_server(&self, common_name: &str, sans: &[&str]) -> TestLeaf {
        self.issue(
            common_name,
            vec![ExtendedKeyUsagePurpose::ServerAuth],
            sans.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Issue a peer leaf usable in both directions, without DNS names.
    pub fn issue_peer(&self, common_name: &str) -> TestLeaf {
        self.issue(
            common_name,
            vec![
                ExtendedKeyUsagePurpose::ServerAuth,
                ExtendedKeyUsagePurpose::ClientAuth,
            ],
            Vec::new(),
        )
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    /// A pool trusting only this CA.
    pub fn trust_pool(&self) -> TrustPool {
        TrustPool::from_der([self.der()]).expect("CA must be a valid trust anchor")
    }
}

/// An issued leaf certificate with its private key.
pub struct TestLeaf {
    chain: Vec<CertificateDer<'static>>,
    cert_pem: String,
    key_pem: String,
    key_der: Vec<u8>,
}

impl TestLeaf {
    /// The leaf certificate alone.
    pub fn der(&self) -> CertificateDer<'static> {
        self.chain[0].clone()
    }

    /// Leaf first, then any intermediates up to (excluding) the root.
    pub fn chain(&self) -> Vec<CertificateDer<'static>> {
        self.chain.clone()
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }

    /// The leaf as a servable identity (full chain, ring signing key).
    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        load_certified_key_der(
            self.chain(),
            self.private_key(),
            &rustls::crypto::ring::default_provider(),
        )
        .expect("issued leaf must load")
    }
}
