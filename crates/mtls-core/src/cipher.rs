//! Cipher suite name translation.
//!
//! Cluster policy lists cipher suites by their IANA names. [`CipherTable`]
//! maps those names to wire identifiers. It is built once from the full
//! catalog, secure and legacy suites alike, since administrators may ask for
//! legacy suites to interoperate with old clients. Unknown names are dropped.
//!
//! [`CipherTable::select`] then narrows a crypto provider to the requested
//! suites. Only TLS 1.0–1.2 suites are restricted; TLS 1.3 suites the
//! provider implements are always kept.

use std::collections::HashMap;

use rustls::crypto::CryptoProvider;
use rustls::{CipherSuite, SupportedCipherSuite};
use tracing::debug;

/// A named cipher suite in the static catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteInfo {
    pub name: &'static str,
    pub id: u16,
    /// False for suites kept only for interoperability.
    pub secure: bool,
}

const fn suite(name: &'static str, id: u16, secure: bool) -> CipherSuiteInfo {
    CipherSuiteInfo { name, id, secure }
}

/// Suites without known weaknesses.
pub const SECURE_SUITES: &[CipherSuiteInfo] = &[
    suite("TLS_AES_128_GCM_SHA256", 0x1301, true),
    suite("TLS_AES_256_GCM_SHA384", 0x1302, true),
    suite("TLS_CHACHA20_POLY1305_SHA256", 0x1303, true),
    suite("TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", 0xc009, true),
    suite("TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", 0xc00a, true),
    suite("TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", 0xc013, true),
    suite("TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", 0xc014, true),
    suite("TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", 0xc02b, true),
    suite("TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", 0xc02c, true),
    suite("TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", 0xc02f, true),
    suite("TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", 0xc030, true),
    suite("TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", 0xcca8, true),
    suite("TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", 0xcca9, true),
];

/// Legacy suites with known weaknesses.
pub const LEGACY_SUITES: &[CipherSuiteInfo] = &[
    suite("TLS_RSA_WITH_RC4_128_SHA", 0x0005, false),
    suite("TLS_RSA_WITH_3DES_EDE_CBC_SHA", 0x000a, false),
    suite("TLS_RSA_WITH_AES_128_CBC_SHA", 0x002f, false),
    suite("TLS_RSA_WITH_AES_256_CBC_SHA", 0x0035, false),
    suite("TLS_RSA_WITH_AES_128_CBC_SHA256", 0x003c, false),
    suite("TLS_RSA_WITH_AES_128_GCM_SHA256", 0x009c, false),
    suite("TLS_RSA_WITH_AES_256_GCM_SHA384", 0x009d, false),
    suite("TLS_ECDHE_ECDSA_WITH_RC4_128_SHA", 0xc007, false),
    suite("TLS_ECDHE_RSA_WITH_RC4_128_SHA", 0xc011, false),
    suite("TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA", 0xc012, false),
    suite("TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256", 0xc023, false),
    suite("TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256", 0xc027, false),
];

/// Immutable name → identifier lookup table.
#[derive(Debug, Clone)]
pub struct CipherTable {
    by_name: HashMap<&'static str, CipherSuite>,
}

impl CipherTable {
    /// Build the table from the secure and legacy catalogs.
    pub fn new() -> Self {
        let by_name = SECURE_SUITES
            .iter()
            .chain(LEGACY_SUITES)
            .map(|info| (info.name, CipherSuite::from(info.id)))
            .collect();
        Self { by_name }
    }

    /// Look up a single suite by name.
    pub fn lookup(&self, name: &str) -> Option<CipherSuite> {
        self.by_name.get(name).copied()
    }

    /// Translate names to identifiers, preserving order and dropping misses.
    pub fn translate<S: AsRef<str>>(&self, names: &[S]) -> Vec<CipherSuite> {
        names
            .iter()
            .filter_map(|name| self.lookup(name.as_ref()))
            .collect()
    }

    /// Narrow `provider` to the requested suites.
    ///
    /// An empty request keeps the provider's default list.
    pub fn select(&self, provider: &CryptoProvider, ids: &[CipherSuite]) -> CryptoProvider {
        let mut selected = provider.clone();
        if ids.is_empty() {
            return selected;
        }

        let mut suites: Vec<SupportedCipherSuite> = Vec::with_capacity(ids.len());
        for id in ids {
            match provider.cipher_suites.iter().find(|s| s.suite() == *id) {
                Some(s) if !suites.iter().any(|have| have.suite() == *id) => suites.push(*s),
                Some(_) => {}
                None => debug!(suite = ?id, "requested cipher suite not implemented by provider"),
            }
        }

        for s in &provider.cipher_suites {
            let is_tls13 = matches!(s, SupportedCipherSuite::Tls13(_));
            if is_tls13 && !suites.iter().any(|have| have.suite() == s.suite()) {
                suites.push(*s);
            }
        }

        selected.cipher_suites = suites;
        selected
    }
}

impl Default for CipherTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> CryptoProvider {
        rustls::crypto::ring::default_provider()
    }

    #[test]
    fn every_catalog_name_translates_to_its_id() {
        let table = CipherTable::new();
        for info in SECURE_SUITES.iter().chain(LEGACY_SUITES) {
            let id = table.lookup(info.name).expect("catalog name must resolve");
            assert_eq!(u16::from(id), info.id, "{}", info.name);
        }
    }

    #[test]
    fn translation_preserves_input_order() {
        let table = CipherTable::new();
        let ids = table.translate(&[
            "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            "TLS_RSA_WITH_AES_128_CBC_SHA",
            "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        ]);
        let raw: Vec<u16> = ids.into_iter().map(u16::from).collect();
        assert_eq!(raw, vec![0xc030, 0x002f, 0xc02b]);
    }

    #[test]
    fn unknown_names_are_dropped_silently() {
        let table = CipherTable::new();
        let ids = table.translate(&[
            "TLS_NOT_A_SUITE",
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            "",
        ]);
        assert_eq!(ids, vec![CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256]);
    }

    #[test]
    fn legacy_suites_are_not_refused() {
        let table = CipherTable::new();
        let ids = table.translate(&["TLS_RSA_WITH_3DES_EDE_CBC_SHA"]);
        assert_eq!(ids.len(), 1);
        assert_eq!(u16::from(ids[0]), 0x000a);
    }

    #[test]
    fn translation_accepts_owned_strings() {
        let table = CipherTable::new();
        let names = vec!["TLS_AES_128_GCM_SHA256".to_string()];
        assert_eq!(table.translate(&names), vec![CipherSuite::TLS13_AES_128_GCM_SHA256]);
    }

    #[test]
    fn empty_request_keeps_provider_defaults() {
        let table = CipherTable::new();
        let provider = ring();
        let selected = table.select(&provider, &[]);
        assert_eq!(selected.cipher_suites.len(), provider.cipher_suites.len());
    }

    #[test]
    fn select_restricts_tls12_and_keeps_tls13() {
        let table = CipherTable::new();
        let ids = table.translate(&["TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384"]);
        let selected = table.select(&ring(), &ids);

        assert_eq!(
            selected.cipher_suites[0].suite(),
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
        );
        let tls12: Vec<_> = selected
            .cipher_suites
            .iter()
            .filter(|s| matches!(s, SupportedCipherSuite::Tls12(_)))
            .collect();
        assert_eq!(tls12.len(), 1);
        assert!(selected
            .cipher_suites
            .iter()
            .any(|s| s.suite() == CipherSuite::TLS13_AES_128_GCM_SHA256));
    }

    #[test]
    fn select_skips_suites_the_provider_lacks() {
        let table = CipherTable::new();
        let ids = table.translate(&["TLS_RSA_WITH_RC4_128_SHA"]);
        let selected = table.select(&ring(), &ids);
        assert!(selected
            .cipher_suites
            .iter()
            .all(|s| matches!(s, SupportedCipherSuite::Tls13(_))));
    }
}
