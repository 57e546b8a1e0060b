//! TLS configuration factory.
//!
//! Composes the policy resolver, cipher table, version mapper, identity and
//! trust sources and the peer verifier into four role-specific live
//! configurations:
//!
//! - metrics server: current leaf, client certificates checked against the
//!   public web roots when offered
//! - generic server: current leaf, client certificates checked against the
//!   current trust pool according to [`ClientAuth`]
//! - peer server: leaf pinned per handshake, client certificate required and
//!   checked by [`PeerVerifier`](super::verifier::PeerVerifier)
//! - peer client: current leaf presented on request, server certificate
//!   checked by the peer verifier instead of by hostname
//!
//! Server roles resolve the cluster policy on every
//! [`build_config_for_client`](ServerHandshake::build_config_for_client)
//! call. Nothing is cached between handshakes.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, ProtocolVersion, RootCertStore, ServerConfig};
use rustls_pki_types::{CertificateDer, UnixTime};
use tracing::{debug, error};

use crate::context::TlsContext;
use crate::error::{Result, TlsError};
use crate::identity::{IdentitySource, PeerRole};
use crate::policy::ClusterConfigSource;
use crate::tls::handshake::{
    client_certificate, server_certificate, ClientAuth, ClientHandshake, HandshakeParameters,
    IdentityCertResolver, PinnedCertResolver, ServerHandshake,
};
use crate::tls::verifier::{current_pool, PeerClientCertVerifier, PeerServerCertVerifier};
use crate::trust::TrustSource;
use crate::version::{supported_versions, tls_version};

/// Builds live TLS configurations for every role of the process.
#[derive(Clone)]
pub struct TlsConfigFactory {
    context: Arc<TlsContext>,
    cluster: Arc<dyn ClusterConfigSource>,
}

impl TlsConfigFactory {
    pub fn new(context: Arc<TlsContext>, cluster: Arc<dyn ClusterConfigSource>) -> Self {
        Self { context, cluster }
    }

    pub fn context(&self) -> &Arc<TlsContext> {
        &self.context
    }

    /// Externally reachable endpoint (metrics). Client certificates are
    /// optional and checked against the public web roots.
    pub fn metrics_server(&self, identity: Arc<dyn IdentitySource>) -> ServerTlsConfig {
        self.server(identity, ServerRole::Metrics)
    }

    /// Server whose client certificates are checked against `trust`.
    pub fn server_with_trust(
        &self,
        trust: Arc<dyn TrustSource>,
        identity: Arc<dyn IdentitySource>,
        client_auth: ClientAuth,
    ) -> ServerTlsConfig {
        self.server(identity, ServerRole::Generic { trust, client_auth })
    }

    /// Server side of node-to-node mTLS.
    pub fn peer_server(
        &self,
        trust: Arc<dyn TrustSource>,
        identity: Arc<dyn IdentitySource>,
    ) -> ServerTlsConfig {
        self.server(identity, ServerRole::Peer { trust })
    }

    /// Client side of node-to-node mTLS.
    ///
    /// The returned configuration is static; identity and trust are looked up
    /// inside its callbacks on every handshake. Cluster policy is not applied.
    pub fn peer_client(
        &self,
        trust: Arc<dyn TrustSource>,
        identity: Arc<dyn IdentitySource>,
    ) -> Result<ClientTlsConfig> {
        let verifier = Arc::new(
            PeerServerCertVerifier::new(
                Arc::clone(self.context.peer_verifier()),
                trust,
                PeerRole::Node,
            )
            .with_identity(Arc::clone(&identity)),
        );
        let resolver = Arc::new(IdentityCertResolver::new(Arc::clone(&identity)));

        let config = ClientConfig::builder_with_provider(Arc::clone(self.context.provider()))
            .with_protocol_versions(rustls::DEFAULT_VERSIONS)
            .map_err(|e| TlsError::TlsConfiguration(format!("TLS version config: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::clone(&verifier) as Arc<dyn ServerCertVerifier>)
            .with_client_cert_resolver(resolver);

        Ok(ClientTlsConfig {
            identity,
            verifier,
            config: Arc::new(config),
        })
    }

    fn server(&self, identity: Arc<dyn IdentitySource>, role: ServerRole) -> ServerTlsConfig {
        ServerTlsConfig {
            context: Arc::clone(&self.context),
            cluster: Arc::clone(&self.cluster),
            identity,
            role,
        }
    }
}

impl fmt::Debug for TlsConfigFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfigFactory")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

enum ServerRole {
    Metrics,
    Generic {
        trust: Arc<dyn TrustSource>,
        client_auth: ClientAuth,
    },
    Peer {
        trust: Arc<dyn TrustSource>,
    },
}

impl ServerRole {
    fn name(&self) -> &'static str {
        match self {
            ServerRole::Metrics => "metrics",
            ServerRole::Generic { .. } => "generic",
            ServerRole::Peer { .. } => "peer",
        }
    }

    fn client_auth(&self) -> ClientAuth {
        match self {
            ServerRole::Metrics => ClientAuth::VerifyIfGiven,
            ServerRole::Generic { client_auth, .. } => *client_auth,
            ServerRole::Peer { .. } => ClientAuth::RequireAndVerify,
        }
    }
}

// ---------------------------------------------------------------------------
// Server roles
// ---------------------------------------------------------------------------

/// A live server configuration for one role.
pub struct ServerTlsConfig {
    context: Arc<TlsContext>,
    cluster: Arc<dyn ClusterConfigSource>,
    identity: Arc<dyn IdentitySource>,
    role: ServerRole,
}

impl ServerTlsConfig {
    /// The client certificate verifier for the next handshake.
    fn client_verifier(
        &self,
        provider: &Arc<CryptoProvider>,
    ) -> Result<Arc<dyn ClientCertVerifier>> {
        match &self.role {
            ServerRole::Metrics => {
                WebPkiClientVerifier::builder_with_provider(
                    Arc::clone(self.context.system_roots()),
                    Arc::clone(provider),
                )
                .clear_root_hint_subjects()
                .allow_unauthenticated()
                .build()
                .map_err(|e| TlsError::TlsConfiguration(format!("client verifier: {e}")))
            }
            ServerRole::Generic { trust, client_auth } => {
                if !client_auth.verifies() {
                    // The CA manager is still consulted so its failures surface.
                    trust_or_error(&**trust)?;
                    return Ok(WebPkiClientVerifier::no_client_auth());
                }
                let pool = current_pool(&**trust)?;
                standard_client_verifier(pool.root_store(), provider, *client_auth)
            }
            ServerRole::Peer { trust } => {
                let pool = current_pool(&**trust)?;
                Ok(Arc::new(PeerClientCertVerifier::new(
                    Arc::clone(self.context.peer_verifier()),
                    pool,
                    PeerRole::Client,
                )))
            }
        }
    }

    fn verify_standard(
        &self,
        roots: Arc<RootCertStore>,
        client_auth: ClientAuth,
        chain: &[CertificateDer<'_>],
    ) -> Result<()> {
        let Some((leaf, intermediates)) = chain.split_first() else {
            return match client_auth {
                ClientAuth::RequireAndVerify => Err(TlsError::NoPeerCertificate),
                _ => Ok(()),
            };
        };
        let verifier = standard_client_verifier(roots, self.context.provider(), client_auth)?;
        verifier
            .verify_client_cert(leaf, intermediates, UnixTime::now())
            .map_err(|e| TlsError::ChainVerification(e.to_string()))?;
        Ok(())
    }
}

impl ServerHandshake for ServerTlsConfig {
    fn select_server_certificate(&self) -> Result<Arc<CertifiedKey>> {
        server_certificate(&*self.identity)
    }

    fn build_config_for_client(&self) -> Result<Arc<ServerConfig>> {
        let params = self.parameters();
        let provider = Arc::new(
            self.context
                .cipher_table()
                .select(self.context.provider(), &params.cipher_suites),
        );

        // Peer servers check trust before identity; the others the reverse.
        let (key, client_verifier) = if let ServerRole::Peer { .. } = self.role {
            let client_verifier = self.client_verifier(&provider)?;
            (self.select_server_certificate()?, client_verifier)
        } else {
            let key = self.select_server_certificate()?;
            (key, self.client_verifier(&provider)?)
        };

        debug!(
            role = self.role.name(),
            min_version = ?params.min_version,
            cipher_suites = ?params.cipher_suites,
            client_auth = ?params.client_auth,
            "building TLS config for client"
        );

        let versions = supported_versions(params.min_version);
        let config = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(&versions)
            .map_err(|e| TlsError::TlsConfiguration(format!("TLS version config: {e}")))?
            .with_client_cert_verifier(client_verifier)
            .with_cert_resolver(Arc::new(PinnedCertResolver::new(key)));

        Ok(Arc::new(config))
    }

    fn verify_peer(&self, chain: &[CertificateDer<'_>]) -> Result<()> {
        match &self.role {
            ServerRole::Metrics => self.verify_standard(
                Arc::clone(self.context.system_roots()),
                ClientAuth::VerifyIfGiven,
                chain,
            ),
            ServerRole::Generic { trust, client_auth } => {
                if !client_auth.verifies() {
                    return Ok(());
                }
                let pool = current_pool(&**trust)?;
                self.verify_standard(pool.root_store(), *client_auth, chain)
            }
            ServerRole::Peer { trust } => {
                let pool = current_pool(&**trust)?;
                self.context.peer_verifier().verify(
                    chain,
                    &pool,
                    PeerRole::Client.required_usage(),
                    PeerRole::Client,
                    UnixTime::now(),
                )
            }
        }
    }

    fn parameters(&self) -> HandshakeParameters {
        let policy = self.cluster.policy();
        HandshakeParameters {
            min_version: tls_version(&policy.min_tls_version),
            cipher_suites: self.context.cipher_table().translate(&policy.ciphers),
            client_auth: self.role.client_auth(),
            verify_hostname: !matches!(self.role, ServerRole::Peer { .. }),
        }
    }
}

impl fmt::Debug for ServerTlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTlsConfig")
            .field("role", &self.role.name())
            .field("client_auth", &self.role.client_auth())
            .finish_non_exhaustive()
    }
}

fn standard_client_verifier(
    roots: Arc<RootCertStore>,
    provider: &Arc<CryptoProvider>,
    client_auth: ClientAuth,
) -> Result<Arc<dyn ClientCertVerifier>> {
    let builder = WebPkiClientVerifier::builder_with_provider(roots, Arc::clone(provider));
    let builder = match client_auth {
        ClientAuth::RequireAndVerify => builder,
        _ => builder.allow_unauthenticated(),
    };
    builder
        .build()
        .map_err(|e| TlsError::TlsConfiguration(format!("client verifier: {e}")))
}

fn trust_or_error(trust: &dyn TrustSource) -> Result<()> {
    trust.current().map(|_| ()).inspect_err(|e| {
        error!(error = %e, "failed to get current CA bundle");
    })
}

// ---------------------------------------------------------------------------
// Peer client
// ---------------------------------------------------------------------------

/// A live client configuration for node-to-node connections.
pub struct ClientTlsConfig {
    identity: Arc<dyn IdentitySource>,
    verifier: Arc<PeerServerCertVerifier>,
    config: Arc<ClientConfig>,
}

impl ClientHandshake for ClientTlsConfig {
    fn select_client_certificate(&self) -> Result<Arc<CertifiedKey>> {
        client_certificate(&*self.identity)
    }

    fn verify_peer(&self, chain: &[CertificateDer<'_>]) -> Result<()> {
        self.verifier.verify_chain(chain, UnixTime::now())
    }

    fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }

    fn parameters(&self) -> HandshakeParameters {
        HandshakeParameters {
            min_version: ProtocolVersion::TLSv1_2,
            cipher_suites: Vec::new(),
            // Peer connections are always mutual.
            client_auth: ClientAuth::RequireAndVerify,
            verify_hostname: false,
        }
    }
}

impl fmt::Debug for ClientTlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTlsConfig")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rustls::{CipherSuite, SupportedCipherSuite};

    use super::*;
    use crate::identity::{MemoryIdentity, SubjectNaming};
    use crate::policy::{ClusterConfig, MemoryClusterConfig, TlsConfiguration};
    use crate::testing::TestCa;
    use crate::trust::{MemoryTrust, TrustPool};

    struct FailingTrust;

    impl TrustSource for FailingTrust {
        fn current(&self) -> Result<Option<Arc<TrustPool>>> {
            Err(TlsError::TrustSource("CA secret unreadable".into()))
        }
    }

    struct Fixture {
        ca: TestCa,
        cluster: Arc<MemoryClusterConfig>,
        factory: TlsConfigFactory,
    }

    fn fixture() -> Fixture {
        let cluster = Arc::new(MemoryClusterConfig::new());
        let factory = TlsConfigFactory::new(Arc::new(TlsContext::default()), cluster.clone());
        Fixture {
            ca: TestCa::new("root"),
            cluster,
            factory,
        }
    }

    fn node_cn() -> String {
        SubjectNaming::default().expected_common_name(PeerRole::Node)
    }

    fn client_cn() -> String {
        SubjectNaming::default().expected_common_name(PeerRole::Client)
    }

    fn tls12_suites(config: &ServerConfig) -> Vec<CipherSuite> {
        config
            .crypto_provider()
            .cipher_suites
            .iter()
            .filter(|s| matches!(s, SupportedCipherSuite::Tls12(_)))
            .map(|s| s.suite())
            .collect()
    }

    #[test]
    fn metrics_server_not_ready_without_identity() {
        let fx = fixture();
        let server = fx.factory.metrics_server(Arc::new(MemoryIdentity::new()));

        let err = server.select_server_certificate().unwrap_err();
        assert!(matches!(err, TlsError::ServerNotReady));
        assert_eq!(
            err.to_string(),
            "No server certificate, server is not yet ready to receive traffic"
        );
        assert!(matches!(
            server.build_config_for_client(),
            Err(TlsError::ServerNotReady)
        ));
    }

    #[test]
    fn metrics_server_accepts_missing_client_cert() {
        let fx = fixture();
        let leaf = fx.ca.issue_server("metrics", &["localhost"]);
        let identity = MemoryIdentity::with_key(leaf.certified_key());
        let server = fx.factory.metrics_server(Arc::new(identity));

        assert!(server.build_config_for_client().is_ok());
        assert!(server.verify_peer(&[]).is_ok());
        // A cluster-internal CA is not a public root.
        let leaf = fx.ca.issue_client("someone");
        assert!(matches!(
            server.verify_peer(&leaf.chain()),
            Err(TlsError::ChainVerification(_))
        ));

        let params = server.parameters();
        assert_eq!(params.client_auth, ClientAuth::VerifyIfGiven);
        assert!(params.verify_hostname);
    }

    #[test]
    fn server_parameters_follow_cluster_policy() {
        let fx = fixture();
        let identity = MemoryIdentity::with_key(fx.ca.issue_peer(&node_cn()).certified_key());
        let server = fx.factory.metrics_server(Arc::new(identity));

        let before = server.parameters();
        assert_eq!(before.min_version, ProtocolVersion::TLSv1_2);
        assert!(before.cipher_suites.is_empty());

        fx.cluster.set(ClusterConfig {
            tls_configuration: Some(TlsConfiguration {
                min_tls_version: "VersionTLS13".into(),
                ciphers: vec![
                    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256".into(),
                    "not-a-cipher".into(),
                ],
            }),
        });

        let after = server.parameters();
        assert_eq!(after.min_version, ProtocolVersion::TLSv1_3);
        assert_eq!(
            after.cipher_suites,
            vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256]
        );
    }

    #[test]
    fn built_config_restricts_tls12_suites_per_policy() {
        let fx = fixture();
        let identity = MemoryIdentity::with_key(fx.ca.issue_peer(&node_cn()).certified_key());
        let server = fx.factory.metrics_server(Arc::new(identity));

        let default_config = server.build_config_for_client().unwrap();
        assert!(tls12_suites(&default_config).len() > 1);

        fx.cluster.set(ClusterConfig {
            tls_configuration: Some(TlsConfiguration {
                min_tls_version: "VersionTLS12".into(),
                ciphers: vec!["TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384".into()],
            }),
        });
        let restricted = server.build_config_for_client().unwrap();
        assert_eq!(
            tls12_suites(&restricted),
            vec![CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384]
        );
    }

    #[test]
    fn built_config_serves_identity_snapshot() {
        let fx = fixture();
        let first = fx.ca.issue_peer(&node_cn()).certified_key();
        let identity = Arc::new(MemoryIdentity::with_key(Arc::clone(&first)));
        let server = fx.factory.metrics_server(identity.clone());

        let selected = server.select_server_certificate().unwrap();
        assert!(Arc::ptr_eq(&selected, &first));

        let second = fx.ca.issue_peer(&node_cn()).certified_key();
        identity.set(Arc::clone(&second));
        assert!(Arc::ptr_eq(&server.select_server_certificate().unwrap(), &second));
    }

    #[test]
    fn generic_server_without_client_auth_ignores_missing_pool() {
        let fx = fixture();
        let leaf = fx.ca.issue_server("api", &["localhost"]);
        let identity = MemoryIdentity::with_key(leaf.certified_key());
        let server = fx.factory.server_with_trust(
            Arc::new(MemoryTrust::new()),
            Arc::new(identity),
            ClientAuth::None,
        );
        assert!(server.build_config_for_client().is_ok());
        assert!(server.verify_peer(&[]).is_ok());
        assert_eq!(server.parameters().client_auth, ClientAuth::None);
    }

    #[test]
    fn generic_server_propagates_trust_errors() {
        let fx = fixture();
        let leaf = fx.ca.issue_server("api", &["localhost"]);
        let identity = MemoryIdentity::with_key(leaf.certified_key());
        let server = fx.factory.server_with_trust(
            Arc::new(FailingTrust),
            Arc::new(identity),
            ClientAuth::None,
        );
        assert!(matches!(
            server.build_config_for_client(),
            Err(TlsError::TrustSource(_))
        ));
    }

    #[test]
    fn generic_server_needs_pool_to_verify() {
        let fx = fixture();
        let leaf = fx.ca.issue_server("api", &["localhost"]);
        let identity = MemoryIdentity::with_key(leaf.certified_key());
        let server = fx.factory.server_with_trust(
            Arc::new(MemoryTrust::new()),
            Arc::new(identity),
            ClientAuth::VerifyIfGiven,
        );
        assert!(matches!(
            server.build_config_for_client(),
            Err(TlsError::TrustNotReady)
        ));
    }

    #[test]
    fn generic_server_verifies_against_trust_pool() {
        let fx = fixture();
        let other = TestCa::new("other");
        let leaf = fx.ca.issue_server("api", &["localhost"]);
        let identity = MemoryIdentity::with_key(leaf.certified_key());
        let server = fx.factory.server_with_trust(
            Arc::new(MemoryTrust::with_pool(fx.ca.trust_pool())),
            Arc::new(identity),
            ClientAuth::RequireAndVerify,
        );

        assert!(server.build_config_for_client().is_ok());
        // Any subject is fine here; only the chain matters.
        assert!(server.verify_peer(&fx.ca.issue_client("anyone").chain()).is_ok());
        assert!(matches!(
            server.verify_peer(&other.issue_client("anyone").chain()),
            Err(TlsError::ChainVerification(_))
        ));
        assert!(matches!(
            server.verify_peer(&[]),
            Err(TlsError::NoPeerCertificate)
        ));
    }

    #[test]
    fn peer_server_propagates_trust_errors() {
        let fx = fixture();
        let identity = MemoryIdentity::with_key(fx.ca.issue_peer(&node_cn()).certified_key());
        let server = fx.factory.peer_server(Arc::new(FailingTrust), Arc::new(identity));

        let err = server.build_config_for_client().unwrap_err();
        assert!(matches!(err, TlsError::TrustSource(ref msg) if msg == "CA secret unreadable"));
    }

    #[test]
    fn peer_server_checks_trust_before_identity() {
        let fx = fixture();
        let server = fx
            .factory
            .peer_server(Arc::new(MemoryTrust::new()), Arc::new(MemoryIdentity::new()));
        let err = server.build_config_for_client().unwrap_err();
        assert!(matches!(err, TlsError::TrustNotReady));
        assert!(err.is_not_ready());

        let server = fx.factory.peer_server(
            Arc::new(MemoryTrust::with_pool(fx.ca.trust_pool())),
            Arc::new(MemoryIdentity::new()),
        );
        assert!(matches!(
            server.build_config_for_client(),
            Err(TlsError::ServerNotReady)
        ));
    }

    #[test]
    fn peer_server_verifies_client_subject() {
        let fx = fixture();
        let identity = MemoryIdentity::with_key(fx.ca.issue_peer(&node_cn()).certified_key());
        let server = fx.factory.peer_server(
            Arc::new(MemoryTrust::with_pool(fx.ca.trust_pool())),
            Arc::new(identity),
        );

        let params = server.parameters();
        assert_eq!(params.client_auth, ClientAuth::RequireAndVerify);
        assert!(!params.verify_hostname);

        assert!(server.build_config_for_client().is_ok());
        assert!(server.verify_peer(&fx.ca.issue_client(&client_cn()).chain()).is_ok());
        assert!(matches!(
            server.verify_peer(&fx.ca.issue_client("intruder").chain()),
            Err(TlsError::CommonNameMismatch { .. })
        ));
    }

    #[test]
    fn peer_client_selects_and_verifies() {
        let fx = fixture();
        let identity = Arc::new(MemoryIdentity::new());
        let client = fx
            .factory
            .peer_client(Arc::new(MemoryTrust::with_pool(fx.ca.trust_pool())), identity.clone())
            .unwrap();

        assert!(matches!(
            client.select_client_certificate(),
            Err(TlsError::ClientNotReady)
        ));
        identity.set(fx.ca.issue_peer(&client_cn()).certified_key());
        assert!(client.select_client_certificate().is_ok());

        assert!(client.verify_peer(&fx.ca.issue_peer(&node_cn()).chain()).is_ok());
        assert!(matches!(
            client.verify_peer(&fx.ca.issue_peer(&client_cn()).chain()),
            Err(TlsError::CommonNameMismatch { .. })
        ));

        let params = client.parameters();
        assert!(!params.verify_hostname);
        assert_eq!(params.min_version, ProtocolVersion::TLSv1_2);
    }

    #[test]
    fn peer_client_refuses_without_pool() {
        let fx = fixture();
        let client = fx
            .factory
            .peer_client(Arc::new(MemoryTrust::new()), Arc::new(MemoryIdentity::new()))
            .unwrap();
        assert!(matches!(
            client.verify_peer(&fx.ca.issue_peer(&node_cn()).chain()),
            Err(TlsError::TrustNotReady)
        ));
    }
}
