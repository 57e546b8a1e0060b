//! Live mTLS configuration for control-plane components.
//!
//! Produces per-handshake TLS configurations that follow certificate and CA
//! rotation and cluster-wide TLS policy without restarts:
//!
//! - Policy resolution and cipher/version translation
//! - Identity, trust and cluster-configuration sources
//! - Peer verification by subject name for certificates without DNS names
//! - Role-specific configuration factory (metrics, generic, peer server,
//!   peer client)

pub mod cipher;
pub mod context;
pub mod error;
pub mod identity;
pub mod policy;
pub mod tls;
pub mod trust;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use context::{TlsContext, TlsSettings};
pub use error::{Result, TlsError};
pub use identity::{IdentitySource, MemoryIdentity};
pub use policy::{ClusterConfig, ClusterConfigSource, MemoryClusterConfig, SecurityPolicy};
pub use tls::config::{ClientTlsConfig, ServerTlsConfig, TlsConfigFactory};
pub use tls::handshake::{ClientAuth, ClientHandshake, HandshakeParameters, ServerHandshake};
pub use trust::{MemoryTrust, TrustPool, TrustSource};
