//! Cluster-wide TLS policy resolution.
//!
//! The [`ClusterConfigSource`] trait abstracts where the cluster
//! configuration resource comes from. [`MemoryClusterConfig`] provides a
//! swappable in-memory implementation suitable for tests and for processes
//! that receive configuration updates through a watch.
//!
//! [`resolve_policy`] never fails: a missing resource or a resource without a
//! TLS section resolves to [`SecurityPolicy::default`].

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::version::VERSION_TLS12;

/// The subset of the cluster configuration resource this crate reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_configuration: Option<TlsConfiguration>,
}

impl ClusterConfig {
    /// Parse the JSON form of the resource's configuration section.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Explicit TLS policy carried by the cluster configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfiguration {
    #[serde(rename = "minTLSVersion", default)]
    pub min_tls_version: String,
    #[serde(default)]
    pub ciphers: Vec<String>,
}

/// A fully populated policy. An empty cipher list means runtime defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub min_tls_version: String,
    pub ciphers: Vec<String>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            min_tls_version: VERSION_TLS12.to_string(),
            ciphers: Vec::new(),
        }
    }
}

impl From<&TlsConfiguration> for SecurityPolicy {
    fn from(tls: &TlsConfiguration) -> Self {
        Self {
            min_tls_version: tls.min_tls_version.clone(),
            ciphers: tls.ciphers.clone(),
        }
    }
}

/// Resolve the effective policy from an optional configuration snapshot.
pub fn resolve_policy(config: Option<&ClusterConfig>) -> SecurityPolicy {
    config
        .and_then(|c| c.tls_configuration.as_ref())
        .map(SecurityPolicy::from)
        .unwrap_or_default()
}

/// Read-only access to the current cluster configuration.
///
/// Implementations must be cheap and non-blocking: `current()` is called on
/// every handshake.
pub trait ClusterConfigSource: Send + Sync {
    /// The current configuration, or `None` when no resource exists.
    fn current(&self) -> Option<Arc<ClusterConfig>>;

    /// Resolve the policy from the current snapshot.
    fn policy(&self) -> SecurityPolicy {
        resolve_policy(self.current().as_deref())
    }
}

/// In-memory configuration source backed by `RwLock<Option<Arc<_>>>`.
#[derive(Debug, Default)]
pub struct MemoryClusterConfig {
    current: RwLock<Option<Arc<ClusterConfig>>>,
}

impl MemoryClusterConfig {
    /// Create a source with no configuration resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source holding `config`.
    pub fn with_config(config: ClusterConfig) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(config))),
        }
    }

    /// Replace the current configuration.
    pub fn set(&self, config: ClusterConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(config));
    }

    /// Remove the configuration resource.
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl ClusterConfigSource for MemoryClusterConfig {
    fn current(&self) -> Option<Arc<ClusterConfig>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
