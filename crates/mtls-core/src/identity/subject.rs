//! Subject naming for internally issued peer certificates.
//!
//! Internally issued peer certificates carry no DNS names or IP addresses.
//! Their subject common name has the form
//! `<prefix>:system:<role>:<component>` and takes the place of hostname
//! verification. The format is shared with the issuing authority: both sides
//! must change together.

use std::fmt;

/// The role a peer certificate was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// A component connecting *to* a node (checked on the server side).
    Client,
    /// A node serving peer connections (checked on the client side).
    Node,
}

impl PeerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerRole::Client => "client",
            PeerRole::Node => "node",
        }
    }

    /// The extended key usage a certificate of this role must carry.
    pub fn required_usage(&self) -> KeyPurpose {
        match self {
            PeerRole::Client => KeyPurpose::ClientAuth,
            PeerRole::Node => KeyPurpose::ServerAuth,
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extended key usage required of a peer's leaf certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    ClientAuth,
    ServerAuth,
}

impl KeyPurpose {
    pub(crate) fn to_webpki(self) -> webpki::KeyUsage {
        match self {
            KeyPurpose::ClientAuth => webpki::KeyUsage::client_auth(),
            KeyPurpose::ServerAuth => webpki::KeyUsage::server_auth(),
        }
    }
}

/// Default namespace prefix of internally issued subject names.
pub const DEFAULT_SUBJECT_PREFIX: &str = "kubevirt.io";

/// Default component name of internally issued subject names.
pub const DEFAULT_COMPONENT: &str = "virt-handler";

/// Builds the exact common names expected of internally issued peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectNaming {
    prefix: String,
    component: String,
}

impl SubjectNaming {
    pub fn new(prefix: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            component: component.into(),
        }
    }

    /// `<prefix>:system:<role>:<component>`
    pub fn expected_common_name(&self, role: PeerRole) -> String {
        format!("{}:system:{}:{}", self.prefix, role, self.component)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn component(&self) -> &str {
        &self.component
    }
}

impl Default for SubjectNaming {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECT_PREFIX, DEFAULT_COMPONENT)
    }
}
