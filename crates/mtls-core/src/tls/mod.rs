//! TLS configuration for control-plane mTLS connections.
//!
//! - Certificate field extraction (subject common name from X.509 DER)
//! - Peer verifiers replacing hostname checks for internal peers
//! - Handshake traits and `rustls` resolver adapters
//! - The role-specific configuration factory

pub mod cert_extract;
pub mod config;
pub mod handshake;
pub mod verifier;
