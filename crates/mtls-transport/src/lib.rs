//! Async transport glue for `mtls-core` handshake configurations.
//!
//! Serves and dials TLS over any `tokio` byte stream:
//!
//! - Server acceptor that reads the ClientHello first, then asks the
//!   [`ServerHandshake`](mtls_core::ServerHandshake) for a fresh configuration
//! - Client connector driven by a [`ClientHandshake`](mtls_core::ClientHandshake)
//! - Established-connection wrapper exposing the peer's subject

pub mod client;
pub mod connection;
pub mod error;
pub mod server;

pub use client::PeerConnector;
pub use connection::PeerConnection;
pub use error::TransportError;
pub use server::PeerAcceptor;
