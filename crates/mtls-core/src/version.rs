//! Minimum TLS protocol version mapping.
//!
//! Cluster policy names versions with labels (`VersionTLS12`, ...). Unknown
//! labels, including the empty string, fall back to TLS 1.2 so a typo never
//! lowers or removes the version floor.

use rustls::{ProtocolVersion, SupportedProtocolVersion};

/// Policy label for TLS 1.0.
pub const VERSION_TLS10: &str = "VersionTLS10";

/// Policy label for TLS 1.1.
pub const VERSION_TLS11: &str = "VersionTLS11";

/// Policy label for TLS 1.2.
pub const VERSION_TLS12: &str = "VersionTLS12";

/// Policy label for TLS 1.3.
pub const VERSION_TLS13: &str = "VersionTLS13";

/// Convert a policy version label to the protocol identifier.
pub fn tls_version(label: &str) -> ProtocolVersion {
    match label {
        VERSION_TLS10 => ProtocolVersion::TLSv1_0,
        VERSION_TLS11 => ProtocolVersion::TLSv1_1,
        VERSION_TLS12 => ProtocolVersion::TLSv1_2,
        VERSION_TLS13 => ProtocolVersion::TLSv1_3,
        _ => ProtocolVersion::TLSv1_2,
    }
}

/// Protocol versions implemented by the runtime at or above `min`.
///
/// The runtime implements TLS 1.2 and 1.3 only, so floors of 1.0 and 1.1
/// enable both.
pub fn supported_versions(min: ProtocolVersion) -> Vec<&'static SupportedProtocolVersion> {
    let floor = u16::from(min);
    rustls::ALL_VERSIONS
        .iter()
        .copied()
        .filter(|v| u16::from(v.version) >= floor)
        .collect()
}
