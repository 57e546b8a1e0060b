//! Extract identity fields from X.509 DER certificates.
//!
//! Internally issued peer identities carry their role in the subject common
//! name. After parsing, the verifier compares it to the expected
//! `<prefix>:system:<role>:<component>` string; transports use it to label
//! established connections.

use x509_parser::prelude::*;

use crate::error::{Result, TlsError};

/// Return the first subject common name of a DER-encoded certificate.
///
/// A certificate without a common name yields an empty string: the caller's
/// comparison then fails with a descriptive mismatch instead of a parse error.
pub fn common_name(cert_der: &[u8]) -> Result<String> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| TlsError::PeerCertificateParse(format!("X.509 parse error: {e}")))?;

    let cn = match cert.subject().iter_common_name().next() {
        Some(attr) => attr
            .as_str()
            .map_err(|e| TlsError::PeerCertificateParse(format!("common name: {e}")))?
            .to_string(),
        None => String::new(),
    };

    Ok(cn)
}

/// Returns true if `cert_der` parses as an X.509 certificate.
pub fn is_parsable(cert_der: &[u8]) -> bool {
    X509Certificate::from_der(cert_der).is_ok()
}
