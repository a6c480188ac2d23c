//! TLS configuration with operator-supplied CA roots.
//!
//! Engine backends are usually self-hosted behind a private CA. When
//! `MMCONSOLE_CA_CERT` points at a PEM bundle, [`load_ca_config`] builds a
//! [`rustls::ClientConfig`] trusting only those roots, shared by the REST
//! client and the push channel.

use std::path::Path;
use std::sync::Arc;

use rustls::ClientConfig;
use tracing::info;

use crate::Result;

/// Builds a [`ClientConfig`] whose root store contains the certificates in
/// the PEM file at `path`.
///
/// # Errors
///
/// Returns [`ConsoleError::Tls`](crate::ConsoleError::Tls) if the file cannot
/// be read, contains no parsable certificate, or the protocol versions
/// cannot be configured.
pub fn load_ca_config(path: &Path) -> Result<ClientConfig> {
    let pem = std::fs::read(path).map_err(|e| {
        crate::ConsoleError::Tls(format!("failed to read {}: {e}", path.display()))
    })?;
    build_tls_config(&pem)
}

/// Builds a [`ClientConfig`] trusting the certificates in `pem`.
///
/// # Errors
///
/// Returns [`ConsoleError::Tls`](crate::ConsoleError::Tls) if no certificate
/// in `pem` can be parsed.
pub fn build_tls_config(pem: &[u8]) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();

    let certs: Vec<_> = rustls_pemfile::certs(&mut &pem[..])
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| crate::ConsoleError::Tls(format!("failed to parse CA PEM: {e}")))?;

    let (added, ignored) = root_store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(crate::ConsoleError::Tls(
            "CA PEM contains no usable certificate".to_string(),
        ));
    }
    info!(added, ignored, "Loaded custom CA roots");

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| crate::ConsoleError::Tls(format!("unsupported protocol set: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(config)
}
