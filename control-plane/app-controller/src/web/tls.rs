use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::admission::webhook::WebhookError;

/// ALPN list for the TLS listeners. HTTP/2 is only offered when asked for.
pub fn alpn_protocols(enable_http2: bool) -> Vec<Vec<u8>> {
    if enable_http2 {
        vec![b"h2".to_vec(), b"http/1.1".to_vec()]
    } else {
        vec![b"http/1.1".to_vec()]
    }
}

/// Loads a PEM certificate chain and key into an axum-server TLS config.
pub fn load_rustls_config(
    cert: &Path,
    key: &Path,
    enable_http2: bool,
) -> Result<RustlsConfig, WebhookError> {
    let certs = CertificateDer::pem_file_iter(cert)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| {
            WebhookError::Tls(format!("{}: {e}", cert.display()))
        })?;
    let key = PrivateKeyDer::from_pem_file(key)
        .map_err(|e| WebhookError::Tls(format!("{}: {e}", key.display())))?;
    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| WebhookError::Tls(e.to_string()))?;
    config.alpn_protocols = alpn_protocols(enable_http2);
    Ok(RustlsConfig::from_config(Arc::new(config)))
}
