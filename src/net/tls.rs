//! TLS certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{kind} file not found: {path}")]
    Missing { kind: &'static str, path: String },
    #[error("failed to load certificate pair: {0}")]
    Load(#[from] std::io::Error),
}

/// Load the PEM certificate chain and private key named in the listener config.
pub async fn load_tls_config(tls: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    for (kind, path) in [("Certificate", &tls.cert_path), ("Private key", &tls.key_path)] {
        if !Path::new(path).exists() {
            return Err(TlsError::Missing {
                kind,
                path: path.clone(),
            });
        }
    }

    let config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
    tracing::info!(cert = %tls.cert_path, "TLS certificate loaded");
    Ok(config)
}
