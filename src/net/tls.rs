//! TLS configuration and certificate loading.
//!
//! Certificate and key are read once at startup. Any problem here is fatal to
//! startup; the edge never falls back to plaintext.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

/// Error type for TLS material loading.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Certificate file not found: {0:?}")]
    CertNotFound(PathBuf),

    #[error("Private key file not found: {0:?}")]
    KeyNotFound(PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No certificates found in {0:?}")]
    NoCertificates(PathBuf),

    #[error("No private key found in {0:?}")]
    NoPrivateKey(PathBuf),

    #[error("Invalid TLS material: {0}")]
    Invalid(#[source] std::io::Error),
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    if !cert_path.exists() {
        return Err(TlsError::CertNotFound(cert_path.to_path_buf()));
    }
    if !key_path.exists() {
        return Err(TlsError::KeyNotFound(key_path.to_path_buf()));
    }

    let certs = read_certs(cert_path)?;
    let key = read_private_key(key_path)?;

    let config = RustlsConfig::from_der(certs, key)
        .await
        .map_err(TlsError::Invalid)?;

    tracing::info!(cert = ?cert_path, key = ?key_path, "TLS material loaded");
    Ok(config)
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn read_certs(path: &Path) -> Result<Vec<Vec<u8>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .map(|cert| cert.map(|der| der.as_ref().to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<Vec<u8>, TlsError> {
    let mut reader = open(path)?;
    let key = rustls_pemfile::private_key(&mut reader).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match key {
        Some(key) => Ok(key.secret_der().to_vec()),
        None => Err(TlsError::NoPrivateKey(path.to_path_buf())),
    }
}
