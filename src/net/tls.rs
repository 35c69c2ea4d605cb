//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::crypto::aws_lc_rs;
use rustls::ServerConfig;
use thiserror::Error;

pub const CERT_FILE: &str = "cert.pem";
pub const KEY_FILE: &str = "key.pem";

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate file not found: {}", .0.display())]
    MissingCert(PathBuf),

    #[error("private key file not found: {}", .0.display())]
    MissingKey(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

/// Certificate and key paths inside a certificate directory.
pub fn locate(cert_dir: &Path) -> (PathBuf, PathBuf) {
    (cert_dir.join(CERT_FILE), cert_dir.join(KEY_FILE))
}

/// Build a server config accepting TLS 1.2 and TLS 1.3.
pub fn server_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, TlsError> {
    if !cert_path.exists() {
        return Err(TlsError::MissingCert(cert_path.to_path_buf()));
    }
    if !key_path.exists() {
        return Err(TlsError::MissingKey(key_path.to_path_buf()));
    }

    let read_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| TlsError::Read { path, source }
    };

    let mut cert_reader = BufReader::new(File::open(cert_path).map_err(read_err(cert_path))?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err(cert_path))?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }

    let mut key_reader = BufReader::new(File::open(key_path).map_err(read_err(key_path))?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(read_err(key_path))?
        .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_path_buf()))?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

/// TLS for the front door, if `cert_dir` holds usable material.
///
/// Anything missing or unreadable falls back to plaintext with a warning.
pub fn load(cert_dir: Option<&Path>) -> Option<RustlsConfig> {
    let Some(dir) = cert_dir else {
        tracing::warn!("No certificate path configured, serving plaintext HTTP");
        return None;
    };

    let (cert_path, key_path) = locate(dir);
    match server_config(&cert_path, &key_path) {
        Ok(config) => {
            tracing::info!(cert = %cert_path.display(), "TLS enabled");
            Some(RustlsConfig::from_config(Arc::new(config)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "TLS material unusable, serving plaintext HTTP");
            None
        }
    }
}
