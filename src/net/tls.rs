//! TLS for the secure listener.

use std::path::Path;

use axum_server::accept::{Accept, DefaultAcceptor};
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use tokio::net::TcpStream;

use crate::config::TlsConfig;

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, std::io::Error> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Performs the server side of the TLS handshake on accepted sockets.
#[derive(Clone)]
pub struct TlsAcceptor {
    inner: RustlsAcceptor<DefaultAcceptor>,
}

impl TlsAcceptor {
    pub fn new(config: RustlsConfig) -> Self {
        Self {
            inner: RustlsAcceptor::new(config),
        }
    }

    pub async fn accept(
        &self,
        stream: TcpStream,
    ) -> std::io::Result<<RustlsAcceptor<DefaultAcceptor> as Accept<TcpStream, ()>>::Stream> {
        let (stream, ()) = self.inner.accept(stream, ()).await?;
        Ok(stream)
    }
}
