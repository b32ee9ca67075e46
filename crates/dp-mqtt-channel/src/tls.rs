//! TLS configuration for broker connections.
//!
//! Loads a PEM bundle of trusted root certificates once at startup and
//! hands rumqttc a TLS transport that authenticates the broker against
//! it. Every certificate is parsed into a rustls root store up front, so
//! a corrupt bundle is rejected before any broker is dialed. Publishers
//! authenticate with username/password, so no client certificate is
//! configured.

use std::path::Path;
use std::sync::Arc;

use rumqttc::tokio_rustls::rustls::RootCertStore;
use rumqttc::{TlsConfiguration, Transport};

use crate::error::{MqttError, MqttResult};

/// Validated set of trusted root certificates, shared read-only by
/// every connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    ca: Arc<[u8]>,
    certificates: usize,
}

impl TransportConfig {
    /// Read and validate a PEM-encoded CA bundle from `path`.
    pub fn load(path: impl AsRef<Path>) -> MqttResult<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            MqttError::CertificateLoad(format!(
                "failed to read CA bundle '{}': {e}",
                path.display()
            ))
        })?;

        Self::from_pem(pem).map_err(|e| match e {
            MqttError::CertificateLoad(reason) => {
                MqttError::CertificateLoad(format!("CA bundle '{}': {reason}", path.display()))
            }
            other => other,
        })
    }

    /// Validate an in-memory PEM bundle.
    ///
    /// Fails if any PEM section is malformed, if any certificate cannot
    /// be parsed as a trust anchor, or if the bundle holds no
    /// certificate at all.
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> MqttResult<Self> {
        let pem = pem.into();
        let mut reader = pem.as_slice();
        let certificates = rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MqttError::CertificateLoad(format!("malformed PEM: {e}")))?;

        if certificates.is_empty() {
            return Err(MqttError::CertificateLoad(
                "no certificates found in bundle".into(),
            ));
        }

        let mut roots = RootCertStore::empty();
        for (index, cert) in certificates.iter().enumerate() {
            roots.add(cert.clone()).map_err(|e| {
                MqttError::CertificateLoad(format!("certificate #{} rejected: {e}", index + 1))
            })?;
        }

        Ok(Self {
            ca: Arc::from(pem),
            certificates: certificates.len(),
        })
    }

    /// Number of trusted root certificates in the bundle.
    pub fn certificate_count(&self) -> usize {
        self.certificates
    }

    /// Build the rumqttc TLS transport for one connection.
    pub fn to_transport(&self) -> Transport {
        Transport::tls_with_config(TlsConfiguration::Simple {
            ca: self.ca.to_vec(),
            alpn: None,
            client_auth: None,
        })
    }
}
