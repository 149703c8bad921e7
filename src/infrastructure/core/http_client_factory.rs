use crate::domain::config::TlsFiles;
use reqwest::tls::{Certificate, Identity, Version};
use reqwest::{Client, ClientBuilder};
use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use std::error::Error as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Minimum negotiated TLS version; no downgrade below it.
pub const MIN_TLS_VERSION: Version = Version::TLS_1_2;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("CA certificate file {path:?}: {source}")]
    ReadRootCa {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("loading client key {key:?}, certificate {cert:?}: {reason}")]
    ClientIdentity {
        cert: PathBuf,
        key: PathBuf,
        reason: String,
    },

    #[error("building HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates an HTTP client whose TLS setup follows `tls`.
    ///
    /// - A root CA file replaces the built-in trust anchors. If it holds no
    ///   parseable certificate the client is still built, with an empty
    ///   trust pool, and a warning is logged.
    /// - A client certificate and key must be given together, and must
    ///   belong to each other.
    pub fn create_client(tls: &TlsFiles) -> Result<Client, TransportError> {
        let mut builder = Client::builder().min_tls_version(MIN_TLS_VERSION);

        if let Some(path) = &tls.root_ca {
            builder = Self::with_root_ca(builder, path)?;
        }

        let mut identity_files = None;
        if tls.cert.is_some() || tls.key.is_some() {
            let cert = tls.cert.clone().unwrap_or_default();
            let key = tls.key.clone().unwrap_or_default();
            let identity = load_identity(&cert, &key)?;
            builder = builder.identity(identity);
            identity_files = Some((cert, key));
        }

        // Root certificates are validated up front, so with an identity
        // configured a build failure means the key does not fit the
        // certificate.
        builder.build().map_err(|e| match identity_files {
            Some((cert, key)) => TransportError::ClientIdentity {
                cert,
                key,
                reason: error_chain(&e),
            },
            None => TransportError::Build(e),
        })
    }

    fn with_root_ca(builder: ClientBuilder, path: &Path) -> Result<ClientBuilder, TransportError> {
        let content = std::fs::read(path).map_err(|source| TransportError::ReadRootCa {
            path: path.to_path_buf(),
            source,
        })?;

        let certificates = parse_pem_certificates(&content);
        if certificates.is_empty() {
            warn!(
                "Failed to parse CA certificates read from {:?}; server verification will fail",
                path
            );
        } else {
            debug!(
                "Loaded {} CA certificate(s) from {:?}",
                certificates.len(),
                path
            );
        }

        Ok(certificates
            .into_iter()
            .fold(builder.tls_built_in_root_certs(false), |b, cert| {
                b.add_root_certificate(cert)
            }))
    }
}

/// Parses every PEM certificate section in `content`, skipping sections
/// that fail to decode or do not hold a usable X.509 trust anchor.
pub fn parse_pem_certificates(content: &[u8]) -> Vec<Certificate> {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";

    let text = String::from_utf8_lossy(content);
    let mut certificates = Vec::new();
    let mut rest: &str = &text;

    while let Some(start) = rest.find(BEGIN) {
        let Some(len) = rest[start..].find(END) else {
            debug!("Unterminated PEM certificate section");
            break;
        };
        let end = start + len + END.len();
        let section = &rest[start..end];

        match parse_trust_anchor(section.as_bytes()) {
            Ok(certificate) => certificates.push(certificate),
            Err(reason) => debug!("Skipping PEM certificate section: {}", reason),
        }
        rest = &rest[end..];
    }

    certificates
}

/// Applies the same check the TLS backend runs on every root, so a bad
/// section is dropped here instead of failing the client build.
fn parse_trust_anchor(section: &[u8]) -> Result<Certificate, String> {
    let der = CertificateDer::from_pem_slice(section).map_err(|e| e.to_string())?;
    webpki::anchor_from_trusted_cert(&der).map_err(|e| format!("invalid certificate: {}", e))?;
    Certificate::from_der(der.as_ref()).map_err(|e| e.to_string())
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn load_identity(cert: &Path, key: &Path) -> Result<Identity, TransportError> {
    let failed = |reason: String| TransportError::ClientIdentity {
        cert: cert.to_path_buf(),
        key: key.to_path_buf(),
        reason,
    };

    if cert.as_os_str().is_empty() {
        return Err(failed("client certificate file is required with a key".to_string()));
    }
    if key.as_os_str().is_empty() {
        return Err(failed("client key file is required with a certificate".to_string()));
    }

    let mut pem = std::fs::read(cert).map_err(|e| failed(format!("reading {:?}: {}", cert, e)))?;
    let key_pem = std::fs::read(key).map_err(|e| failed(format!("reading {:?}: {}", key, e)))?;
    pem.push(b'\n');
    pem.extend_from_slice(&key_pem);

    Identity::from_pem(&pem).map_err(|e| failed(e.to_string()))
}
