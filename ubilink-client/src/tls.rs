//! Client-side TLS for the encrypted broker port.
//!
//! The device verifies the broker against the bundled webpki roots unless a
//! CA file is configured. Skipping verification keeps the handshake
//! signatures checked and only accepts any certificate chain, which is what
//! test brokers with self-signed certificates need.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;

use crate::error::TransportError;
use crate::options::TlsOptions;

/// Build a connector for `host` together with the name its certificate must carry.
pub fn build_tls_connector(
    options: &TlsOptions,
    host: &str,
) -> Result<(TlsConnector, ServerName<'static>), TransportError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| TransportError::Tls(format!("'{}' is not a valid server name", host)))?;

    let builder = ClientConfig::builder();
    let config = if options.danger_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AnyServerCert::new()))
            .with_no_client_auth()
    } else {
        builder
            .with_root_certificates(trust_anchors(options.ca_path.as_deref())?)
            .with_no_client_auth()
    };

    Ok((TlsConnector::from(Arc::new(config)), server_name))
}

fn trust_anchors(ca_path: Option<&Path>) -> Result<RootCertStore, TransportError> {
    let Some(path) = ca_path else {
        return Ok(RootCertStore::from_iter(
            webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
        ));
    };

    let mut store = RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(read_ca_file(path)?);

    if added == 0 {
        return Err(TransportError::Tls(format!(
            "no usable CA certificate in '{}' ({} rejected)",
            path.display(),
            ignored
        )));
    }

    Ok(store)
}

fn read_ca_file(path: &Path) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let file = File::open(path)
        .map_err(|e| TransportError::Tls(format!("cannot open '{}': {}", path.display(), e)))?;

    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::Tls(format!("cannot parse '{}': {}", path.display(), e)))
}

/// Accepts any certificate chain but still checks handshake signatures.
#[derive(Debug)]
struct AnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AnyServerCert {
    fn new() -> Self {
        Self {
            algorithms: rustls::crypto::aws_lc_rs::default_provider()
                .signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
