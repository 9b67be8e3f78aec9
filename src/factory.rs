//! Builds transports at connection setup time: client role, server role, and
//! connections a listener already accepted.
//!
//! TLS setup failures are fatal and propagate to the caller untouched; a
//! connection whose handshake failed is never retried here.

use crate::stream::{IntoTransport, Transport};
use std::io::{Read, Write};

#[cfg(feature = "tls")]
use crate::functional_traits::{DefaultThreadAdapter, ThreadAdapter};
#[cfg(feature = "tls")]
use crate::tls_stream::TlsTransport;
#[cfg(feature = "tls")]
use crate::trace_log;
#[cfg(feature = "tls")]
use crate::wsio_error::WsioResult;
#[cfg(feature = "tls")]
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
#[cfg(feature = "tls")]
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
#[cfg(feature = "tls")]
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, ServerConfig, ServerConnection};
#[cfg(feature = "tls")]
use std::net::TcpStream;
#[cfg(feature = "tls")]
use std::sync::Arc;

/// How a client side transport validates the certificate chain the server
/// presents.
///
/// There is deliberately no default: the original design this crate descends
/// from silently accepted every certificate when no validator was supplied.
/// Here the caller has to spell that choice out.
#[cfg(feature = "tls")]
pub enum CertValidation {
  /// Validate against the bundled webpki root store.
  WebPkiRoots,
  /// Caller supplied verifier.
  Custom(Arc<dyn ServerCertVerifier>),
  /// Accept any certificate without validation. This makes the connection
  /// vulnerable to active interception; certificate trust becomes entirely
  /// the caller's responsibility.
  DangerAcceptAny,
}

/// Wraps `stream` for the client role. `tls` of `None` wraps the socket
/// directly; otherwise a client side TLS handshake against `host` is set up
/// with the given validation policy.
///
/// The rustls configs built here use the process default crypto provider, so
/// one must be installed before any secure transport is created.
#[cfg(feature = "tls")]
pub fn client_transport(
  stream: TcpStream,
  host: &str,
  tls: Option<CertValidation>,
) -> WsioResult<Box<dyn Transport>> {
  client_transport_with_adapter(stream, host, tls, &DefaultThreadAdapter)
}

/// [`client_transport`] with the TLS pump threads routed through `spawner`.
#[cfg(feature = "tls")]
pub fn client_transport_with_adapter(
  stream: TcpStream,
  host: &str,
  tls: Option<CertValidation>,
  spawner: &dyn ThreadAdapter,
) -> WsioResult<Box<dyn Transport>> {
  let Some(validation) = tls else {
    return Ok(stream.into_transport());
  };

  trace_log!("factory: client tls setup for {}", host);
  let server_name = ServerName::try_from(host.to_string())?;
  let config = client_config(validation);
  let connection = ClientConnection::new(Arc::new(config), server_name)?;
  TlsTransport::create_client(stream, connection, spawner)
}

/// Wraps `stream` for the server role. `tls` of `None` wraps the socket
/// directly; otherwise a server side TLS handshake is set up with the given
/// config (which carries the server certificate and key).
#[cfg(feature = "tls")]
pub fn server_transport(
  stream: TcpStream,
  tls: Option<Arc<ServerConfig>>,
) -> WsioResult<Box<dyn Transport>> {
  server_transport_with_adapter(stream, tls, &DefaultThreadAdapter)
}

/// [`server_transport`] with the TLS pump threads routed through `spawner`.
#[cfg(feature = "tls")]
pub fn server_transport_with_adapter(
  stream: TcpStream,
  tls: Option<Arc<ServerConfig>>,
  spawner: &dyn ThreadAdapter,
) -> WsioResult<Box<dyn Transport>> {
  let Some(config) = tls else {
    return Ok(stream.into_transport());
  };

  trace_log!("factory: server tls setup");
  let connection = ServerConnection::new(config)?;
  TlsTransport::create_server(stream, connection, spawner)
}

#[cfg(feature = "tls")]
fn client_config(validation: CertValidation) -> ClientConfig {
  match validation {
    CertValidation::WebPkiRoots => {
      let mut roots = rustls::RootCertStore::empty();
      roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
      ClientConfig::builder().with_root_certificates(roots).with_no_client_auth()
    }
    CertValidation::Custom(verifier) => ClientConfig::builder()
      .dangerous()
      .with_custom_certificate_verifier(verifier)
      .with_no_client_auth(),
    CertValidation::DangerAcceptAny => ClientConfig::builder()
      .dangerous()
      .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
      .with_no_client_auth(),
  }
}

#[cfg(feature = "tls")]
#[derive(Debug)]
struct AcceptAnyCert;

#[cfg(feature = "tls")]
impl ServerCertVerifier for AcceptAnyCert {
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
    _message: &[u8],
    _cert: &CertificateDer<'_>,
    _dss: &DigitallySignedStruct,
  ) -> Result<HandshakeSignatureValid, rustls::Error> {
    Ok(HandshakeSignatureValid::assertion())
  }

  fn verify_tls13_signature(
    &self,
    _message: &[u8],
    _cert: &CertificateDer<'_>,
    _dss: &DigitallySignedStruct,
  ) -> Result<HandshakeSignatureValid, rustls::Error> {
    Ok(HandshakeSignatureValid::assertion())
  }

  fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
    vec![
      rustls::SignatureScheme::RSA_PKCS1_SHA256,
      rustls::SignatureScheme::RSA_PKCS1_SHA384,
      rustls::SignatureScheme::RSA_PKCS1_SHA512,
      rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
      rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
      rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
      rustls::SignatureScheme::RSA_PSS_SHA256,
      rustls::SignatureScheme::RSA_PSS_SHA384,
      rustls::SignatureScheme::RSA_PSS_SHA512,
      rustls::SignatureScheme::ED25519,
    ]
  }
}

/// A connection a listener already accepted, with security negotiation (if
/// any) long finished. Carries the raw stream halves and the security flag
/// that was determined at accept time.
pub struct ListenerContext {
  read: Box<dyn Read + Send>,
  write: Box<dyn Write + Send>,
  secure: bool,
}

impl ListenerContext {
  /// Bundles the halves of an accepted connection with its security flag.
  pub fn new(read: Box<dyn Read + Send>, write: Box<dyn Write + Send>, secure: bool) -> Self {
    Self { read, write, secure }
  }

  /// The security flag determined when the connection was accepted.
  pub fn is_secure(&self) -> bool {
    self.secure
  }
}

/// Reuses the stream of an already accepted inbound connection instead of
/// negotiating again. The produced transport reports the context's security
/// flag for its lifetime.
pub fn transport_from_context(context: ListenerContext) -> Box<dyn Transport> {
  (context.read, context.write, context.secure).into_transport()
}
