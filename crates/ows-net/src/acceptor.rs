//! Wraps `axum-server`'s rustls acceptor to pull the verified client
//! certificate out of the completed TLS handshake and attach it to every
//! request on that connection, so handlers can recover the peer's
//! identity without re-touching the TLS layer.

use std::future::Future;
use std::pin::Pin;

use axum::Extension;
use axum_server::accept::Accept;
use axum_server::tls_rustls::RustlsAcceptor;
use rustls_pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::server::TlsStream;
use tower::Layer;

/// The raw DER bytes of the peer's client certificate for this
/// connection, if the handshake presented one. Every request handled
/// over a mutual-TLS connection carries this as a request extension.
#[derive(Debug, Clone)]
pub struct PeerCertificate(pub Option<CertificateDer<'static>>);

/// An [`Accept`] implementation that delegates the handshake to an inner
/// [`RustlsAcceptor`] and then inserts the peer's certificate as a
/// request extension on the resulting service.
#[derive(Clone)]
pub struct PeerCertAcceptor {
    inner: RustlsAcceptor,
}

impl PeerCertAcceptor {
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: RustlsAcceptor) -> Self {
        Self { inner }
    }
}

impl<I, S> Accept<I, S> for PeerCertAcceptor
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Send + 'static,
{
    type Stream = TlsStream<I>;
    type Service = <Extension<PeerCertificate> as Layer<S>>::Service;
    type Future =
        Pin<Box<dyn Future<Output = std::io::Result<(Self::Stream, Self::Service)>> + Send>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let acceptor = self.inner.clone();
        Box::pin(async move {
            let (stream, service) = acceptor.accept(stream, service).await?;
            let (_, connection) = stream.get_ref();
            let cert = connection
                .peer_certificates()
                .and_then(<[CertificateDer<'static>]>::first)
                .cloned();
            let service = Extension(PeerCertificate(cert)).layer(service);
            Ok((stream, service))
        })
    }
}
