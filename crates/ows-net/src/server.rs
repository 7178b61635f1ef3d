//! Binds a node's API or gossip listener over mutual TLS, using the
//! node's own identity certificate and a predicate that accepts any peer
//! whose embedded Ed25519 key is currently known.
//!
//! Modeled on the teacher workspace's `echo-session-ws-gateway`, which
//! binds `axum-server` with a loaded `rustls::ServerConfig` and shuts
//! down gracefully on a [`axum_server::Handle`]; the one addition here is
//! requiring and extracting the client certificate, since that crate
//! never needed mutual TLS.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum_server::tls_rustls::RustlsAcceptor;
use axum_server::Handle;
use ows_identity::{IdentityCertificate, PeerPredicate, PredicateClientVerifier};
use rustls::ServerConfig;
use tracing::info;

use crate::acceptor::PeerCertAcceptor;

/// Serves `router` on `addr` over mutual TLS, presenting `identity` and
/// accepting any peer whose embedded key satisfies `predicate`. Runs
/// until `handle` is told to shut down.
pub async fn serve_mtls<P>(
    addr: SocketAddr,
    identity: IdentityCertificate,
    predicate: P,
    router: Router,
    handle: Handle,
) -> std::io::Result<()>
where
    P: PeerPredicate + 'static,
{
    let verifier = Arc::new(PredicateClientVerifier::new(predicate));
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(rustls::DEFAULT_VERSIONS)
        .map_err(|err| std::io::Error::other(err.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(vec![identity.cert_der], identity.key_der.into())
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    let acceptor = PeerCertAcceptor::new(RustlsAcceptor::new(axum_server::tls_rustls::RustlsConfig::from_config(
        Arc::new(config),
    )));

    info!(%addr, "peer API listening (mutual TLS)");
    axum_server::bind(addr)
        .acceptor(acceptor)
        .handle(handle)
        .serve(router.into_make_service())
        .await
}
