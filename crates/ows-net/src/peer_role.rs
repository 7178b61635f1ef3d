//! Resolves the [`PeerCertificate`] attached by [`crate::acceptor`] into a
//! [`VerifiedPeer`] using the node's current [`PeerRoleClassifier`], and
//! rejects connections that presented no client certificate at all.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ows_identity::{extract_ed25519_public_key, PeerRoleClassifier};

use crate::acceptor::PeerCertificate;
use crate::api::VerifiedPeer;

/// Axum middleware: extracts the peer's public key from its certificate
/// and classifies it, inserting a [`VerifiedPeer`] request extension for
/// downstream handlers.
pub async fn resolve_peer(
    State(classifier): State<Arc<dyn PeerRoleClassifier>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(PeerCertificate(Some(cert))) = request.extensions().get::<PeerCertificate>().cloned()
    else {
        return (StatusCode::UNAUTHORIZED, "no client certificate presented").into_response();
    };
    let Ok(public_key) = extract_ed25519_public_key(cert.as_ref()) else {
        return (StatusCode::UNAUTHORIZED, "client certificate did not embed an Ed25519 key")
            .into_response();
    };
    let role = classifier.classify(&public_key);
    request.extensions_mut().insert(VerifiedPeer { public_key, role });
    next.run(request).await
}
