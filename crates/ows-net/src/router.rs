//! The route table of spec.md §4.9, split across the node's two
//! listeners: the API port (id chain, change sets, assets, submission)
//! and the gossip port (push gossip only, node peers only).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use ows_identity::{PeerRole, PeerRoleClassifier};

use crate::api::{NodeApi, VerifiedPeer};
use crate::error::NetError;
use crate::peer_role::resolve_peer;

#[derive(Clone)]
struct ApiState {
    node: Arc<dyn NodeApi>,
    classifier: Arc<dyn PeerRoleClassifier>,
}

/// Builds the API-port router: every verb of §4.9 except the gossip-port
/// `PUT /`.
pub fn build_api_router(node: Arc<dyn NodeApi>, classifier: Arc<dyn PeerRoleClassifier>) -> Router {
    let state = ApiState { node, classifier: classifier.clone() };
    Router::new()
        .route("/", get(id_chain).post(submit_change_set))
        .route("/head", get(head))
        .route("/assets", get(list_assets).put(upload_asset))
        .route("/assets/{asset_id}", get(asset))
        .route("/{change_set_id}", get(change_set))
        .layer(middleware::from_fn_with_state(classifier, resolve_peer))
        .with_state(state)
}

/// Builds the gossip-port router: only `PUT /`, restricted to verified
/// node peers.
pub fn build_gossip_router(node: Arc<dyn NodeApi>, classifier: Arc<dyn PeerRoleClassifier>) -> Router {
    let state = ApiState { node, classifier: classifier.clone() };
    Router::new()
        .route("/", put(receive_gossip))
        .layer(middleware::from_fn_with_state(classifier, resolve_peer))
        .with_state(state)
}

async fn id_chain(State(state): State<ApiState>) -> Result<Json<Vec<String>>, NetError> {
    Ok(Json(state.node.id_chain().await?))
}

async fn head(State(state): State<ApiState>) -> Result<String, NetError> {
    state.node.head().await
}

async fn change_set(
    State(state): State<ApiState>,
    Path(change_set_id): Path<String>,
) -> Result<Response, NetError> {
    let bytes = state.node.change_set(&change_set_id).await?;
    Ok((
        [(axum::http::header::CONTENT_TYPE, "application/cbor")],
        bytes,
    )
        .into_response())
}

async fn submit_change_set(
    State(state): State<ApiState>,
    peer: axum::extract::Extension<VerifiedPeer>,
    body: Bytes,
) -> Result<StatusCode, NetError> {
    state.node.submit_change_set(&peer.0, body.to_vec()).await?;
    Ok(StatusCode::OK)
}

async fn list_assets(State(state): State<ApiState>) -> Result<Json<Vec<String>>, NetError> {
    Ok(Json(state.node.list_assets().await?))
}

async fn asset(
    State(state): State<ApiState>,
    Path(asset_id): Path<String>,
) -> Result<Response, NetError> {
    let bytes = state.node.asset(&asset_id).await?;
    Ok((
        [(axum::http::header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}

async fn upload_asset(
    State(state): State<ApiState>,
    peer: axum::extract::Extension<VerifiedPeer>,
    body: Bytes,
) -> Result<String, NetError> {
    state.node.upload_asset(&peer.0, body.to_vec()).await
}

async fn receive_gossip(
    State(state): State<ApiState>,
    peer: axum::extract::Extension<VerifiedPeer>,
    body: Bytes,
) -> Result<StatusCode, NetError> {
    if !matches!(peer.0.role, PeerRole::Node) {
        return Err(NetError::Forbidden("gossip port accepts node peers only".to_string()));
    }
    state.node.receive_gossip(&peer.0, body.to_vec()).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use ed25519_dalek::SigningKey;
    use ows_identity::make_self_signed;
    use rustls_pki_types::CertificateDer;
    use tower::ServiceExt;

    use super::*;
    use crate::acceptor::PeerCertificate;

    #[derive(Default)]
    struct FakeNode {
        change_sets: Mutex<std::collections::HashMap<String, Vec<u8>>>,
        submitted: Mutex<Vec<Vec<u8>>>,
        gossip_received: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl NodeApi for FakeNode {
        async fn id_chain(&self) -> Result<Vec<String>, NetError> {
            Ok(vec!["cs1".to_string()])
        }

        async fn head(&self) -> Result<String, NetError> {
            Ok("cs1".to_string())
        }

        async fn change_set(&self, id: &str) -> Result<Vec<u8>, NetError> {
            self.change_sets
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .get(id)
                .cloned()
                .ok_or_else(|| NetError::NotFound(id.to_string()))
        }

        async fn submit_change_set(
            &self,
            _peer: &VerifiedPeer,
            bytes: Vec<u8>,
        ) -> Result<(), NetError> {
            self.submitted
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(bytes);
            Ok(())
        }

        async fn list_assets(&self) -> Result<Vec<String>, NetError> {
            Ok(vec!["asset1".to_string()])
        }

        async fn asset(&self, id: &str) -> Result<Vec<u8>, NetError> {
            if id == "asset1" {
                Ok(vec![1, 2, 3])
            } else {
                Err(NetError::NotFound(id.to_string()))
            }
        }

        async fn upload_asset(
            &self,
            _peer: &VerifiedPeer,
            _bytes: Vec<u8>,
        ) -> Result<String, NetError> {
            Ok("asset1".to_string())
        }

        async fn receive_gossip(&self, _peer: &VerifiedPeer, bytes: Vec<u8>) -> Result<(), NetError> {
            self.gossip_received
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(bytes);
            Ok(())
        }
    }

    struct FixedRole(PeerRole);

    impl PeerRoleClassifier for FixedRole {
        fn classify(&self, _public_key: &[u8; 32]) -> PeerRole {
            self.0
        }
    }

    fn signed_cert() -> CertificateDer<'static> {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        make_self_signed(&key).expect("self-signed cert").cert_der
    }

    fn request_with_cert(method: &str, uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .extension(PeerCertificate(Some(signed_cert())))
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn unknown_peer_can_fetch_the_id_chain() {
        let node: Arc<dyn NodeApi> = Arc::new(FakeNode::default());
        let classifier: Arc<dyn PeerRoleClassifier> = Arc::new(FixedRole(PeerRole::Unknown));
        let router = build_api_router(node, classifier);

        let response = router
            .oneshot(request_with_cert("GET", "/", Vec::new()))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_change_set_is_not_found() {
        let node: Arc<dyn NodeApi> = Arc::new(FakeNode::default());
        let classifier: Arc<dyn PeerRoleClassifier> = Arc::new(FixedRole(PeerRole::User));
        let router = build_api_router(node, classifier);

        let response = router
            .oneshot(request_with_cert("GET", "/missing-change-set", Vec::new()))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn submitting_a_change_set_reaches_the_node_api() {
        let node: Arc<dyn NodeApi> = Arc::new(FakeNode::default());
        let classifier: Arc<dyn PeerRoleClassifier> = Arc::new(FixedRole(PeerRole::User));
        let router = build_api_router(node, classifier);

        let response = router
            .oneshot(request_with_cert("POST", "/", vec![1, 2, 3]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn requests_without_a_client_certificate_are_unauthorized() {
        let node: Arc<dyn NodeApi> = Arc::new(FakeNode::default());
        let classifier: Arc<dyn PeerRoleClassifier> = Arc::new(FixedRole(PeerRole::Node));
        let router = build_api_router(node, classifier);

        let request = Request::builder()
            .method("GET")
            .uri("/head")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn gossip_port_rejects_non_node_peers() {
        let node: Arc<dyn NodeApi> = Arc::new(FakeNode::default());
        let classifier: Arc<dyn PeerRoleClassifier> = Arc::new(FixedRole(PeerRole::User));
        let router = build_gossip_router(node, classifier);

        let response = router
            .oneshot(request_with_cert("PUT", "/", vec![1]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn gossip_port_accepts_node_peers() {
        let node: Arc<dyn NodeApi> = Arc::new(FakeNode::default());
        let classifier: Arc<dyn PeerRoleClassifier> = Arc::new(FixedRole(PeerRole::Node));
        let router = build_gossip_router(node, classifier);

        let response = router
            .oneshot(request_with_cert("PUT", "/", vec![1]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
