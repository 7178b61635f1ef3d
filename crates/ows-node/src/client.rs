//! The outbound mutual-TLS client a node uses to sync against peers,
//! forward gossip, and fan out uploaded assets.
//!
//! Unlike the operator CLI (which trusts whatever address it was given
//! and skips server-certificate verification), a node's outbound
//! connections matter: gossip and sync traffic should only ever reach
//! another *node*, never an impersonator. [`PeerHttp`] wires a real
//! `rustls::ClientConfig` around [`PredicateServerVerifier`], checking
//! the peer's embedded key against the current snapshot's known nodes
//! via [`KeyRoles`], and hands it to `reqwest` with
//! `use_preconfigured_tls` rather than reqwest's own certificate store.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ows_identity::{make_self_signed, KeyPair, PredicateServerVerifier};
use ows_ledger::ChangeSet;
use ows_sync::{PeerClient, SyncError};
use rustls::ClientConfig;

use crate::classifier::KeyRoles;

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(15);

fn build_client_config(key_pair: &KeyPair, known_nodes: std::sync::Arc<KeyRoles>) -> Result<ClientConfig> {
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&key_pair.seed());
    let identity = make_self_signed(&signing_key).context("build client certificate")?;
    let verifier = std::sync::Arc::new(PredicateServerVerifier::new(known_nodes));
    let provider = std::sync::Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(rustls::DEFAULT_VERSIONS)
        .map_err(|err| anyhow::anyhow!("unsupported protocol versions: {err}"))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_auth_cert(vec![identity.cert_der], identity.key_der.into())
        .context("attach client certificate")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

/// A `reqwest` client authenticated as a node, verifying every peer it
/// connects to against the current snapshot's known-node set.
#[derive(Clone)]
pub struct PeerHttp {
    http: reqwest::Client,
}

impl PeerHttp {
    /// Builds an outbound client presenting `key_pair`'s self-signed
    /// identity and trusting only node keys known to `known_nodes`.
    pub fn new(key_pair: &KeyPair, known_nodes: std::sync::Arc<KeyRoles>) -> Result<Self> {
        let tls_config = build_client_config(key_pair, known_nodes)?;
        let http = reqwest::Client::builder()
            .use_preconfigured_tls(tls_config)
            .timeout(OUTBOUND_TIMEOUT)
            .build()
            .context("build outbound http client")?;
        Ok(Self { http })
    }

    /// `GET <base_url>/head`.
    pub async fn head(&self, base_url: &str) -> Result<String, SyncError> {
        let response = self
            .http
            .get(format!("{base_url}/head"))
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        response.text().await.map_err(|err| SyncError::Transport(err.to_string()))
    }

    /// `GET <base_url>/`.
    pub async fn id_chain(&self, base_url: &str) -> Result<Vec<String>, SyncError> {
        let response = self
            .http
            .get(base_url)
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        response.json::<Vec<String>>().await.map_err(|err| SyncError::Transport(err.to_string()))
    }

    /// `GET <base_url>/<id>`.
    pub async fn change_set(&self, base_url: &str, id: &str) -> Result<ChangeSet, SyncError> {
        let response = self
            .http
            .get(format!("{base_url}/{id}"))
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        let bytes = response.bytes().await.map_err(|err| SyncError::Transport(err.to_string()))?;
        ChangeSet::decode(&bytes, ows_codec::LedgerVersion::CURRENT.get()).map_err(SyncError::from)
    }

    /// `PUT <base_url>/` on a peer's gossip port.
    pub async fn push_gossip(&self, base_url: &str, raw_bytes: Vec<u8>) -> Result<()> {
        let response = self
            .http
            .put(base_url)
            .header("content-type", "application/cbor")
            .body(raw_bytes)
            .send()
            .await
            .context("push gossip")?;
        if !response.status().is_success() {
            bail!("peer rejected gossip: {}", response.status());
        }
        Ok(())
    }

    /// `PUT <base_url>/assets` on a peer's API port, for asset fan-out.
    pub async fn upload_asset(&self, base_url: &str, bytes: Vec<u8>) -> Result<String> {
        let response = self
            .http
            .put(format!("{base_url}/assets"))
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .context("upload asset")?;
        if !response.status().is_success() {
            bail!("peer rejected asset upload: {}", response.status());
        }
        response.text().await.context("read asset id")
    }
}

/// A [`PeerClient`] bound to one peer's API base URL, for [`ows_sync::sync`].
pub struct SyncTarget<'a> {
    http: &'a PeerHttp,
    base_url: String,
}

impl<'a> SyncTarget<'a> {
    /// Binds `http` to `base_url` for a single sync run.
    #[must_use]
    pub fn new(http: &'a PeerHttp, base_url: String) -> Self {
        Self { http, base_url }
    }
}

#[async_trait]
impl PeerClient for SyncTarget<'_> {
    async fn head(&self) -> Result<String, SyncError> {
        self.http.head(&self.base_url).await
    }

    async fn id_chain(&self) -> Result<Vec<String>, SyncError> {
        self.http.id_chain(&self.base_url).await
    }

    async fn change_set(&self, id: &str) -> Result<ChangeSet, SyncError> {
        self.http.change_set(&self.base_url, id).await
    }
}
