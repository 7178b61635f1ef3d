//! `ows-node`: the daemon that hosts a project's API and gossip
//! listeners over mutual TLS, reconciling local resources as the
//! ledger advances.

mod api;
mod classifier;
mod client;
mod gossip;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum_server::Handle;
use clap::Parser;
use ows_identity::{make_self_signed, KeyPair, PRIVATE_KEY_ENV};
use ows_ledger::{store, Ledger, Snapshot};
use ows_net::{build_api_router, build_gossip_router, serve_mtls, NodeApi};
use ows_resources::reconcile_snapshot;
use tracing_subscriber::EnvFilter;

use crate::api::NodeApiImpl;
use crate::classifier::AcceptAnyPeer;
use crate::state::NodeState;

/// Name of the environment variable carrying a fresh project's
/// bootstrap ledger (base64 CBOR of `[version, first change set]`).
const INITIAL_CONFIG_ENV: &str = "OWS_INITIAL_CONFIG";

#[derive(Parser)]
#[command(name = "ows-node", about = "OWS project node daemon", version)]
struct Args {
    /// Address the peer API listens on.
    #[arg(long, default_value = "0.0.0.0:4001")]
    listen: SocketAddr,
    /// Address the gossip port listens on.
    #[arg(long, default_value = "0.0.0.0:4000")]
    gossip_listen: SocketAddr,
    /// Project name this node serves; defaults to the platform default.
    #[arg(long)]
    project: Option<String>,
    /// Override the on-disk data directory (defaults to the platform
    /// data directory).
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn resolve_key_pair(data_dir: &std::path::Path) -> Result<KeyPair> {
    if let Ok(seed_str) = std::env::var(PRIVATE_KEY_ENV) {
        let seed = ows_identity::parse_private_key_seed(&seed_str)
            .map_err(|err| anyhow::anyhow!("{PRIVATE_KEY_ENV}: {err}"))?;
        return Ok(KeyPair::from_seed(seed));
    }
    store::load_key_pair(data_dir).context(format!(
        "no on-disk key and {PRIVATE_KEY_ENV} was not set; run `ows key generate` or set {PRIVATE_KEY_ENV}"
    ))
}

fn resolve_ledger(data_dir: &std::path::Path, project: &str) -> Result<Ledger> {
    match store::load_project_ledger(data_dir, project) {
        Ok(ledger) => Ok(ledger),
        Err(ows_ledger::LedgerError::NotFound(_)) => {
            let Ok(encoded) = std::env::var(INITIAL_CONFIG_ENV) else {
                bail!(
                    "no ledger for project {project} and {INITIAL_CONFIG_ENV} was not set; \
                     this node has nothing to bootstrap from"
                );
            };
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine as _;
            let bytes = STANDARD.decode(encoded.trim()).context("decode OWS_INITIAL_CONFIG as base64")?;
            let ledger = Ledger::decode(&bytes).context("decode initial ledger")?;
            store::save_project_ledger(data_dir, project, &ledger).context("persist bootstrapped ledger")?;
            Ok(ledger)
        }
        Err(err) => Err(err.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => store::data_dir()?,
    };
    let project = args.project.unwrap_or_else(|| store::default_project_name().to_string());

    let key_pair = resolve_key_pair(&data_dir)?;
    let ledger = resolve_ledger(&data_dir, &project)?;
    if !ledger.version().is_supported() {
        bail!("ledger version {} is not supported by this build", ledger.version());
    }

    let node_state = Arc::new(
        NodeState::new(project.clone(), data_dir.clone(), key_pair, ledger)
            .map_err(|err| anyhow::anyhow!("build node state: {err}"))?,
    );
    tracing::info!(node_id = %node_state.node_id, %project, "starting node");

    // Loading a ledger is itself a reconciliation trigger (§4.10): seed
    // the resource doubles from an empty snapshot up to the one just
    // loaded, as if every function, gateway, and node had just appeared.
    {
        let ledger = node_state.ledger.read().await;
        let empty = Snapshot::new(ledger.version());
        reconcile_snapshot(
            &empty,
            ledger.snapshot(),
            &node_state.gateway_runtime,
            &node_state.function_loader,
            &node_state.peer_directory,
        )
        .await;
    }

    let node_api: Arc<dyn NodeApi> = Arc::new(NodeApiImpl::new(node_state.clone()));
    let classifier: Arc<dyn ows_identity::PeerRoleClassifier> = node_state.key_roles.clone();

    let api_router = build_api_router(node_api.clone(), classifier.clone());
    let gossip_router = build_gossip_router(node_api, classifier);

    let signing_key = ed25519_dalek::SigningKey::from_bytes(&node_state.key_pair.seed());
    let api_identity = make_self_signed(&signing_key).context("build api certificate")?;
    let gossip_identity = make_self_signed(&signing_key).context("build gossip certificate")?;

    let api_handle = Handle::new();
    let gossip_handle = Handle::new();
    let (api_shutdown, gossip_shutdown) = (api_handle.clone(), gossip_handle.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            api_shutdown.shutdown();
            gossip_shutdown.shutdown();
        }
    });

    let api_addr = args.listen;
    let gossip_addr = args.gossip_listen;
    let api_server = tokio::spawn(serve_mtls(api_addr, api_identity, AcceptAnyPeer, api_router, api_handle));
    let gossip_server =
        tokio::spawn(serve_mtls(gossip_addr, gossip_identity, AcceptAnyPeer, gossip_router, gossip_handle));

    let (api_result, gossip_result) = tokio::join!(api_server, gossip_server);
    api_result.context("api listener task panicked")?.context("api listener failed")?;
    gossip_result.context("gossip listener task panicked")?.context("gossip listener failed")?;

    Ok(())
}
