//! `ows`: the operator CLI. Reads and writes a local ledger, signs new
//! change sets with a local key, and optionally syncs or submits against
//! a node's peer API.

// A CLI's job is to print to stdout; the workspace-wide restriction lint
// exists for library crates that might shadow an embedder's output.
#![allow(clippy::print_stdout)]

mod client;
mod context;

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use ows_codec::{blake2b128, encode_digest_id, HRP_ASSET};
use ows_ledger::store;
use ows_ledger::{Action, ChangeSet};
use tracing_subscriber::EnvFilter;

use crate::client::HttpPeer;
use crate::context::Context;

#[derive(Parser)]
#[command(name = "ows", about = "Operator CLI for an OWS project ledger", version)]
struct Cli {
    /// Project to operate on; defaults to the `projects/.default` pointer.
    #[arg(long, global = true)]
    project: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstraps a fresh project: generates a key if none exists and
    /// signs an empty genesis change set naming the caller as root.
    Init,
    /// Lists or selects the default project.
    Projects(ProjectsArgs),
    /// Lists peer nodes known to the current snapshot.
    Nodes,
    /// Inspects or syncs the local ledger.
    Ledger(LedgerArgs),
    /// Manages the local signing key.
    Key(KeyArgs),
    /// Manages local and remote asset blobs.
    Assets(AssetsArgs),
    /// Deploys or removes functions.
    Functions(FunctionsArgs),
    /// Manages gateways and their routes.
    Gateways(GatewaysArgs),
    /// Prints the CLI's version.
    Version,
}

#[derive(Args)]
struct ProjectsArgs {
    #[command(subcommand)]
    command: ProjectsCommands,
}

#[derive(Subcommand)]
enum ProjectsCommands {
    /// Lists every project known locally.
    List,
    /// Sets the default project for future invocations.
    Default {
        /// Project name to make the default.
        name: String,
    },
}

#[derive(Args)]
struct LedgerArgs {
    #[command(subcommand)]
    command: LedgerCommands,
}

#[derive(Subcommand)]
enum LedgerCommands {
    /// Prints the id chain and a summary of the current snapshot.
    Show,
    /// Pulls any change sets a node has beyond the local ledger.
    Sync {
        /// Base URL of the node's API port, e.g. `https://node:4001`.
        #[arg(long)]
        node: String,
    },
}

#[derive(Args)]
struct KeyArgs {
    #[command(subcommand)]
    command: KeyCommands,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generates a new key and saves it locally, printing its backup phrase.
    Generate,
    /// Prints the local key's public key and derived ids.
    Show,
    /// Restores a key from its 24-word backup phrase and saves it locally.
    Restore {
        /// The 24 space-separated backup words.
        #[arg(long, num_args = 24)]
        phrase: Vec<String>,
    },
}

#[derive(Args)]
struct AssetsArgs {
    #[command(subcommand)]
    command: AssetsCommands,
}

#[derive(Subcommand)]
enum AssetsCommands {
    /// Stores a local file as an asset, printing its id.
    Add {
        /// Path to the file to store.
        path: PathBuf,
    },
    /// Lists locally stored asset ids.
    List,
    /// Uploads a locally stored asset to a node.
    Push {
        /// Id of a previously `add`ed asset.
        asset_id: String,
        /// Base URL of the node's API port.
        #[arg(long)]
        node: String,
    },
}

#[derive(Args)]
struct FunctionsArgs {
    #[command(subcommand)]
    command: FunctionsCommands,
}

#[derive(Subcommand)]
enum FunctionsCommands {
    /// Deploys a function, signing and submitting an `AddFunction` change set.
    Add {
        #[arg(long)]
        runtime: String,
        #[arg(long)]
        handler_asset_id: String,
        #[arg(long)]
        node: String,
    },
    /// Undeploys a function.
    Remove {
        fn_id: String,
        #[arg(long)]
        node: String,
    },
    /// Lists deployed functions in the local snapshot.
    List,
}

#[derive(Args)]
struct GatewaysArgs {
    #[command(subcommand)]
    command: GatewaysCommands,
}

#[derive(Subcommand)]
enum GatewaysCommands {
    /// Opens a new gateway listener.
    Add {
        #[arg(long)]
        port: u16,
        #[arg(long)]
        node: String,
    },
    /// Closes a gateway listener.
    Remove {
        gateway_id: String,
        #[arg(long)]
        node: String,
    },
    /// Manages a gateway's routes.
    Endpoints {
        #[command(subcommand)]
        command: EndpointsCommands,
    },
    /// Lists gateways in the local snapshot.
    List,
}

#[derive(Subcommand)]
enum EndpointsCommands {
    /// Attaches a route to a gateway.
    Add {
        gateway_id: String,
        #[arg(long)]
        method: String,
        #[arg(long)]
        path: String,
        #[arg(long)]
        fn_id: String,
        #[arg(long)]
        node: String,
    },
    /// Lists a gateway's routes.
    List { gateway_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let ctx = Context::resolve(cli.project)?;

    match cli.command {
        Commands::Init => cmd_init(&ctx),
        Commands::Projects(args) => cmd_projects(&ctx, args),
        Commands::Nodes => cmd_nodes(&ctx),
        Commands::Ledger(args) => cmd_ledger(&ctx, args).await,
        Commands::Key(args) => cmd_key(&ctx, args),
        Commands::Assets(args) => cmd_assets(&ctx, args).await,
        Commands::Functions(args) => cmd_functions(&ctx, args).await,
        Commands::Gateways(args) => cmd_gateways(&ctx, args).await,
        Commands::Version => {
            println!("ows {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn cmd_init(ctx: &Context) -> Result<()> {
    let key_pair = match store::load_key_pair(&ctx.data_dir) {
        Ok(kp) => kp,
        Err(_) => {
            let kp = ows_identity::KeyPair::generate();
            store::save_key_pair(&ctx.data_dir, &kp)?;
            println!("generated a new key; back it up: {}", kp.phrase()?.join(" "));
            kp
        }
    };

    let mut genesis = ChangeSet::new(String::new(), Vec::new());
    genesis.sign(&key_pair)?;
    let ledger = ows_ledger::Ledger::build(ows_codec::LedgerVersion::CURRENT, vec![genesis])?;
    ctx.save_ledger(&ledger)?;
    ctx.set_default_project(&ctx.project)?;
    println!("initialized project {} at head {}", ledger.project_id()?, ledger.head());
    Ok(())
}

fn cmd_projects(ctx: &Context, args: ProjectsArgs) -> Result<()> {
    match args.command {
        ProjectsCommands::List => {
            let projects_dir = ctx.data_dir.join("projects");
            if !projects_dir.exists() {
                return Ok(());
            }
            for entry in std::fs::read_dir(projects_dir)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if name != ".default" {
                    println!("{name}");
                }
            }
            Ok(())
        }
        ProjectsCommands::Default { name } => {
            ctx.set_default_project(&name)?;
            println!("default project set to {name}");
            Ok(())
        }
    }
}

fn cmd_nodes(ctx: &Context) -> Result<()> {
    let ledger = ctx.load_ledger()?;
    for (id, node) in &ledger.snapshot().nodes {
        println!("{id}\t{}\tgossip={}\tapi={}", node.address, node.gossip_port, node.api_port);
    }
    Ok(())
}

fn cmd_key(ctx: &Context, args: KeyArgs) -> Result<()> {
    match args.command {
        KeyCommands::Generate => {
            let key_pair = ows_identity::KeyPair::generate();
            store::save_key_pair(&ctx.data_dir, &key_pair)?;
            println!("node id: {}", key_pair.node_id()?);
            println!("user id: {}", key_pair.user_id()?);
            println!("backup phrase: {}", key_pair.phrase()?.join(" "));
            Ok(())
        }
        KeyCommands::Show => {
            let key_pair = ctx.load_key_pair()?;
            println!("public key: {}", hex::encode(key_pair.public_key_bytes()));
            println!("node id: {}", key_pair.node_id()?);
            println!("user id: {}", key_pair.user_id()?);
            Ok(())
        }
        KeyCommands::Restore { phrase } => {
            let key_pair = ows_identity::KeyPair::restore(&phrase)?;
            store::save_key_pair(&ctx.data_dir, &key_pair)?;
            println!("restored user id: {}", key_pair.user_id()?);
            Ok(())
        }
    }
}

async fn cmd_ledger(ctx: &Context, args: LedgerArgs) -> Result<()> {
    match args.command {
        LedgerCommands::Show => {
            let ledger = ctx.load_ledger()?;
            for id in ledger.id_chain()? {
                println!("{id}");
            }
            let snapshot = ledger.snapshot();
            println!(
                "functions={} gateways={} nodes={} users={}",
                snapshot.functions.len(),
                snapshot.gateways.len(),
                snapshot.nodes.len(),
                snapshot.users.len()
            );
            Ok(())
        }
        LedgerCommands::Sync { node } => {
            let key_pair = ctx.load_key_pair()?;
            let mut ledger = ctx.load_ledger()?;
            let peer = HttpPeer::new(node, &key_pair)?;
            ows_sync::sync(&mut ledger, &peer).await?;
            ctx.save_ledger(&ledger)?;
            println!("synced to head {}", ledger.head());
            Ok(())
        }
    }
}

async fn cmd_assets(ctx: &Context, args: AssetsArgs) -> Result<()> {
    match args.command {
        AssetsCommands::Add { path } => {
            let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            let digest = blake2b128(&bytes);
            let id = encode_digest_id(HRP_ASSET, &digest)?;
            store::save_asset(&ctx.data_dir, &id, &bytes)?;
            println!("{id}");
            Ok(())
        }
        AssetsCommands::List => {
            for id in store::list_assets(&ctx.data_dir)? {
                println!("{id}");
            }
            Ok(())
        }
        AssetsCommands::Push { asset_id, node } => {
            let key_pair = ctx.load_key_pair()?;
            let bytes = store::load_asset(&ctx.data_dir, &asset_id)?;
            let peer = HttpPeer::new(node, &key_pair)?;
            let stored_id = peer.upload_asset(bytes).await?;
            if stored_id != asset_id {
                bail!("node stored asset under a different id: {stored_id}");
            }
            println!("pushed {asset_id}");
            Ok(())
        }
    }
}

async fn submit(ctx: &Context, node: String, action: Action) -> Result<()> {
    let key_pair = ctx.load_key_pair()?;
    let ledger = ctx.load_ledger()?;
    let mut cs = ChangeSet::new(ledger.head().to_string(), vec![action]);
    cs.sign(&key_pair)?;
    let peer = HttpPeer::new(node, &key_pair)?;
    peer.submit_change_set(&cs).await?;
    println!("submitted {}", cs.id()?);
    Ok(())
}

async fn cmd_functions(ctx: &Context, args: FunctionsArgs) -> Result<()> {
    match args.command {
        FunctionsCommands::Add { runtime, handler_asset_id, node } => {
            submit(ctx, node, Action::AddFunction { runtime, handler_asset_id }).await
        }
        FunctionsCommands::Remove { fn_id, node } => {
            submit(ctx, node, Action::RemoveFunction { fn_id }).await
        }
        FunctionsCommands::List => {
            let ledger = ctx.load_ledger()?;
            for (id, function) in &ledger.snapshot().functions {
                println!("{id}\t{}\t{}", function.runtime, function.handler_asset_id);
            }
            Ok(())
        }
    }
}

async fn cmd_gateways(ctx: &Context, args: GatewaysArgs) -> Result<()> {
    match args.command {
        GatewaysCommands::Add { port, node } => submit(ctx, node, Action::AddGateway { port }).await,
        GatewaysCommands::Remove { gateway_id, node } => {
            submit(ctx, node, Action::RemoveGateway { gateway_id }).await
        }
        GatewaysCommands::List => {
            let ledger = ctx.load_ledger()?;
            for (id, gateway) in &ledger.snapshot().gateways {
                println!("{id}\tport={}\tendpoints={}", gateway.port, gateway.endpoints.len());
            }
            Ok(())
        }
        GatewaysCommands::Endpoints { command } => match command {
            EndpointsCommands::Add { gateway_id, method, path, fn_id, node } => {
                submit(ctx, node, Action::AddGatewayEndpoint { gateway_id, method, path, fn_id }).await
            }
            EndpointsCommands::List { gateway_id } => {
                let ledger = ctx.load_ledger()?;
                let gateway = ledger
                    .snapshot()
                    .gateways
                    .get(&gateway_id)
                    .with_context(|| format!("no such gateway: {gateway_id}"))?;
                for endpoint in &gateway.endpoints {
                    println!("{}\t{}\t{}", endpoint.method, endpoint.path, endpoint.fn_id);
                }
                Ok(())
            }
        },
    }
}
