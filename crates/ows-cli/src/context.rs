//! Resolves the on-disk layout a CLI invocation operates against: the
//! platform data directory, the active project's ledger, and the local
//! signing key.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use ows_identity::KeyPair;
use ows_ledger::{store, Ledger};

const DEFAULT_POINTER_FILE: &str = ".default";

/// The resolved environment a command runs in: where things live on disk
/// and which project is active.
pub struct Context {
    /// The platform data directory (e.g. `~/.local/share/ows`).
    pub data_dir: PathBuf,
    /// The project name this invocation operates on.
    pub project: String,
}

impl Context {
    /// Resolves the data directory and active project, falling back to
    /// the `--project` flag, then the `projects/.default` pointer, then
    /// `"default"`.
    pub fn resolve(project_flag: Option<String>) -> Result<Self> {
        let data_dir = store::data_dir().context("resolve data directory")?;
        let project = match project_flag {
            Some(name) => name,
            None => read_default_pointer(&data_dir).unwrap_or_else(|| store::default_project_name().to_string()),
        };
        Ok(Self { data_dir, project })
    }

    /// Loads the local signing key, honoring `OWS_PRIVATE_KEY` first.
    pub fn load_key_pair(&self) -> Result<KeyPair> {
        if let Ok(seed_str) = std::env::var(ows_identity::PRIVATE_KEY_ENV) {
            let seed = ows_identity::parse_private_key_seed(&seed_str).context("parse OWS_PRIVATE_KEY")?;
            return Ok(KeyPair::from_seed(seed));
        }
        store::load_key_pair(&self.data_dir).context("load local key; run `ows key generate` first")
    }

    /// Loads the active project's ledger.
    pub fn load_ledger(&self) -> Result<Ledger> {
        store::load_project_ledger(&self.data_dir, &self.project).context("load project ledger")
    }

    /// Saves `ledger` as the active project's ledger.
    pub fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        store::save_project_ledger(&self.data_dir, &self.project, ledger).context("save project ledger")
    }

    /// Marks `project` as the default for future invocations that don't
    /// pass `--project`.
    pub fn set_default_project(&self, project: &str) -> Result<()> {
        let path = self.data_dir.join("projects").join(DEFAULT_POINTER_FILE);
        store::write_atomic(&path, project.as_bytes()).context("write default project pointer")
    }
}

fn read_default_pointer(data_dir: &std::path::Path) -> Option<String> {
    let path = data_dir.join("projects").join(DEFAULT_POINTER_FILE);
    std::fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}
