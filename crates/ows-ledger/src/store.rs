//! Durable storage for a node's identity key and its projects' ledgers.
//!
//! Every write goes through [`write_atomic`]: the new bytes land in a
//! temp file next to the target, get `fsync`ed, and are then renamed
//! into place, so a crash mid-write never leaves a half-written ledger
//! or key file on disk.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use ciborium::Value;
use directories::ProjectDirs;
use ows_codec::canonical;
use ows_identity::KeyPair;

use crate::error::LedgerError;
use crate::ledger::Ledger;

const DEFAULT_PROJECT_NAME: &str = "default";

/// Resolves the platform data directory this node stores its key and
/// project ledgers under (e.g. `~/.local/share/ows` on Linux).
pub fn data_dir() -> Result<PathBuf, LedgerError> {
    let dirs = ProjectDirs::from("dev", "ows", "ows")
        .ok_or_else(|| LedgerError::Io(std::io::Error::other("could not resolve a platform data directory")))?;
    let base = dirs.data_dir().to_path_buf();
    fs::create_dir_all(&base)?;
    Ok(base)
}

/// Writes `bytes` to `path` atomically: a sibling temp file is written,
/// `fsync`ed, and renamed over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LedgerError> {
    let parent = path
        .parent()
        .ok_or_else(|| LedgerError::Io(std::io::Error::other("path has no parent directory")))?;
    fs::create_dir_all(parent)?;
    let temp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("ows")
    ));
    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn key_path(dir: &Path) -> PathBuf {
    dir.join("key")
}

fn project_path(dir: &Path, project: &str) -> PathBuf {
    dir.join("projects").join(project)
}

/// Saves `key_pair`'s seed and public key to `dir/key` as a canonical
/// CBOR `{0: seed, 1: public_key}` map.
pub fn save_key_pair(dir: &Path, key_pair: &KeyPair) -> Result<(), LedgerError> {
    let value = Value::Map(vec![
        (Value::Integer(0.into()), Value::Bytes(key_pair.seed().to_vec())),
        (Value::Integer(1.into()), Value::Bytes(key_pair.public_key_bytes().to_vec())),
    ]);
    let bytes = canonical::encode(&value)?;
    write_atomic(&key_path(dir), &bytes)
}

/// Loads the key pair saved by [`save_key_pair`].
pub fn load_key_pair(dir: &Path) -> Result<KeyPair, LedgerError> {
    let bytes = fs::read(key_path(dir))?;
    let value = canonical::decode(&bytes)?;
    let Value::Map(entries) = value else {
        return Err(LedgerError::Decode("key file: expected map".to_string()));
    };
    let seed_bytes = entries
        .iter()
        .find(|(k, _)| matches!(k, Value::Integer(n) if *n == 0.into()))
        .and_then(|(_, v)| if let Value::Bytes(b) = v { Some(b.clone()) } else { None })
        .ok_or_else(|| LedgerError::Decode("key file: missing seed".to_string()))?;
    let seed: [u8; 32] = seed_bytes
        .as_slice()
        .try_into()
        .map_err(|_| LedgerError::Decode("key file: seed is not 32 bytes".to_string()))?;
    Ok(KeyPair::from_seed(seed))
}

/// Saves `ledger` under `dir/projects/<project>`.
pub fn save_project_ledger(dir: &Path, project: &str, ledger: &Ledger) -> Result<(), LedgerError> {
    let bytes = ledger.encode()?;
    write_atomic(&project_path(dir, project), &bytes)
}

/// Loads the ledger previously saved for `project` under `dir`.
pub fn load_project_ledger(dir: &Path, project: &str) -> Result<Ledger, LedgerError> {
    let bytes = fs::read(project_path(dir, project))
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => LedgerError::NotFound(format!("project {project}")),
            _ => LedgerError::Io(err),
        })?;
    Ledger::decode(&bytes)
}

/// The name of the project a bare `--project` flag resolves to when the
/// caller did not name one explicitly.
#[must_use]
pub fn default_project_name() -> &'static str {
    DEFAULT_PROJECT_NAME
}

fn asset_path(dir: &Path, asset_id: &str) -> PathBuf {
    dir.join("assets").join(asset_id)
}

/// Saves `bytes` under `dir/assets/<asset_id>`. The caller is responsible
/// for `asset_id` being the asset's own bech32 digest id.
pub fn save_asset(dir: &Path, asset_id: &str, bytes: &[u8]) -> Result<(), LedgerError> {
    write_atomic(&asset_path(dir, asset_id), bytes)
}

/// Loads the bytes saved by [`save_asset`].
pub fn load_asset(dir: &Path, asset_id: &str) -> Result<Vec<u8>, LedgerError> {
    fs::read(asset_path(dir, asset_id)).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => LedgerError::NotFound(format!("asset {asset_id}")),
        _ => LedgerError::Io(err),
    })
}

/// Lists the ids of every asset currently stored under `dir/assets`.
pub fn list_assets(dir: &Path) -> Result<Vec<String>, LedgerError> {
    let assets_dir = dir.join("assets");
    if !assets_dir.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in fs::read_dir(&assets_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                ids.push(name.to_string());
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn key_pair_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key_pair = KeyPair::from_seed([3u8; 32]);
        save_key_pair(dir.path(), &key_pair).expect("save");
        let loaded = load_key_pair(dir.path()).expect("load");
        assert_eq!(key_pair.public_key_bytes(), loaded.public_key_bytes());
    }

    #[test]
    fn atomic_write_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("ledger");
        write_atomic(&target, b"hello").expect("write");
        assert_eq!(fs::read(&target).expect("read"), b"hello");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn asset_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        save_asset(dir.path(), "asset1abc", b"blob").expect("save");
        assert_eq!(load_asset(dir.path(), "asset1abc").expect("load"), b"blob");
        assert_eq!(list_assets(dir.path()).expect("list"), vec!["asset1abc".to_string()]);
    }

    #[test]
    fn list_assets_on_a_fresh_directory_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(list_assets(dir.path()).expect("list").is_empty());
    }

    #[test]
    fn missing_asset_reports_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_asset(dir.path(), "missing");
        assert!(matches!(err, Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn load_project_ledger_reports_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_project_ledger(dir.path(), "missing");
        assert!(matches!(err, Err(LedgerError::NotFound(_))));
    }
}
