//! Flat key-value persistence, one JSON file per key.
//!
//! This is the `getItem`/`setItem`/`deleteItem` contract the surface sees:
//! `get_item` returns the caller's default when the key is absent and never
//! fails for a missing key; everything else that goes wrong is a storage-layer
//! error.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::error::{HostError, Result};

#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the stored value for `key`, or `default` when absent.
    pub fn get_item(&self, key: &str, default: JsonValue) -> Result<JsonValue> {
        let path = self.key_path(key)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(default),
            Err(err) => {
                return Err(HostError::Storage(format!(
                    "reading {}: {err}",
                    path.display()
                )));
            }
        };
        serde_json::from_str(&content)
            .map_err(|err| HostError::Storage(format!("parsing {}: {err}", path.display())))
    }

    pub fn set_item(&self, key: &str, value: &JsonValue) -> Result<()> {
        let path = self.key_path(key)?;
        fs::create_dir_all(&self.dir)
            .map_err(|err| HostError::Storage(format!("creating {}: {err}", self.dir.display())))?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .map_err(|err| HostError::Storage(format!("writing {}: {err}", path.display())))
    }

    /// Removes `key`. Deleting an absent key is a no-op.
    pub fn delete_item(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(HostError::Storage(format!(
                "deleting {}: {err}",
                path.display()
            ))),
        }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(HostError::Storage("storage key must not be empty".into()));
        }
        // Keys come from the unprivileged surface; never let one escape the
        // storage directory.
        let sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if sanitized.chars().all(|c| c == '.') {
            return Err(HostError::Storage(format!("invalid storage key '{key}'")));
        }
        Ok(self.dir.join(format!("{sanitized}.json")))
    }
}

/// Default storage directory: `$XDG_CONFIG_HOME/graphdock`, falling back to
/// `~/.config/graphdock`.
pub fn default_storage_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("graphdock")
}
