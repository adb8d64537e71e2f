//! Delivered-post registry. Gates forwarding; the scheduler is its only writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub fn dedup_key(handle: &str, post_id: &str) -> String {
    format!("{handle}:{post_id}")
}

/// Injected store abstraction. Implementations must persist on every `set`
/// so a crash loses at most the post being processed.
pub trait DedupStore: Send {
    fn get(&self, key: &str) -> bool;
    fn set(&mut self, key: &str) -> Result<()>;
    fn flush(&self) -> Result<()>;
}

/// Registry persisted as a single JSON object (`"<handle>:<id>": true`),
/// rewritten in full on every mutation. Append-only and unbounded; growth
/// is a known long-run characteristic.
pub struct FileDedupStore {
    path: PathBuf,
    delivered: HashMap<String, bool>,
}

impl FileDedupStore {
    /// A missing file starts an empty registry. An unreadable or corrupt
    /// file is a hard error: starting empty would re-deliver all history.
    pub fn open(path: &Path) -> Result<Self> {
        let delivered = match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json)
                .with_context(|| format!("corrupt dedup store at {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("unreadable dedup store at {}", path.display()))
            }
        };

        info!(
            path = %path.display(),
            entries = delivered.len(),
            "Dedup store opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            delivered,
        })
    }
}

impl DedupStore for FileDedupStore {
    fn get(&self, key: &str) -> bool {
        self.delivered.get(key).copied().unwrap_or(false)
    }

    fn set(&mut self, key: &str) -> Result<()> {
        self.delivered.insert(key.to_string(), true);
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.delivered)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write dedup store at {}", self.path.display()))
    }
}
