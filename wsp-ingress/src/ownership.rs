//! Local record of which workspace owns which proxy objects.
//!
//! The proxy has no notion of ownership, so every workspace registration is
//! recorded in `ownership.json`. Teardown removes exactly the recorded ids.
//! Writers serialize on an advisory lock file.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IngressError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedRoute {
    pub id: String,
    pub hostname: String,
    pub upstream: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsIds {
    pub certs: String,
    pub policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub domain: String,
    #[serde(default)]
    pub routes: Vec<OwnedRoute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsIds>,
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceRecord {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            routes: Vec::new(),
            tls: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipIndex {
    #[serde(default)]
    pub workspaces: BTreeMap<String, WorkspaceRecord>,
}

/// JSON file holding the [`OwnershipIndex`].
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<OwnershipIndex> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(OwnershipIndex::default()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(OwnershipIndex::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            IngressError::Config(format!(
                "failed to parse ownership index {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Write the index through a temporary file and rename.
    pub fn save(&self, index: &OwnershipIndex) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(index).map_err(|source| IngressError::Encode {
            what: "ownership index".to_string(),
            source,
        })?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Load, modify and save the index.
    pub fn update<F, T>(&self, update_fn: F) -> Result<T>
    where
        F: FnOnce(&mut OwnershipIndex) -> T,
    {
        let mut index = self.load()?;
        let out = update_fn(&mut index);
        self.save(&index)?;
        Ok(out)
    }
}

const LOCK_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Exclusive advisory lock held for the lifetime of the value.
#[derive(Debug)]
pub struct IngressLock {
    file: File,
    path: PathBuf,
}

impl IngressLock {
    /// Acquire the lock, waiting up to `timeout` for other holders.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| IngressError::Lock(format!("failed to open {}: {}", path.display(), e)))?;

        let start = Instant::now();
        let mut attempts = 0u32;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) => {
                    attempts += 1;
                    if start.elapsed() >= timeout {
                        return Err(IngressError::Lock(format!(
                            "timed out after {} attempts waiting for {}: {}",
                            attempts,
                            path.display(),
                            e
                        )));
                    }
                    thread::sleep(LOCK_RETRY_DELAY);
                }
            }
        }

        debug!(path = %path.display(), attempts, "Acquired ingress lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for IngressLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), error = %e, "Failed to release ingress lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_index_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path().join("ownership.json"));
        assert!(store.load().unwrap().workspaces.is_empty());
    }

    #[test]
    fn test_update_persists() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path().join("ingress").join("ownership.json"));

        store
            .update(|index| {
                let mut record = WorkspaceRecord::new("example.com");
                record.routes.push(OwnedRoute {
                    id: "route_alpha-gitops_example_com".into(),
                    hostname: "alpha-gitops.example.com".into(),
                    upstream: "alpha-gitops:8079".into(),
                });
                index.workspaces.insert("alpha".into(), record);
            })
            .unwrap();

        let index = store.load().unwrap();
        let record = &index.workspaces["alpha"];
        assert_eq!(record.domain, "example.com");
        assert_eq!(record.routes.len(), 1);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_index_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ownership.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            IndexStore::new(&path).load(),
            Err(IngressError::Config(_))
        ));
    }

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ingress.lock");

        let held = IngressLock::acquire(&path, Duration::from_secs(1)).unwrap();
        let err = IngressLock::acquire(&path, Duration::from_millis(120)).unwrap_err();
        assert!(matches!(err, IngressError::Lock(_)));

        drop(held);
        assert!(IngressLock::acquire(&path, Duration::from_millis(120)).is_ok());
    }
}
