//! Read-only access to a workspace's `metadata.yaml`.
//!
//! The file is written when a workspace is created. Ingress teardown reads
//! only the `domain` field; other keys are ignored.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WspError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMetadata {
    #[serde(default)]
    pub domain: String,
}

impl WorkspaceMetadata {
    /// Parse metadata from a file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WspError::NotFound(format!("workspace metadata at {}", path.display()))
            } else {
                WspError::Filesystem(format!("Failed to read {}: {}", path.display(), e))
            }
        })?;
        let metadata: WorkspaceMetadata = serde_yaml_ng::from_str(&content)?;
        Ok(metadata)
    }

    /// The workspace domain, if one was recorded.
    pub fn domain(&self) -> Option<&str> {
        let domain = self.domain.trim();
        (!domain.is_empty()).then_some(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_metadata_ignores_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.yaml");
        fs::write(
            &path,
            "domain: example.com\neditor-url: https://alpha-editor.example.com\ngitops-url: https://alpha-gitops.example.com\ngitops-secret: s3cret\nmqtt_username: 1000\n",
        )
        .unwrap();

        let metadata = WorkspaceMetadata::load_from(&path).unwrap();
        assert_eq!(metadata.domain(), Some("example.com"));
    }

    #[test]
    fn test_missing_metadata_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = WorkspaceMetadata::load_from(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, WspError::NotFound(_)));
    }

    #[test]
    fn test_blank_domain_is_none() {
        let metadata = WorkspaceMetadata {
            domain: "  ".to_string(),
        };
        assert_eq!(metadata.domain(), None);
    }
}
