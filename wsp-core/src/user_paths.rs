//! On-disk layout of the wsp configuration directory.
//!
//! Everything wsp writes lives under one root:
//!
//! ```text
//! ~/.config/wsp/                     ($WSP_CONFIG_DIR overrides)
//! ├── ingress.yaml                   ingress settings
//! ├── ingress/
//! │   ├── Caddyfile
//! │   ├── docker-compose.yml
//! │   ├── certs/
//! │   ├── ownership.json             workspace → route/TLS ids
//! │   └── ingress.lock               advisory write lock
//! └── workspaces/<name>/metadata.yaml
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable that relocates the whole configuration tree.
pub const CONFIG_DIR_ENV: &str = "WSP_CONFIG_DIR";

/// Get the user's home directory.
#[must_use = "home directory path should be used"]
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Could not determine home directory")
}

/// Get the wsp configuration directory.
///
/// Returns `$WSP_CONFIG_DIR` when set, otherwise `~/.config/wsp`.
#[must_use = "configuration directory path should be used"]
pub fn user_config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    Ok(home_dir()?.join(".config").join("wsp"))
}

/// Directory holding the ingress proxy's generated files and local state.
pub fn ingress_dir() -> Result<PathBuf> {
    Ok(user_config_dir()?.join("ingress"))
}

/// Path of the ingress settings file.
pub fn ingress_settings_path() -> Result<PathBuf> {
    Ok(user_config_dir()?.join("ingress.yaml"))
}

/// Path of the workspace ownership index.
pub fn ownership_index_path() -> Result<PathBuf> {
    Ok(ingress_dir()?.join("ownership.json"))
}

/// Path of the advisory lock taken around multi-request writes.
pub fn ingress_lock_path() -> Result<PathBuf> {
    Ok(ingress_dir()?.join("ingress.lock"))
}

pub fn workspaces_dir() -> Result<PathBuf> {
    Ok(user_config_dir()?.join("workspaces"))
}
