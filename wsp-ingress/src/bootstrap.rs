//! One-time initialisation of the proxy's configuration tree.

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::control_api::{get_config_json, ConfigPaths, ControlPlane};
use crate::error::{IngressError, Result};

pub struct Bootstrapper<'a> {
    plane: &'a dyn ControlPlane,
    paths: ConfigPaths,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(plane: &'a dyn ControlPlane, paths: ConfigPaths) -> Self {
        Self { plane, paths }
    }

    /// Reset routes, listen addresses, certificate loads and TLS policies.
    ///
    /// Refuses with [`IngressError::AlreadyInitialized`] when routes exist,
    /// unless `force` is set. Writes happen in order and stop at the first
    /// failure.
    pub fn init_control_plane(&self, listen: &[String], force: bool) -> Result<()> {
        let existing: Vec<Value> = get_config_json(self.plane, &self.paths.routes())
            .map_err(|e| e.during("inspect", "routes"))?;
        if !existing.is_empty() {
            if !force {
                return Err(IngressError::AlreadyInitialized {
                    routes: existing.len(),
                });
            }
            info!(routes = existing.len(), "Discarding existing routes");
        }

        let steps = [
            (self.paths.routes(), json!([])),
            (self.paths.listen(), Value::from(listen.to_vec())),
            (self.paths.tls_load_files(), json!([])),
            (self.paths.tls_connection_policies(), json!([])),
        ];
        for (path, payload) in &steps {
            self.replace(path, payload)
                .map_err(|e| e.during("initialize", path.as_str()))?;
        }

        info!(listen = ?listen, "Control plane initialized");
        Ok(())
    }

    /// Create the value, or replace it when the key already exists.
    fn replace(&self, path: &str, payload: &Value) -> Result<()> {
        match self.plane.put(path, payload) {
            Ok(_) => Ok(()),
            Err(e) if e.status_code() == Some(409) => {
                debug!(path = %path, "Key exists, replacing");
                self.plane.patch(path, payload).map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}
