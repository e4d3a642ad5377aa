//! Workspace-level ingress: the set of hostnames a workspace exposes, kept
//! in step with the proxy across register, re-register and teardown.
//!
//! Every multi-request write runs under the ingress lock. Ownership is
//! recorded in the local index so teardown removes exactly what register
//! created; workspaces registered before the index existed are torn down by
//! naming convention instead.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, info_span, warn};
use wsp_core::user_paths;
use wsp_core::validation::validate_workspace_name;
use wsp_core::workspace::WorkspaceMetadata;

use crate::bootstrap::Bootstrapper;
use crate::config::IngressSettings;
use crate::control_api::{ConfigPaths, ControlPlane};
use crate::error::{validation_reason, IngressError, Result};
use crate::ownership::{IndexStore, IngressLock, OwnedRoute, OwnershipIndex, WorkspaceRecord};
use crate::routes::{build_route, legacy_route_id, normalize_hostname, route_id, RouteManager};
use crate::tls::{legacy_tls_ids, tls_ids, TlsManager};
use crate::types::{FailedRemoval, Route, RouteSummary, TeardownReport};

pub const MAIN_SERVICE: &str = "gitops";
pub const EDITOR_SERVICE: &str = "editor";
pub const GITOPS_PORT: u16 = 8079;
pub const EDITOR_PORT: u16 = 9999;

/// Services every workspace is assumed to have when no record exists.
pub const DEFAULT_SERVICES: [&str; 2] = [MAIN_SERVICE, EDITOR_SERVICE];

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoute {
    pub name: String,
    pub upstream: String,
}

/// The services a workspace exposes through the ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceServices {
    pub main: ServiceRoute,
    pub editor: Option<ServiceRoute>,
    pub extra: Vec<ServiceRoute>,
}

impl WorkspaceServices {
    /// The gitops service, plus the editor when `editor` is set.
    pub fn new(workspace: &str, editor: bool) -> Self {
        Self {
            main: ServiceRoute {
                name: MAIN_SERVICE.to_string(),
                upstream: format!("{}-{}:{}", workspace, MAIN_SERVICE, GITOPS_PORT),
            },
            editor: editor.then(|| ServiceRoute {
                name: EDITOR_SERVICE.to_string(),
                upstream: format!("{}-{}:{}", workspace, EDITOR_SERVICE, EDITOR_PORT),
            }),
            extra: Vec::new(),
        }
    }

    pub fn with_service(mut self, name: impl Into<String>, upstream: impl Into<String>) -> Self {
        self.extra.push(ServiceRoute {
            name: name.into(),
            upstream: upstream.into(),
        });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceRoute> {
        std::iter::once(&self.main)
            .chain(self.editor.iter())
            .chain(self.extra.iter())
    }
}

/// `<workspace>-<service>.<domain>`
pub fn service_hostname(workspace: &str, service: &str, domain: &str) -> String {
    format!("{}-{}.{}", workspace, service, domain)
}

pub fn validate_workspace(workspace: &str) -> Result<()> {
    validate_workspace_name(workspace).map_err(|e| IngressError::InvalidWorkspace {
        name: workspace.to_string(),
        reason: validation_reason(e),
    })
}

/// Local files the lifecycle reads and writes.
#[derive(Debug, Clone)]
pub struct IngressFiles {
    pub index_path: PathBuf,
    pub lock_path: PathBuf,
    pub workspaces_dir: PathBuf,
    pub lock_timeout: Duration,
}

impl IngressFiles {
    /// Paths under the user's wsp configuration directory.
    pub fn from_user_config() -> Result<Self> {
        Ok(Self {
            index_path: user_paths::ownership_index_path()
                .map_err(|e| IngressError::Config(e.to_string()))?,
            lock_path: user_paths::ingress_lock_path()
                .map_err(|e| IngressError::Config(e.to_string()))?,
            workspaces_dir: user_paths::workspaces_dir()
                .map_err(|e| IngressError::Config(e.to_string()))?,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// The same layout rooted at `root`.
    pub fn in_dir(root: &Path) -> Self {
        let ingress = root.join("ingress");
        Self {
            index_path: ingress.join("ownership.json"),
            lock_path: ingress.join("ingress.lock"),
            workspaces_dir: root.join("workspaces"),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    fn metadata_path(&self, workspace: &str) -> PathBuf {
        self.workspaces_dir.join(workspace).join("metadata.yaml")
    }
}

pub struct WorkspaceIngress<'a> {
    plane: &'a dyn ControlPlane,
    paths: ConfigPaths,
    tls_dir: String,
    files: IngressFiles,
    index: IndexStore,
}

impl<'a> WorkspaceIngress<'a> {
    pub fn new(plane: &'a dyn ControlPlane, settings: &IngressSettings, files: IngressFiles) -> Self {
        Self {
            plane,
            paths: ConfigPaths::new(settings.server_name.clone()),
            tls_dir: settings.tls_dir.clone(),
            index: IndexStore::new(files.index_path.clone()),
            files,
        }
    }

    pub fn routes(&self) -> RouteManager<'a> {
        RouteManager::new(self.plane, self.paths.clone())
    }

    pub fn tls(&self) -> TlsManager<'a> {
        TlsManager::new(self.plane, self.paths.clone(), self.tls_dir.clone())
    }

    fn lock(&self) -> Result<IngressLock> {
        IngressLock::acquire(&self.files.lock_path, self.files.lock_timeout)
    }

    /// Initialise the proxy's config tree and forget all recorded ownership.
    pub fn bootstrap(&self, listen: &[String], force: bool) -> Result<()> {
        let _lock = self.lock()?;
        Bootstrapper::new(self.plane, self.paths.clone()).init_control_plane(listen, force)?;
        self.index.save(&OwnershipIndex::default())?;
        Ok(())
    }

    /// Ad-hoc route not owned by any workspace.
    pub fn add_route(&self, hostname: &str, upstream: &str) -> Result<Route> {
        let _lock = self.lock()?;
        self.routes().add_route(hostname, upstream)
    }

    pub fn remove_route(&self, hostname: &str) -> Result<String> {
        let _lock = self.lock()?;
        self.routes().remove_route(hostname)
    }

    pub fn list_routes(&self) -> Result<Vec<RouteSummary>> {
        self.routes().list_routes()
    }

    pub fn list_workspaces(&self) -> Result<Vec<(String, WorkspaceRecord)>> {
        Ok(self.index.load()?.workspaces.into_iter().collect())
    }

    /// Create or update every route of a workspace, and optionally its TLS
    /// objects, then record them.
    ///
    /// Input is validated before anything is sent. Writes stop at the first
    /// failure; whatever was created up to that point is still recorded so
    /// teardown can find it. Routes from an earlier registration that are no
    /// longer requested are removed. A hostname already recorded under another
    /// workspace is refused before any write.
    pub fn register(
        &self,
        workspace: &str,
        domain: &str,
        services: &WorkspaceServices,
        install_tls: bool,
    ) -> Result<WorkspaceRecord> {
        validate_workspace(workspace)?;
        let domain = normalize_hostname(domain)?;
        let span = info_span!("register", workspace = %workspace, domain = %domain);
        let _enter = span.enter();

        let mut planned = Vec::new();
        let mut seen = HashSet::new();
        for service in services.iter() {
            if !seen.insert(service.name.as_str()) {
                return Err(IngressError::Config(format!(
                    "service '{}' is listed more than once",
                    service.name
                )));
            }
            let hostname = service_hostname(workspace, &service.name, &domain);
            planned.push((build_route(&hostname, &service.upstream)?, service));
        }

        let _lock = self.lock()?;
        let mut index = self.index.load()?;
        let previous = index.workspaces.remove(workspace);
        let foreign = foreign_owners(&index);
        for (route, _) in &planned {
            if let Some(owner) = route.id.as_deref().and_then(|id| foreign.get(id)) {
                return Err(IngressError::RouteOwned {
                    hostname: route.hosts().join(","),
                    owner: owner.to_string(),
                });
            }
        }
        let mut record = WorkspaceRecord::new(&domain);
        record.tls = previous.as_ref().and_then(|p| p.tls.clone());

        let routes = self.routes();
        for (route, service) in planned {
            let hostname = route.hosts().join(",");
            match routes.add_route(&hostname, &service.upstream) {
                Ok(added) => record.routes.push(OwnedRoute {
                    id: added.id.unwrap_or_default(),
                    hostname,
                    upstream: service.upstream.clone(),
                }),
                Err(e) => {
                    keep_unreplaced(&mut record, previous.as_ref());
                    self.store_record(workspace, record)?;
                    return Err(e.during("register workspace", workspace));
                }
            }
        }

        if let Some(previous) = &previous {
            let current: HashSet<&str> = record.routes.iter().map(|r| r.id.as_str()).collect();
            let stale: Vec<OwnedRoute> = previous
                .routes
                .iter()
                .filter(|r| !current.contains(r.id.as_str()))
                .cloned()
                .collect();
            for route in stale {
                match routes.remove_route_id(&route.id) {
                    Ok(()) => debug!(route_id = %route.id, "Removed stale route"),
                    Err(e) => {
                        warn!(route_id = %route.id, error = %e, "Failed to remove stale route");
                        record.routes.push(route);
                    }
                }
            }
        }

        if install_tls {
            match self.tls().install_certs(workspace, &domain) {
                Ok(ids) => record.tls = Some(ids),
                Err(e) => {
                    self.store_record(workspace, record)?;
                    return Err(e.during("register workspace", workspace));
                }
            }
        } else if let Some(ids) = record.tls.take() {
            let report = self.tls().uninstall_ids(&ids);
            if !report.is_clean() {
                record.tls = Some(ids);
            }
        }

        self.store_record(workspace, record.clone())?;
        info!(routes = record.routes.len(), tls = record.tls.is_some(), "Workspace registered");
        Ok(record)
    }

    /// Remove a workspace's routes and TLS objects.
    ///
    /// Individual failures are logged and reported, never fatal. Ids that
    /// could not be removed stay recorded so a later call can retry them.
    /// With `legacy`, ids from earlier naming schemes are removed as well.
    pub fn unregister(&self, workspace: &str, legacy: bool) -> Result<TeardownReport> {
        validate_workspace(workspace)?;
        let span = info_span!("unregister", workspace = %workspace);
        let _enter = span.enter();

        let _lock = self.lock()?;
        let mut index = self.index.load()?;
        let record = index.workspaces.remove(workspace);
        let foreign = foreign_owners(&index);

        let (domain, route_ids, services) = match &record {
            Some(record) => (
                Some(record.domain.clone()),
                record.routes.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
                recorded_services(workspace, record),
            ),
            None => {
                let domain = self.metadata_domain(workspace);
                let services: Vec<String> = DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect();
                let ids: Vec<String> = domain
                    .as_deref()
                    .map(|domain| {
                        services
                            .iter()
                            .filter_map(|s| route_id(&service_hostname(workspace, s, domain)).ok())
                            .filter(|id| !foreign.contains_key(id))
                            .collect()
                    })
                    .unwrap_or_default();
                (domain, ids, services)
            }
        };

        let mut report = self.remove_ids(&route_ids);
        let tls = record
            .as_ref()
            .and_then(|r| r.tls.clone())
            .unwrap_or_else(|| tls_ids(workspace));
        let tls_report = self.tls().uninstall_ids(&tls);

        if legacy {
            let mut legacy_ids = Vec::new();
            for service in &services {
                if let Some(domain) = &domain {
                    legacy_ids.push(legacy_route_id(&service_hostname(workspace, service, domain)));
                }
                legacy_ids.push(format!("{}_{}", workspace, service));
            }
            let old_tls = legacy_tls_ids(workspace);
            legacy_ids.push(old_tls.policy);
            legacy_ids.push(old_tls.certs);
            legacy_ids.retain(|id| !foreign.contains_key(id));
            report.merge(self.remove_ids(&legacy_ids));
        }

        self.index.update(|index| {
            let failed: HashSet<&str> = report.failed.iter().map(|f| f.id.as_str()).collect();
            match record {
                Some(mut record) => {
                    record.routes.retain(|r| failed.contains(r.id.as_str()));
                    if !tls_report.is_clean() {
                        record.tls = Some(tls.clone());
                    } else {
                        record.tls = None;
                    }
                    if record.routes.is_empty() && record.tls.is_none() {
                        index.workspaces.remove(workspace);
                    } else {
                        index.workspaces.insert(workspace.to_string(), record);
                    }
                }
                None => {
                    index.workspaces.remove(workspace);
                }
            }
        })?;

        report.merge(tls_report);
        info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Workspace unregistered"
        );
        Ok(report)
    }

    /// Unregister every workspace in the index.
    pub fn cleanup_all(&self, legacy: bool) -> Result<Vec<(String, TeardownReport)>> {
        let names: Vec<String> = self.index.load()?.workspaces.into_keys().collect();
        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            let report = self.unregister(&name, legacy)?;
            reports.push((name, report));
        }
        Ok(reports)
    }

    fn remove_ids(&self, ids: &[String]) -> TeardownReport {
        let mut report = TeardownReport::default();
        for id in ids {
            match self.plane.delete_id(id) {
                Ok(()) => report.removed.push(id.clone()),
                Err(e) => {
                    warn!(id = %id, error = %e, "Failed to remove route");
                    report.failed.push(FailedRemoval {
                        id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    fn metadata_domain(&self, workspace: &str) -> Option<String> {
        let path = self.files.metadata_path(workspace);
        match WorkspaceMetadata::load_from(&path) {
            Ok(metadata) => metadata.domain().map(str::to_string),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "No domain for workspace, skipping its routes");
                None
            }
        }
    }

    fn store_record(&self, workspace: &str, mut record: WorkspaceRecord) -> Result<()> {
        record.updated_at = chrono::Utc::now();
        self.index.update(|index| {
            index.workspaces.insert(workspace.to_string(), record);
        })
    }
}

/// Route id to owning workspace, for every record left in `index`.
fn foreign_owners(index: &OwnershipIndex) -> HashMap<String, String> {
    index
        .workspaces
        .iter()
        .flat_map(|(name, record)| record.routes.iter().map(move |r| (r.id.clone(), name.clone())))
        .collect()
}

/// After a partial re-registration, keep earlier routes that were not
/// replaced; they are still on the proxy.
fn keep_unreplaced(record: &mut WorkspaceRecord, previous: Option<&WorkspaceRecord>) {
    let Some(previous) = previous else {
        return;
    };
    for route in &previous.routes {
        if !record.routes.iter().any(|r| r.id == route.id) {
            record.routes.push(route.clone());
        }
    }
}

/// Service names recovered from recorded hostnames, plus the defaults.
fn recorded_services(workspace: &str, record: &WorkspaceRecord) -> Vec<String> {
    let prefix = format!("{}-", workspace);
    let suffix = format!(".{}", record.domain);
    let mut services: Vec<String> = DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect();
    for route in &record.routes {
        let service = route
            .hostname
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(&suffix));
        if let Some(service) = service {
            if !services.iter().any(|s| s == service) {
                services.push(service.to_string());
            }
        }
    }
    services
}
