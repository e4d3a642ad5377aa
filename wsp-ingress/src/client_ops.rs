//! Operations behind the `wsp ingress` subcommands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;
use tracing::debug;
use wsp_core::{user_paths, wsp_error, wsp_info, wsp_println, wsp_progress, wsp_warning};
use wsp_messages::{msg, MESSAGES};

use crate::config::{write_config_files, IngressSettings};
use crate::control_api::ControlApiClient;
use crate::error::{IngressError, Result};
use crate::lifecycle::{IngressFiles, WorkspaceIngress, WorkspaceServices};
use crate::routes::normalize_hostname;
use crate::server::{start_ingress, wait_for_admin};
use crate::types::{RouteShape, RouteSummary, TeardownReport};

/// Settings, file locations and the API client for one CLI invocation.
pub struct IngressContext {
    pub settings: IngressSettings,
    pub settings_path: PathBuf,
    pub ingress_dir: PathBuf,
    pub files: IngressFiles,
    pub client: ControlApiClient,
}

impl IngressContext {
    /// Load settings from the user config directory, applying an optional
    /// admin URL override.
    pub fn load(admin_url: Option<&str>) -> Result<Self> {
        Self::build(
            user_paths::ingress_settings_path().map_err(|e| IngressError::Config(e.to_string()))?,
            user_paths::ingress_dir().map_err(|e| IngressError::Config(e.to_string()))?,
            IngressFiles::from_user_config()?,
            admin_url,
        )
    }

    /// Same layout as [`IngressContext::load`] rooted at `root`.
    pub fn in_dir(root: &Path, admin_url: Option<&str>) -> Result<Self> {
        Self::build(
            root.join("ingress.yaml"),
            root.join("ingress"),
            IngressFiles::in_dir(root),
            admin_url,
        )
    }

    fn build(
        settings_path: PathBuf,
        ingress_dir: PathBuf,
        files: IngressFiles,
        admin_url: Option<&str>,
    ) -> Result<Self> {
        let mut settings = IngressSettings::load_or_default(&settings_path)?;
        if let Some(url) = admin_url {
            settings.admin_url = url.to_string();
            settings.validate()?;
        }
        let client = ControlApiClient::from_settings(&settings)?;
        Ok(Self {
            settings,
            settings_path,
            ingress_dir,
            files,
            client,
        })
    }

    pub fn ingress(&self) -> WorkspaceIngress<'_> {
        WorkspaceIngress::new(&self.client, &self.settings, self.files.clone())
    }
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub domain: String,
    pub verbose: bool,
    pub force: bool,
    pub skip_start: bool,
}

/// Generate the proxy's files, start it, and reset its routing table.
///
/// The domain is saved to the settings file only after the reset succeeds.
pub fn init_ingress(ctx: &mut IngressContext, opts: &InitOptions) -> Result<()> {
    let domain = normalize_hostname(&opts.domain)?;
    wsp_println!("{}", msg!(MESSAGES.ingress.init_header, domain = &domain));

    for path in write_config_files(&ctx.settings, &ctx.ingress_dir)? {
        wsp_println!(
            "{}",
            msg!(MESSAGES.ingress.init_file_written, path = path.display().to_string())
        );
    }

    if opts.skip_start {
        wsp_println!("{}", MESSAGES.ingress.init_skip_start);
    } else {
        wsp_progress!(
            "{}",
            msg!(
                MESSAGES.ingress.init_starting,
                project = &ctx.settings.compose_project
            )
        );
        start_ingress(&ctx.settings, &ctx.ingress_dir, opts.verbose)?;
        wsp_println!(
            "{}",
            msg!(MESSAGES.ingress.init_waiting, url = ctx.client.base_url())
        );
        wait_for_admin(
            &ctx.client,
            Duration::from_secs(ctx.settings.ready_timeout_secs),
        )?;
    }

    match ctx.ingress().bootstrap(&ctx.settings.listen, opts.force) {
        Ok(()) => {}
        Err(IngressError::AlreadyInitialized { routes }) => {
            wsp_error!(
                "{}",
                msg!(
                    MESSAGES.ingress.init_already_initialized,
                    routes = routes.to_string()
                )
            );
            wsp_println!("{}", MESSAGES.ingress.init_force_hint);
            return Err(IngressError::AlreadyInitialized { routes });
        }
        Err(e) => return Err(e),
    }

    // Only a successful reset changes the domain `register` falls back to.
    ctx.settings.domain = Some(domain);
    ctx.settings.save(&ctx.settings_path)?;
    wsp_println!(
        "{}",
        msg!(
            MESSAGES.ingress.init_file_written,
            path = ctx.settings_path.display().to_string()
        )
    );
    wsp_println!("{}", MESSAGES.ingress.init_reset_routes);
    wsp_println!(
        "{}",
        msg!(MESSAGES.ingress.init_success, url = ctx.client.base_url())
    );
    Ok(())
}

pub fn add_route(ctx: &IngressContext, hostname: &str, upstream: &str) -> Result<()> {
    let route = ctx.ingress().add_route(hostname, upstream)?;
    wsp_println!(
        "{}",
        msg!(
            MESSAGES.ingress.route_added,
            hostname = route.hosts().join(", "),
            upstream = upstream
        )
    );
    Ok(())
}

pub fn remove_route(ctx: &IngressContext, hostname: &str) -> Result<()> {
    ctx.ingress().remove_route(hostname)?;
    wsp_println!(
        "{}",
        msg!(MESSAGES.ingress.route_removed, hostname = hostname)
    );
    Ok(())
}

pub fn list_routes(ctx: &IngressContext, json: bool) -> Result<()> {
    let routes = ctx.ingress().list_routes()?;

    if json {
        let out = serde_json::to_string_pretty(&routes).map_err(|source| IngressError::Encode {
            what: "route list".to_string(),
            source,
        })?;
        wsp_println!("{}", out);
        return Ok(());
    }

    if routes.is_empty() {
        wsp_println!("{}", MESSAGES.ingress.routes_none);
        return Ok(());
    }

    wsp_println!(
        "{}",
        msg!(MESSAGES.ingress.routes_found, count = routes.len().to_string())
    );
    for route in &routes {
        print_route(route);
    }
    Ok(())
}

fn print_route(route: &RouteSummary) {
    wsp_println!();
    wsp_println!(
        "Route ID: {}",
        route.id.as_deref().unwrap_or("-").bright_cyan()
    );
    wsp_println!("  Hostname: {}", route.hosts.join(", "));
    match route.shape {
        RouteShape::ReverseProxy => {
            wsp_println!("  Upstream: {}", route.upstreams.join(", ").bright_green())
        }
        RouteShape::Unrecognised => {
            wsp_println!("  Upstream: {}", MESSAGES.ingress.route_unrecognised.yellow())
        }
    }
    wsp_println!("  Terminal: {}", route.terminal);
}

#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub domain: Option<String>,
    pub editor: bool,
    /// `(name, upstream)` pairs for services beyond gitops/editor.
    pub services: Vec<(String, String)>,
    pub tls: bool,
}

pub fn register_workspace(ctx: &IngressContext, workspace: &str, opts: &RegisterOptions) -> Result<()> {
    let domain = opts
        .domain
        .clone()
        .or_else(|| ctx.settings.domain.clone())
        .ok_or_else(|| {
            IngressError::Config("no domain given and none recorded by 'ingress init'".to_string())
        })?;

    let mut services = WorkspaceServices::new(workspace, opts.editor);
    for (name, upstream) in &opts.services {
        services = services.with_service(name.clone(), upstream.clone());
    }

    if opts.tls {
        let cert = ctx
            .ingress_dir
            .join("certs")
            .join(&domain)
            .join("full-chain.pem");
        if !cert.exists() {
            wsp_warning!(
                "{}",
                msg!(
                    MESSAGES.ingress.register_cert_missing,
                    path = cert.display().to_string()
                )
            );
        }
    }

    wsp_println!(
        "{}",
        msg!(MESSAGES.ingress.register_header, workspace = workspace)
    );
    let record = ctx.ingress().register(workspace, &domain, &services, opts.tls)?;
    for route in &record.routes {
        wsp_println!(
            "{}",
            msg!(
                MESSAGES.ingress.register_route,
                hostname = &route.hostname,
                upstream = &route.upstream
            )
        );
    }
    if record.tls.is_some() {
        wsp_println!(
            "{}",
            msg!(MESSAGES.ingress.register_tls, domain = &record.domain)
        );
    }
    wsp_println!(
        "{}",
        msg!(MESSAGES.ingress.register_success, workspace = workspace)
    );
    Ok(())
}

pub fn unregister_workspace(ctx: &IngressContext, workspace: &str, legacy: bool) -> Result<()> {
    let ingress = ctx.ingress();
    let known = ingress
        .list_workspaces()?
        .iter()
        .any(|(name, _)| name == workspace);

    wsp_println!(
        "{}",
        msg!(MESSAGES.ingress.unregister_header, workspace = workspace)
    );
    if !known {
        wsp_info!(
            "{}",
            msg!(MESSAGES.ingress.unregister_fallback, workspace = workspace)
        );
    }

    let report = ingress.unregister(workspace, legacy)?;
    print_teardown(workspace, &report);
    Ok(())
}

fn print_teardown(workspace: &str, report: &TeardownReport) {
    for id in &report.removed {
        debug!(id = %id, "Removed");
        wsp_println!("{}", msg!(MESSAGES.ingress.unregister_removed, id = id));
    }
    for failure in &report.failed {
        wsp_println!(
            "{}",
            msg!(
                MESSAGES.ingress.unregister_failed,
                id = &failure.id,
                error = &failure.error
            )
        );
    }
    if report.is_clean() {
        wsp_println!(
            "{}",
            msg!(MESSAGES.ingress.unregister_success, workspace = workspace)
        );
    } else {
        wsp_println!(
            "{}",
            msg!(
                MESSAGES.ingress.unregister_partial,
                workspace = workspace,
                count = report.failed.len().to_string()
            )
        );
    }
}

pub fn cleanup(ctx: &IngressContext, legacy: bool) -> Result<()> {
    let reports = ctx.ingress().cleanup_all(legacy)?;
    if reports.is_empty() {
        wsp_println!("{}", MESSAGES.ingress.workspaces_none);
        return Ok(());
    }
    for (workspace, report) in &reports {
        wsp_println!(
            "{}",
            msg!(MESSAGES.ingress.unregister_header, workspace = workspace)
        );
        print_teardown(workspace, report);
    }
    wsp_println!(
        "{}",
        msg!(MESSAGES.ingress.cleanup_complete, count = reports.len().to_string())
    );
    Ok(())
}

pub fn list_workspaces(ctx: &IngressContext) -> Result<()> {
    let workspaces = ctx.ingress().list_workspaces()?;
    if workspaces.is_empty() {
        wsp_println!("{}", MESSAGES.ingress.workspaces_none);
        return Ok(());
    }

    wsp_println!("{}", MESSAGES.ingress.workspaces_header);
    for (name, record) in &workspaces {
        let tls = if record.tls.is_some() { " (tls)" } else { "" };
        wsp_println!(
            "  {}  {}  {} route(s){}",
            name.bright_cyan(),
            record.domain,
            record.routes.len(),
            tls
        );
        for route in &record.routes {
            wsp_println!("      {} → {}", route.hostname, route.upstream);
        }
    }
    Ok(())
}
