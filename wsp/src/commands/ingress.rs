//! Ingress command handlers
//!
//! Thin wrappers over `wsp_ingress::client_ops` that attach the command name
//! to any error.

use tracing::debug;
use wsp_ingress::client_ops::{self, IngressContext, InitOptions, RegisterOptions};

use crate::cli::IngressSubcommand;
use crate::error::{WspError, WspResult};

/// Handle `wsp ingress` commands
pub fn handle_ingress_command(command: &IngressSubcommand, admin_url: Option<&str>) -> WspResult<()> {
    let mut ctx = IngressContext::load(admin_url).map_err(|e| WspError::ingress(e, "setup"))?;
    debug!(admin_url = %ctx.client.base_url(), "Ingress context loaded");

    match command {
        IngressSubcommand::Init {
            domain,
            verbose,
            force,
            skip_start,
        } => {
            let opts = InitOptions {
                domain: domain.clone(),
                verbose: *verbose,
                force: *force,
                skip_start: *skip_start,
            };
            client_ops::init_ingress(&mut ctx, &opts).map_err(|e| WspError::ingress(e, "init"))
        }
        IngressSubcommand::AddRoute { hostname, upstream } => {
            client_ops::add_route(&ctx, hostname, upstream)
                .map_err(|e| WspError::ingress(e, "add-route"))
        }
        IngressSubcommand::RemoveRoute { hostname } => client_ops::remove_route(&ctx, hostname)
            .map_err(|e| WspError::ingress(e, "remove-route")),
        IngressSubcommand::ListRoutes { json } => {
            client_ops::list_routes(&ctx, *json).map_err(|e| WspError::ingress(e, "list-routes"))
        }
        IngressSubcommand::Register {
            workspace,
            domain,
            editor,
            services,
            tls,
        } => {
            let opts = RegisterOptions {
                domain: domain.clone(),
                editor: *editor,
                services: services.clone(),
                tls: *tls,
            };
            client_ops::register_workspace(&ctx, workspace, &opts)
                .map_err(|e| WspError::ingress(e, "register"))
        }
        IngressSubcommand::Unregister { workspace, legacy } => {
            client_ops::unregister_workspace(&ctx, workspace, *legacy)
                .map_err(|e| WspError::ingress(e, "unregister"))
        }
        IngressSubcommand::Cleanup { legacy } => {
            client_ops::cleanup(&ctx, *legacy).map_err(|e| WspError::ingress(e, "cleanup"))
        }
        IngressSubcommand::ListWorkspaces => {
            client_ops::list_workspaces(&ctx).map_err(|e| WspError::ingress(e, "list-workspaces"))
        }
    }
}
