// CLI argument parsing and definitions

use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "wsp")]
#[command(about = "Workspace provisioner: routes workspace hostnames through a shared ingress")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Control API base URL (overrides ingress.yaml)
    #[arg(long, global = true)]
    pub admin_url: Option<String>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Manage the shared ingress proxy
    Ingress {
        #[command(subcommand)]
        command: IngressSubcommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum IngressSubcommand {
    /// Generate proxy files, start the container and reset its routing table
    Init {
        /// Base domain workspaces are served under
        #[arg(long)]
        domain: String,
        /// Show docker compose output
        #[arg(short, long)]
        verbose: bool,
        /// Reset the routing table even if routes exist
        #[arg(long)]
        force: bool,
        /// Only write files and configure an already running proxy
        #[arg(long)]
        skip_start: bool,
    },
    /// Route a hostname to an upstream (replaces any existing route)
    AddRoute {
        hostname: String,
        /// host:port reachable from the proxy container
        upstream: String,
    },
    /// Remove the route for a hostname
    RemoveRoute { hostname: String },
    /// List all routes
    ListRoutes {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Route a workspace's services through the ingress
    Register {
        workspace: String,
        /// Domain for the workspace hostnames (defaults to the one given to init)
        #[arg(long)]
        domain: Option<String>,
        /// Also route the editor service
        #[arg(long)]
        editor: bool,
        /// Additional service as name=upstream (repeatable)
        #[arg(long = "service", value_parser = parse_service)]
        services: Vec<(String, String)>,
        /// Attach the domain's TLS certificates
        #[arg(long)]
        tls: bool,
    },
    /// Remove a workspace's routes and TLS objects
    Unregister {
        workspace: String,
        /// Also remove ids used by earlier releases
        #[arg(long)]
        legacy: bool,
    },
    /// Unregister every registered workspace
    Cleanup {
        /// Also remove ids used by earlier releases
        #[arg(long)]
        legacy: bool,
    },
    /// List registered workspaces
    ListWorkspaces,
}

fn parse_service(value: &str) -> Result<(String, String), String> {
    let (name, upstream) = value
        .split_once('=')
        .ok_or_else(|| format!("expected name=upstream, got '{value}'"))?;
    let name = name.trim();
    if name.is_empty() || upstream.trim().is_empty() {
        return Err(format!("expected name=upstream, got '{value}'"));
    }
    Ok((name.to_string(), upstream.trim().to_string()))
}
