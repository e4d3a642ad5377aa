//! # wsp ingress
//!
//! Keeps a Caddy reverse proxy's routing table in step with the workspaces
//! running on this host, through Caddy's admin API.
//!
//! ## Architecture
//!
//! ```text
//! wsp CLI → WorkspaceIngress ─┬→ RouteManager ─┐
//!                             ├→ TlsManager   ─┼→ ControlPlane (admin API, :2019)
//!                             └→ Bootstrapper ─┘
//!            ownership.json ←─ records what each workspace registered
//! ```
//!
//! Routes are identified by `@id` so they can be replaced and removed without
//! knowing their position in the routes array.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use wsp_ingress::{ControlApiClient, RetryPolicy, RouteManager, ConfigPaths};
//!
//! # fn example() -> wsp_ingress::Result<()> {
//! let client = ControlApiClient::new(
//!     "http://localhost:2019",
//!     Duration::from_secs(10),
//!     RetryPolicy::default(),
//! )?;
//! let routes = RouteManager::new(&client, ConfigPaths::default());
//! routes.add_route("app.example.com", "app:8080")?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod bootstrap;
pub mod client_ops;
pub mod config;
pub mod control_api;
pub mod error;
pub mod lifecycle;
pub mod ownership;
pub mod routes;
pub mod server;
pub mod tls;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fake;

// Re-export main types
pub use backoff::RetryPolicy;
pub use bootstrap::Bootstrapper;
pub use config::IngressSettings;
pub use control_api::{ConfigPaths, ControlApiClient, ControlPlane};
pub use error::{IngressError, Result};
pub use lifecycle::{IngressFiles, WorkspaceIngress, WorkspaceServices};
pub use ownership::{IndexStore, OwnershipIndex, WorkspaceRecord};
pub use routes::{route_id, RouteManager};
pub use tls::TlsManager;
pub use types::{Route, RouteSummary, TeardownReport};

/// Default address of Caddy's admin API
pub const DEFAULT_ADMIN_URL: &str = "http://localhost:2019";

/// HTTP server in Caddy's config that owns the routes
pub const DEFAULT_SERVER_NAME: &str = "srv0";

/// Per-request timeout for admin API calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_LISTEN: [&str; 2] = [":80", ":443"];

/// Certificate directory as seen from inside the proxy container
pub const DEFAULT_TLS_DIR: &str = "/tls";

pub const DEFAULT_IMAGE: &str = "caddy:2.9";

/// Container and compose project names
pub const CONTAINER_NAME: &str = "wsp-ingress";
pub const COMPOSE_PROJECT: &str = "wsp-ingress";

/// Docker network shared with workspace containers
pub const DEFAULT_NETWORK: &str = "wsp_network";
