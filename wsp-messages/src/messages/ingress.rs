//! Ingress messages (init, routes, workspace registration)

pub struct IngressMessages {
    // ============================================================================
    // Init
    // ============================================================================
    pub init_header: &'static str,
    pub init_file_written: &'static str,
    pub init_starting: &'static str,
    pub init_skip_start: &'static str,
    pub init_waiting: &'static str,
    pub init_reset_routes: &'static str,
    pub init_success: &'static str,
    pub init_already_initialized: &'static str,
    pub init_force_hint: &'static str,

    // ============================================================================
    // Routes
    // ============================================================================
    pub route_added: &'static str,
    pub route_removed: &'static str,
    pub routes_none: &'static str,
    pub routes_found: &'static str,
    pub route_unrecognised: &'static str,

    // ============================================================================
    // Workspaces
    // ============================================================================
    pub register_header: &'static str,
    pub register_route: &'static str,
    pub register_tls: &'static str,
    pub register_cert_missing: &'static str,
    pub register_success: &'static str,
    pub unregister_header: &'static str,
    pub unregister_fallback: &'static str,
    pub unregister_removed: &'static str,
    pub unregister_failed: &'static str,
    pub unregister_success: &'static str,
    pub unregister_partial: &'static str,
    pub workspaces_none: &'static str,
    pub workspaces_header: &'static str,
    pub cleanup_complete: &'static str,

    // ============================================================================
    // Hints
    // ============================================================================
    pub admin_unreachable_hint: &'static str,
}

pub const INGRESS_MESSAGES: IngressMessages = IngressMessages {
    init_header: "🚀 Initializing ingress for '{domain}'...",
    init_file_written: "  ✓ Wrote {path}",
    init_starting: "Starting ingress container '{project}'...",
    init_skip_start: "  Skipping container start",
    init_waiting: "  Waiting for admin API at {url}...",
    init_reset_routes: "  ✓ Routing table reset",
    init_success: "✅ Ingress ready at {url}",
    init_already_initialized: "⚠️  Ingress already has {routes} route(s) configured",
    init_force_hint: "💡 Re-run with --force to reset the routing table",

    route_added: "✅ Route added: {hostname} → {upstream}",
    route_removed: "✅ Route removed: {hostname}",
    routes_none: "No routes configured",
    routes_found: "Found {count} route(s)",
    route_unrecognised: "(unrecognised handler)",

    register_header: "🔧 Registering ingress for workspace '{workspace}'...",
    register_route: "  ✓ {hostname} → {upstream}",
    register_tls: "  ✓ TLS certificates attached for *.{domain}",
    register_cert_missing: "Certificate not found at {path}; the proxy will fail to load it",
    register_success: "✅ Workspace '{workspace}' registered",
    unregister_header: "🗑️  Removing ingress for workspace '{workspace}'...",
    unregister_fallback: "No ownership record for '{workspace}', using naming convention",
    unregister_removed: "  ✓ Removed {id}",
    unregister_failed: "  ⚠️  Failed to remove {id}: {error}",
    unregister_success: "✅ Workspace '{workspace}' unregistered",
    unregister_partial: "⚠️  Workspace '{workspace}' unregistered with {count} failure(s)",
    workspaces_none: "No registered workspaces",
    workspaces_header: "Registered workspaces:",
    cleanup_complete: "\n✅ Cleanup complete ({count} workspace(s))",

    admin_unreachable_hint: "Is the ingress running? Try: wsp ingress init --domain <domain>",
};
