//! Hostname routes: id derivation, construction, add/remove/list.

use serde_json::Value;
use tracing::{debug, info, warn};
use wsp_core::validation;

use crate::control_api::{append_path, get_config_json, to_payload, ConfigPaths, ControlPlane};
use crate::error::{validation_reason, IngressError, Result};
use crate::types::{Route, RouteSummary};

pub const ROUTE_ID_PREFIX: &str = "route_";

/// Lower-case and validate a hostname.
pub fn normalize_hostname(hostname: &str) -> Result<String> {
    validation::normalize_hostname(hostname).map_err(|e| IngressError::InvalidHostname {
        hostname: hostname.to_string(),
        reason: validation_reason(e),
    })
}

pub fn validate_upstream(upstream: &str) -> Result<()> {
    validation::validate_upstream(upstream).map_err(|e| IngressError::InvalidUpstream {
        upstream: upstream.to_string(),
        reason: validation_reason(e),
    })
}

/// Resource id of the route for `hostname`.
///
/// Dots become underscores. Valid hostnames never contain `_`, so distinct
/// hostnames always get distinct ids and the id maps back to its hostname.
pub fn route_id(hostname: &str) -> Result<String> {
    let hostname = normalize_hostname(hostname)?;
    Ok(format!("{}{}", ROUTE_ID_PREFIX, hostname.replace('.', "_")))
}

/// Inverse of [`route_id`]; `None` for ids not produced by it.
pub fn hostname_from_route_id(id: &str) -> Option<String> {
    let encoded = id.strip_prefix(ROUTE_ID_PREFIX)?;
    let hostname = encoded.replace('_', ".");
    validation::validate_hostname(&hostname).ok()?;
    Some(hostname)
}

/// Id scheme used by earlier releases: both `.` and `-` became `_`, so
/// `a-b.example.com` and `a.b-example.com` collided. Only used to clean up
/// routes created by those releases.
pub fn legacy_route_id(hostname: &str) -> String {
    hostname.replace(['.', '-'], "_")
}

/// Build the canonical route for `hostname` → `upstream`.
pub fn build_route(hostname: &str, upstream: &str) -> Result<Route> {
    let hostname = normalize_hostname(hostname)?;
    validate_upstream(upstream)?;
    let id = route_id(&hostname)?;
    Ok(Route::reverse_proxy(&id, &hostname, upstream))
}

/// Route operations against one HTTP server's route list.
pub struct RouteManager<'a> {
    plane: &'a dyn ControlPlane,
    paths: ConfigPaths,
}

impl<'a> RouteManager<'a> {
    pub fn new(plane: &'a dyn ControlPlane, paths: ConfigPaths) -> Self {
        Self { plane, paths }
    }

    /// Point `hostname` at `upstream`, replacing any existing route for it.
    ///
    /// Removes the route id first (absent is fine) and then appends the new
    /// route, so repeated calls leave exactly one route.
    pub fn add_route(&self, hostname: &str, upstream: &str) -> Result<Route> {
        let route = build_route(hostname, upstream)?;
        let hostname = route.hosts().join(",");
        let Some(id) = route.id.as_deref() else {
            return Err(IngressError::Config(format!("route for {} has no id", hostname)));
        };

        self.plane
            .delete_id(id)
            .map_err(|e| e.during("replace route", &hostname))?;

        let payload = to_payload("route", &vec![&route])?;
        self.plane
            .post(&append_path(&self.paths.routes()), &payload)
            .map_err(|e| e.during("add route", &hostname))?;

        info!(hostname = %hostname, upstream = %upstream, route_id = %id, "Route added");
        Ok(route)
    }

    /// Remove the route for `hostname`. Succeeds if there was none.
    pub fn remove_route(&self, hostname: &str) -> Result<String> {
        let id = route_id(hostname)?;
        self.remove_route_id(&id)
            .map_err(|e| e.during("remove route", hostname))?;
        info!(hostname = %hostname, route_id = %id, "Route removed");
        Ok(id)
    }

    /// Remove a route (or any object) by resource id.
    pub fn remove_route_id(&self, id: &str) -> Result<()> {
        debug!(route_id = %id, "Removing route");
        self.plane.delete_id(id)
    }

    /// Summaries of every route on the server, in order.
    pub fn list_routes(&self) -> Result<Vec<RouteSummary>> {
        let path = self.paths.routes();
        let raw: Vec<Value> = get_config_json(self.plane, &path)?;

        Ok(raw
            .iter()
            .map(|value| match serde_json::from_value::<Route>(value.clone()) {
                Ok(route) => RouteSummary::from_route(&route),
                Err(e) => {
                    warn!(error = %e, "Route did not parse, listing as unrecognised");
                    RouteSummary::unrecognised(value)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::InMemoryControlPlane;
    use crate::types::RouteShape;
    use serde_json::json;

    fn plane_with_routes() -> InMemoryControlPlane {
        let plane = InMemoryControlPlane::new();
        plane
            .put(&ConfigPaths::default().routes(), &json!([]))
            .unwrap();
        plane
    }

    #[test]
    fn test_route_id_examples() {
        assert_eq!(
            route_id("a-b.example.com").unwrap(),
            "route_a-b_example_com"
        );
        assert_eq!(
            route_id("a.b-example.com").unwrap(),
            "route_a_b-example_com"
        );
        assert_eq!(route_id("App.Example.COM").unwrap(), "route_app_example_com");
    }

    #[test]
    fn test_route_ids_that_collided_under_legacy_scheme_are_distinct() {
        let pairs = [
            ("a-b.example.com", "a.b-example.com"),
            ("a-b.com", "a.b.com"),
            ("x-y-z.io", "x.y.z.io"),
        ];
        for (left, right) in pairs {
            assert_eq!(legacy_route_id(left), legacy_route_id(right));
            assert_ne!(route_id(left).unwrap(), route_id(right).unwrap());
        }
    }

    #[test]
    fn test_route_id_is_reversible() {
        for host in ["a-b.example.com", "localhost", "x.y.z.io"] {
            let id = route_id(host).unwrap();
            assert_eq!(hostname_from_route_id(&id).as_deref(), Some(host));
        }
        assert_eq!(hostname_from_route_id("alpha_tlscerts"), None);
        assert_eq!(hostname_from_route_id("route_"), None);
    }

    #[test]
    fn test_legacy_route_id() {
        assert_eq!(legacy_route_id("alpha-gitops.example.com"), "alpha_gitops_example_com");
    }

    #[test]
    fn test_build_route_rejects_bad_input() {
        assert!(matches!(
            build_route("bad host", "app:80"),
            Err(IngressError::InvalidHostname { .. })
        ));
        assert!(matches!(
            build_route("ok.example.com", "app"),
            Err(IngressError::InvalidUpstream { .. })
        ));
    }

    #[test]
    fn test_add_list_remove_round_trip() {
        let plane = plane_with_routes();
        let routes = RouteManager::new(&plane, ConfigPaths::default());

        routes.add_route("a.example.com", "app:8080").unwrap();
        let listed = routes.list_routes().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].hosts, vec!["a.example.com".to_string()]);
        assert_eq!(listed[0].upstreams, vec!["app:8080".to_string()]);
        assert_eq!(listed[0].id.as_deref(), Some("route_a_example_com"));
        assert!(listed[0].terminal);

        routes.remove_route("a.example.com").unwrap();
        assert!(routes.list_routes().unwrap().is_empty());
    }

    #[test]
    fn test_add_twice_replaces() {
        let plane = plane_with_routes();
        let routes = RouteManager::new(&plane, ConfigPaths::default());

        routes.add_route("a.example.com", "old:80").unwrap();
        routes.add_route("a.example.com", "new:80").unwrap();

        let listed = routes.list_routes().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].upstreams, vec!["new:80".to_string()]);
    }

    #[test]
    fn test_add_issues_delete_then_append() {
        let plane = plane_with_routes();
        plane.clear_requests();
        RouteManager::new(&plane, ConfigPaths::default())
            .add_route("a.example.com", "app:80")
            .unwrap();

        let requests = plane.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "DELETE");
        assert_eq!(requests[0].path, "/id/route_a_example_com");
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].path, "/config/apps/http/servers/srv0/routes/...");
        assert!(requests[1].body.as_ref().is_some_and(Value::is_array));
    }

    #[test]
    fn test_remove_never_added_succeeds() {
        let plane = plane_with_routes();
        let routes = RouteManager::new(&plane, ConfigPaths::default());
        assert_eq!(
            routes.remove_route("ghost.example.com").unwrap(),
            "route_ghost_example_com"
        );
    }

    #[test]
    fn test_list_on_uninitialised_instance() {
        let plane = InMemoryControlPlane::new();
        let routes = RouteManager::new(&plane, ConfigPaths::default());
        assert!(routes.list_routes().unwrap().is_empty());

        let plane = InMemoryControlPlane::with_config(json!({ "apps": { "tls": {} } }));
        let routes = RouteManager::new(&plane, ConfigPaths::default());
        assert!(routes.list_routes().unwrap().is_empty());
    }

    #[test]
    fn test_foreign_routes_are_listed_as_unrecognised() {
        let plane = InMemoryControlPlane::new();
        plane
            .put(
                &ConfigPaths::default().routes(),
                &json!([
                    { "match": [{ "host": ["files.example.com"] }],
                      "handle": [{ "handler": "file_server", "root": "/srv" }] },
                    { "@id": "weird", "handle": "not-a-list" }
                ]),
            )
            .unwrap();
        let routes = RouteManager::new(&plane, ConfigPaths::default());
        routes.add_route("a.example.com", "app:80").unwrap();

        let listed = routes.list_routes().unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].shape, RouteShape::Unrecognised);
        assert_eq!(listed[0].hosts, vec!["files.example.com".to_string()]);
        assert!(listed[0].upstreams.is_empty());
        assert_eq!(listed[1].shape, RouteShape::Unrecognised);
        assert_eq!(listed[1].id.as_deref(), Some("weird"));
        assert_eq!(listed[2].shape, RouteShape::ReverseProxy);
        assert_eq!(listed[2].upstreams, vec!["app:80".to_string()]);
    }
}
