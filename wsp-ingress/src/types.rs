//! Wire types for the proxy's JSON configuration tree.
//!
//! Field names follow the proxy's config format (`@id`, `match`, `handle`),
//! so these types serialize straight into control API payloads.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// One entry of a server's route list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<HostMatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handle: Vec<Handler>,
    #[serde(default)]
    pub terminal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    #[serde(default)]
    pub dial: String,
}

/// A handler in a route's chain, tagged by its `handler` field.
///
/// Only the two handlers this crate builds are modelled; anything else,
/// including a known handler with an unexpected body, is kept as raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Handler {
    Subroute { routes: Vec<Route> },
    ReverseProxy { upstreams: Vec<Upstream> },
    Other(Value),
}

#[derive(Deserialize)]
struct SubrouteBody {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Deserialize)]
struct ReverseProxyBody {
    #[serde(default)]
    upstreams: Vec<Upstream>,
}

impl Serialize for Handler {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Handler::Subroute { routes } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("handler", "subroute")?;
                map.serialize_entry("routes", routes)?;
                map.end()
            }
            Handler::ReverseProxy { upstreams } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("handler", "reverse_proxy")?;
                map.serialize_entry("upstreams", upstreams)?;
                map.end()
            }
            Handler::Other(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Handler {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let parsed = match raw.get("handler").and_then(Value::as_str) {
            Some("subroute") => serde_json::from_value::<SubrouteBody>(raw.clone())
                .ok()
                .map(|body| Handler::Subroute {
                    routes: body.routes,
                }),
            Some("reverse_proxy") => serde_json::from_value::<ReverseProxyBody>(raw.clone())
                .ok()
                .map(|body| Handler::ReverseProxy {
                    upstreams: body.upstreams,
                }),
            _ => None,
        };
        Ok(parsed.unwrap_or(Handler::Other(raw)))
    }
}

impl Route {
    /// The canonical route shape: host match → subroute → reverse proxy.
    pub fn reverse_proxy(id: &str, hostname: &str, upstream: &str) -> Self {
        Route {
            id: Some(id.to_string()),
            matchers: vec![HostMatch {
                host: vec![hostname.to_string()],
            }],
            handle: vec![Handler::Subroute {
                routes: vec![Route {
                    id: None,
                    matchers: Vec::new(),
                    handle: vec![Handler::ReverseProxy {
                        upstreams: vec![Upstream {
                            dial: upstream.to_string(),
                        }],
                    }],
                    terminal: false,
                }],
            }],
            terminal: true,
        }
    }

    /// All hostnames across every matcher set.
    pub fn hosts(&self) -> Vec<String> {
        self.matchers
            .iter()
            .flat_map(|m| m.host.iter().cloned())
            .collect()
    }

    /// Upstream dial addresses, if the handler chain is exactly
    /// subroute → reverse_proxy → upstreams.
    pub fn proxy_upstreams(&self) -> Option<Vec<String>> {
        let [Handler::Subroute { routes }] = self.handle.as_slice() else {
            return None;
        };
        let [inner] = routes.as_slice() else {
            return None;
        };
        let [Handler::ReverseProxy { upstreams }] = inner.handle.as_slice() else {
            return None;
        };
        if upstreams.is_empty() {
            return None;
        }
        Some(upstreams.iter().map(|u| u.dial.clone()).collect())
    }
}

/// SNI-based TLS connection policy selecting certificates by tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsPolicy {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "match")]
    pub matcher: SniMatch,
    pub certificate_selection: CertificateSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SniMatch {
    pub sni: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSelection {
    pub any_tag: Vec<String>,
}

/// Certificate/key file pair loaded from disk inside the proxy container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsCertificateLoad {
    #[serde(rename = "@id")]
    pub id: String,
    pub certificate: String,
    pub key: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteShape {
    ReverseProxy,
    Unrecognised,
}

/// Read-back view of one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub id: Option<String>,
    pub hosts: Vec<String>,
    pub upstreams: Vec<String>,
    pub terminal: bool,
    pub shape: RouteShape,
}

impl RouteSummary {
    pub fn from_route(route: &Route) -> Self {
        let (shape, upstreams) = match route.proxy_upstreams() {
            Some(upstreams) => (RouteShape::ReverseProxy, upstreams),
            None => (RouteShape::Unrecognised, Vec::new()),
        };
        RouteSummary {
            id: route.id.clone(),
            hosts: route.hosts(),
            upstreams,
            terminal: route.terminal,
            shape,
        }
    }

    /// Summarise a raw route object that did not parse as a [`Route`].
    pub fn unrecognised(raw: &Value) -> Self {
        let obj = raw.as_object().cloned().unwrap_or_else(Map::new);
        let id = obj.get("@id").and_then(Value::as_str).map(str::to_string);
        let hosts = obj
            .get("match")
            .and_then(Value::as_array)
            .map(|sets| {
                sets.iter()
                    .filter_map(|set| set.get("host").and_then(Value::as_array))
                    .flatten()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let terminal = obj.get("terminal").and_then(Value::as_bool).unwrap_or(false);
        RouteSummary {
            id,
            hosts,
            upstreams: Vec::new(),
            terminal,
            shape: RouteShape::Unrecognised,
        }
    }
}

/// Objects removed and objects that could not be removed during teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub removed: Vec<String>,
    pub failed: Vec<FailedRemoval>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRemoval {
    pub id: String,
    pub error: String,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: TeardownReport) {
        self.removed.extend(other.removed);
        self.failed.extend(other.failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_route_wire_shape() {
        let route = Route::reverse_proxy("route_a_example_com", "a.example.com", "app:8080");
        let value = serde_json::to_value(&route).unwrap();
        assert_eq!(
            value,
            json!({
                "@id": "route_a_example_com",
                "match": [{ "host": ["a.example.com"] }],
                "handle": [{
                    "handler": "subroute",
                    "routes": [{
                        "handle": [{
                            "handler": "reverse_proxy",
                            "upstreams": [{ "dial": "app:8080" }]
                        }],
                        "terminal": false
                    }]
                }],
                "terminal": true
            })
        );
    }

    #[test]
    fn test_summary_of_canonical_route() {
        let route = Route::reverse_proxy("id1", "a.example.com", "app:8080");
        let summary = RouteSummary::from_route(&route);
        assert_eq!(summary.shape, RouteShape::ReverseProxy);
        assert_eq!(summary.upstreams, vec!["app:8080".to_string()]);
        assert_eq!(summary.hosts, vec!["a.example.com".to_string()]);
        assert!(summary.terminal);
    }

    #[test]
    fn test_foreign_handler_is_unrecognised() {
        let raw = json!({
            "@id": "static",
            "match": [{ "host": ["files.example.com"] }],
            "handle": [{ "handler": "file_server", "root": "/srv" }],
            "terminal": true
        });
        let route: Route = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(route.handle[0], Handler::Other(_)));

        let summary = RouteSummary::from_route(&route);
        assert_eq!(summary.shape, RouteShape::Unrecognised);
        assert!(summary.upstreams.is_empty());
        assert_eq!(summary.hosts, vec!["files.example.com".to_string()]);
        assert_eq!(summary.id.as_deref(), Some("static"));

        // Unknown handlers serialize back unchanged.
        assert_eq!(serde_json::to_value(&route).unwrap(), raw);
    }

    #[test]
    fn test_subroute_without_proxy_is_unrecognised() {
        let raw = json!({
            "match": [{ "host": ["x.example.com"] }],
            "handle": [{
                "handler": "subroute",
                "routes": [{ "handle": [{ "handler": "static_response", "body": "hi" }] }]
            }]
        });
        let route: Route = serde_json::from_value(raw).unwrap();
        assert_eq!(route.proxy_upstreams(), None);
    }

    #[test]
    fn test_unrecognised_summary_from_raw_value() {
        let raw = json!({ "@id": "odd", "match": [{ "host": ["odd.example.com"] }], "handle": "nope" });
        let summary = RouteSummary::unrecognised(&raw);
        assert_eq!(summary.id.as_deref(), Some("odd"));
        assert_eq!(summary.hosts, vec!["odd.example.com".to_string()]);
        assert_eq!(summary.shape, RouteShape::Unrecognised);
    }
}
