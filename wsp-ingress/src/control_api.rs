//! Client for the proxy's JSON control (admin) API.
//!
//! The API exposes the live configuration as a tree under `/config/...`;
//! objects carrying an `@id` field are also addressable as `/id/<id>`.
//! Appending to an array uses the `/...` path suffix with an array payload.

use std::error::Error as StdError;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backoff::RetryPolicy;
use crate::config::IngressSettings;
use crate::error::{IngressError, Result};

/// The whole running configuration.
pub const CONFIG_ROOT_PATH: &str = "/config/";

/// Certificate file loaders are global, not per server.
pub const TLS_LOAD_FILES_PATH: &str = "/config/apps/tls/certificates/load_files";

/// Paths of the collections this crate writes, for one HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    server: String,
}

impl ConfigPaths {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn routes(&self) -> String {
        format!("/config/apps/http/servers/{}/routes", self.server)
    }

    pub fn listen(&self) -> String {
        format!("/config/apps/http/servers/{}/listen", self.server)
    }

    pub fn tls_connection_policies(&self) -> String {
        format!(
            "/config/apps/http/servers/{}/tls_connection_policies",
            self.server
        )
    }

    pub fn tls_load_files(&self) -> String {
        TLS_LOAD_FILES_PATH.to_string()
    }
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SERVER_NAME)
    }
}

/// Path that appends every element of an array payload to `collection`.
pub fn append_path(collection: &str) -> String {
    format!("{}/...", collection.trim_end_matches('/'))
}

/// Path addressing an object by its `@id`.
pub fn id_path(id: &str) -> String {
    format!("/id/{}", id)
}

/// Operations against a proxy control API.
///
/// Implemented over HTTP by [`ControlApiClient`]; the `test-helpers`
/// feature adds an in-memory implementation.
pub trait ControlPlane {
    fn get(&self, path: &str) -> Result<String>;

    /// Create the value at `path`; fails with 409 when it already exists.
    fn put(&self, path: &str, payload: &Value) -> Result<String>;

    /// Replace an existing value at `path`.
    fn patch(&self, path: &str, payload: &Value) -> Result<String>;

    /// Set an object key, or append to an array (`/...` appends each element).
    fn post(&self, path: &str, payload: &Value) -> Result<String>;

    /// Delete the object with the given `@id`. Succeeds when it does not exist.
    fn delete_id(&self, id: &str) -> Result<()>;
}

/// GET `path` and decode the body; an empty or `null` body is `T::default()`.
pub fn get_json<T>(plane: &dyn ControlPlane, path: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let body = plane.get(path)?;
    let body = body.trim();
    if body.is_empty() || body == "null" {
        return Ok(T::default());
    }
    serde_json::from_str(body).map_err(|source| IngressError::Decode {
        path: path.to_string(),
        source,
    })
}

/// GET a config subtree whose parent objects may not exist yet.
///
/// The proxy rejects a read that passes through a missing object, which is
/// the normal state before `init`. The whole config is read instead and
/// `path` resolved locally; a missing node anywhere along it is
/// `T::default()`.
pub fn get_config_json<T>(plane: &dyn ControlPlane, path: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let root: Value = get_json(plane, CONFIG_ROOT_PATH)?;
    let pointer = path
        .strip_prefix("/config")
        .unwrap_or(path)
        .trim_end_matches('/');
    match root.pointer(pointer) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|source| IngressError::Decode {
            path: path.to_string(),
            source,
        }),
    }
}

/// Serialize a value for use as a request payload.
pub fn to_payload<T: Serialize>(what: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|source| IngressError::Encode {
        what: what.to_string(),
        source,
    })
}

/// Map a response status to the result callers see.
///
/// A DELETE answered with 404 means the object is already gone and counts
/// as success.
pub(crate) fn interpret_status(method: &str, path: &str, code: u16, body: String) -> Result<String> {
    if (200..300).contains(&code) {
        return Ok(body);
    }
    if method == "DELETE" && code == 404 {
        debug!(path = %path, "Object already absent");
        return Ok(String::new());
    }
    Err(IngressError::Status {
        method: method.to_string(),
        path: path.to_string(),
        code,
        body: body.trim().to_string(),
    })
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Blocking HTTP client for the control API.
#[derive(Debug, Clone)]
pub struct ControlApiClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ControlApiClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| IngressError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_settings(settings: &IngressSettings) -> Result<Self> {
        Self::new(
            &settings.admin_url,
            Duration::from_secs(settings.timeout_secs),
            settings.retry,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request, retrying transport failures that are safe to repeat.
    pub fn send(&self, method: Method, path: &str, payload: Option<&Value>) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.send_once(&method, path, payload) {
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        method = %method,
                        path = %path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying control API request"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn send_once(&self, method: &Method, path: &str, payload: Option<&Value>) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "Control API request");

        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = request
            .send()
            .map_err(|e| transport_error(method, path, &e))?;
        let code = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| transport_error(method, path, &e))?;

        debug!(method = %method, path = %path, status = code, "Control API response");
        interpret_status(method.as_str(), path, code, body)
    }

    /// True when the admin endpoint answers at all.
    pub fn is_reachable(&self) -> bool {
        self.send_once(&Method::GET, "/config/", None).is_ok()
    }
}

/// Classify a client error.
///
/// POST appends, so it is only repeatable when no connection was made.
fn transport_error(method: &Method, path: &str, err: &reqwest::Error) -> IngressError {
    let retryable = if *method == Method::POST {
        err.is_connect()
    } else {
        true
    };
    IngressError::Transport {
        method: method.to_string(),
        path: path.to_string(),
        message: error_chain(err),
        retryable,
    }
}

impl ControlPlane for ControlApiClient {
    fn get(&self, path: &str) -> Result<String> {
        self.send(Method::GET, path, None)
    }

    fn put(&self, path: &str, payload: &Value) -> Result<String> {
        self.send(Method::PUT, path, Some(payload))
    }

    fn patch(&self, path: &str, payload: &Value) -> Result<String> {
        self.send(Method::PATCH, path, Some(payload))
    }

    fn post(&self, path: &str, payload: &Value) -> Result<String> {
        self.send(Method::POST, path, Some(payload))
    }

    fn delete_id(&self, id: &str) -> Result<()> {
        self.send(Method::DELETE, &id_path(id), None).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::InMemoryControlPlane;
    use serde_json::json;

    #[test]
    fn test_paths_for_default_server() {
        let paths = ConfigPaths::default();
        assert_eq!(paths.routes(), "/config/apps/http/servers/srv0/routes");
        assert_eq!(paths.listen(), "/config/apps/http/servers/srv0/listen");
        assert_eq!(
            paths.tls_connection_policies(),
            "/config/apps/http/servers/srv0/tls_connection_policies"
        );
        assert_eq!(
            append_path(&paths.routes()),
            "/config/apps/http/servers/srv0/routes/..."
        );
        assert_eq!(id_path("route_a_example_com"), "/id/route_a_example_com");
    }

    #[test]
    fn test_interpret_status() {
        assert_eq!(
            interpret_status("GET", "/config/", 200, "{}".into()).unwrap(),
            "{}"
        );
        assert_eq!(
            interpret_status("DELETE", "/id/x", 404, "unknown object ID".into()).unwrap(),
            ""
        );

        let err = interpret_status("GET", "/config/x", 404, "not found\n".into()).unwrap_err();
        match err {
            IngressError::Status { code, body, .. } => {
                assert_eq!(code, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = interpret_status("DELETE", "/id/x", 500, "boom".into()).unwrap_err();
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn test_get_json_treats_null_as_empty() {
        let plane = InMemoryControlPlane::new();
        let apps: Vec<Value> = get_json(&plane, "/config/apps").unwrap();
        assert!(apps.is_empty());
    }

    #[test]
    fn test_config_json_on_fresh_instance_is_empty() {
        let plane = InMemoryControlPlane::new();
        let routes_path = ConfigPaths::default().routes();
        let err = get_json::<Vec<Value>>(&plane, &routes_path).unwrap_err();
        assert_eq!(err.status_code(), Some(400));

        let routes: Vec<Value> = get_config_json(&plane, &routes_path).unwrap();
        assert!(routes.is_empty());
    }

    #[test]
    fn test_config_json_resolves_nested_path() {
        let plane = InMemoryControlPlane::with_config(json!({
            "apps": { "http": { "servers": { "srv0": { "routes": [{ "@id": "a" }] } } } }
        }));
        let routes: Vec<Value> = get_config_json(&plane, &ConfigPaths::default().routes()).unwrap();
        assert_eq!(routes, vec![json!({ "@id": "a" })]);

        let err = get_config_json::<Vec<Value>>(&plane, "/config/apps/http").unwrap_err();
        assert!(matches!(err, IngressError::Decode { .. }));
    }

    #[test]
    fn test_get_json_reports_decode_errors() {
        let plane = InMemoryControlPlane::with_config(json!({ "apps": { "x": "not a list" } }));
        let err = get_json::<Vec<Value>>(&plane, "/config/apps/x").unwrap_err();
        assert!(matches!(err, IngressError::Decode { .. }));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ControlApiClient::new(
            "http://localhost:2019/",
            Duration::from_secs(1),
            RetryPolicy::none(),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:2019");
    }
}
