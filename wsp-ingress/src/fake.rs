//! In-memory stand-in for the proxy control API.
//!
//! Reproduces the behaviour the managers depend on:
//! - `GET` of a missing key is `null`, but a `GET` that has to pass through a
//!   missing object answers 400 (invalid traversal path)
//! - `PUT` creates (including missing parent objects) and answers 409 when
//!   the key already exists
//! - `PATCH` replaces an existing value and answers 404 otherwise
//! - `POST` to `<array>/...` appends each element, `POST` to an array appends
//!   the payload, `POST` to an object key sets it
//! - `/id/<id>` looks objects up by `@id`; `DELETE` of an unknown id is 404
//! - a write that leaves two objects with the same `@id` is rejected with 400

use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::{json, Map, Value};

use crate::control_api::{interpret_status, ControlPlane};
use crate::error::Result;

/// A request as seen by the fake, for assertions in tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug)]
pub struct InMemoryControlPlane {
    config: Mutex<Value>,
    requests: Mutex<Vec<RecordedRequest>>,
}

type Reply = std::result::Result<Value, (u16, String)>;

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::with_config(Value::Object(Map::new()))
    }

    pub fn with_config(config: Value) -> Self {
        Self {
            config: Mutex::new(config),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the whole configuration tree.
    pub fn snapshot(&self) -> Value {
        self.config.lock().map(|c| c.clone()).unwrap_or(Value::Null)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn clear_requests(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }

    /// Every `@id` currently present in the tree.
    pub fn ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        collect_ids(&self.snapshot(), &mut ids);
        ids
    }

    /// Process one request and return `(status, body)`.
    pub fn handle(&self, method: &str, path: &str, body: Option<Value>) -> (u16, String) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                method: method.to_string(),
                path: path.to_string(),
                body: body.clone(),
            });
        }

        let Ok(mut config) = self.config.lock() else {
            return (500, "state poisoned".to_string());
        };

        let reply = if let Some(rest) = path.strip_prefix("/id/") {
            handle_id(&mut config, method, rest)
        } else if let Some(rest) = path.strip_prefix("/config") {
            let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
            let before = config.clone();
            let reply = handle_config(&mut config, method, &segments, body);
            if reply.is_ok() && method != "GET" {
                if let Some(dup) = duplicate_id(&config) {
                    *config = before;
                    Err((400, format!("duplicate ID '{}' found", dup)))
                } else {
                    reply
                }
            } else {
                reply
            }
        } else {
            Err((404, format!("unknown endpoint {}", path)))
        };

        match reply {
            Ok(value) => (200, value.to_string()),
            Err((code, message)) => (code, json!({ "error": message }).to_string()),
        }
    }

    fn call(&self, method: &str, path: &str, body: Option<&Value>) -> Result<String> {
        let (code, text) = self.handle(method, path, body.cloned());
        interpret_status(method, path, code, text)
    }
}

impl ControlPlane for InMemoryControlPlane {
    fn get(&self, path: &str) -> Result<String> {
        self.call("GET", path, None)
    }

    fn put(&self, path: &str, payload: &Value) -> Result<String> {
        self.call("PUT", path, Some(payload))
    }

    fn patch(&self, path: &str, payload: &Value) -> Result<String> {
        self.call("PATCH", path, Some(payload))
    }

    fn post(&self, path: &str, payload: &Value) -> Result<String> {
        self.call("POST", path, Some(payload))
    }

    fn delete_id(&self, id: &str) -> Result<()> {
        self.call("DELETE", &crate::control_api::id_path(id), None)
            .map(|_| ())
    }
}

fn handle_id(config: &mut Value, method: &str, id: &str) -> Reply {
    let id = id.trim_end_matches('/');
    let mut path = Vec::new();
    if id.is_empty() || !find_id(config, id, &mut path) || path.is_empty() {
        return Err((404, format!("unknown object ID '{}'", id)));
    }
    match method {
        "GET" => lookup(config, &path)
            .cloned()
            .ok_or_else(|| (404, format!("unknown object ID '{}'", id))),
        "DELETE" => {
            let segments: Vec<&str> = path.iter().map(String::as_str).collect();
            remove_at(config, &segments).map(|_| Value::Null)
        }
        other => Err((405, format!("method {} not supported on /id/", other))),
    }
}

fn handle_config(config: &mut Value, method: &str, segments: &[&str], body: Option<Value>) -> Reply {
    match method {
        "GET" => get(config, segments),
        "PUT" => {
            let payload = body.ok_or_else(|| (400, "missing body".to_string()))?;
            put(config, segments, payload)
        }
        "PATCH" => {
            let payload = body.ok_or_else(|| (400, "missing body".to_string()))?;
            let target = lookup_mut(config, segments, false)
                .ok_or_else(|| (404, format!("key does not exist: {}", segments.join("/"))))?;
            *target = payload;
            Ok(Value::Null)
        }
        "POST" => {
            let payload = body.ok_or_else(|| (400, "missing body".to_string()))?;
            post(config, segments, payload)
        }
        "DELETE" => remove_at(config, segments).map(|_| Value::Null),
        other => Err((405, format!("method {} not allowed", other))),
    }
}

fn get(config: &Value, segments: &[&str]) -> Reply {
    let Some((last, parents)) = segments.split_last() else {
        return Ok(config.clone());
    };
    match lookup(config, parents) {
        Some(Value::Object(map)) => Ok(map.get(*last).cloned().unwrap_or(Value::Null)),
        Some(Value::Array(items)) => last
            .parse::<usize>()
            .ok()
            .and_then(|idx| items.get(idx))
            .cloned()
            .ok_or_else(|| (400, format!("array index out of bounds: {}", last))),
        _ => Err((400, format!("invalid traversal path at: {}", segments.join("/")))),
    }
}

fn put(config: &mut Value, segments: &[&str], payload: Value) -> Reply {
    let Some((last, parents)) = segments.split_last() else {
        *config = payload;
        return Ok(Value::Null);
    };
    let parent = lookup_mut(config, parents, true)
        .ok_or_else(|| (400, format!("invalid traversal path: {}", parents.join("/"))))?;
    match parent {
        Value::Object(map) => {
            if map.contains_key(*last) {
                return Err((409, format!("key already exists: {}", last)));
            }
            map.insert(last.to_string(), payload);
            Ok(Value::Null)
        }
        Value::Array(items) => {
            let idx: usize = last
                .parse()
                .map_err(|_| (400, format!("invalid array index: {}", last)))?;
            if idx > items.len() {
                return Err((400, format!("array index out of bounds: {}", idx)));
            }
            items.insert(idx, payload);
            Ok(Value::Null)
        }
        _ => Err((400, format!("invalid traversal path: {}", segments.join("/")))),
    }
}

fn post(config: &mut Value, segments: &[&str], payload: Value) -> Reply {
    if let Some((&"...", collection)) = segments.split_last() {
        let Some(Value::Array(items)) = lookup_mut(config, collection, false) else {
            return Err((400, format!("not an array: {}", collection.join("/"))));
        };
        let Value::Array(new_items) = payload else {
            return Err((400, "payload for /... must be an array".to_string()));
        };
        items.extend(new_items);
        return Ok(Value::Null);
    }

    let Some((last, parents)) = segments.split_last() else {
        *config = payload;
        return Ok(Value::Null);
    };
    let parent = lookup_mut(config, parents, false)
        .ok_or_else(|| (400, format!("invalid traversal path: {}", parents.join("/"))))?;
    match parent {
        Value::Object(map) => {
            match map.get_mut(*last) {
                Some(Value::Array(items)) => items.push(payload),
                _ => {
                    map.insert(last.to_string(), payload);
                }
            }
            Ok(Value::Null)
        }
        _ => Err((400, format!("invalid traversal path: {}", segments.join("/")))),
    }
}

fn lookup<'a, S: AsRef<str>>(mut node: &'a Value, segments: &[S]) -> Option<&'a Value> {
    for seg in segments {
        let seg = seg.as_ref();
        node = match node {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

fn lookup_mut<'a>(mut node: &'a mut Value, segments: &[&str], create: bool) -> Option<&'a mut Value> {
    for seg in segments {
        node = match node {
            Value::Object(map) => {
                if create && !map.contains_key(*seg) {
                    map.insert(seg.to_string(), Value::Object(Map::new()));
                }
                map.get_mut(*seg)?
            }
            Value::Array(items) => items.get_mut(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

fn remove_at(config: &mut Value, segments: &[&str]) -> Reply {
    let not_found = || (404, format!("key does not exist: {}", segments.join("/")));
    let (last, parents) = segments.split_last().ok_or_else(not_found)?;
    match lookup_mut(config, parents, false).ok_or_else(not_found)? {
        Value::Object(map) => map.remove(*last).ok_or_else(not_found),
        Value::Array(items) => {
            let idx: usize = last.parse().map_err(|_| not_found())?;
            if idx < items.len() {
                Ok(items.remove(idx))
            } else {
                Err(not_found())
            }
        }
        _ => Err(not_found()),
    }
}

fn find_id(node: &Value, id: &str, path: &mut Vec<String>) -> bool {
    match node {
        Value::Object(map) => {
            if map.get("@id").and_then(Value::as_str) == Some(id) {
                return true;
            }
            for (key, child) in map {
                path.push(key.clone());
                if find_id(child, id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                path.push(idx.to_string());
                if find_id(child, id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
        _ => false,
    }
}

fn collect_ids(node: &Value, ids: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            if let Some(id) = map.get("@id").and_then(Value::as_str) {
                ids.push(id.to_string());
            }
            map.values().for_each(|child| collect_ids(child, ids));
        }
        Value::Array(items) => items.iter().for_each(|child| collect_ids(child, ids)),
        _ => {}
    }
}

fn duplicate_id(config: &Value) -> Option<String> {
    let mut ids = Vec::new();
    collect_ids(config, &mut ids);
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTES: &str = "/config/apps/http/servers/srv0/routes";

    #[test]
    fn test_put_creates_parents_then_conflicts() {
        let plane = InMemoryControlPlane::new();
        assert_eq!(plane.handle("PUT", ROUTES, Some(json!([]))).0, 200);
        assert_eq!(
            plane.snapshot(),
            json!({ "apps": { "http": { "servers": { "srv0": { "routes": [] } } } } })
        );
        assert_eq!(plane.handle("PUT", ROUTES, Some(json!([]))).0, 409);
    }

    #[test]
    fn test_patch_requires_existing_key() {
        let plane = InMemoryControlPlane::new();
        assert_eq!(plane.handle("PATCH", ROUTES, Some(json!([]))).0, 404);
        plane.handle("PUT", ROUTES, Some(json!([{ "@id": "a" }])));
        assert_eq!(plane.handle("PATCH", ROUTES, Some(json!([]))).0, 200);
        assert!(plane.ids().is_empty());
    }

    #[test]
    fn test_append_and_delete_by_id() {
        let plane = InMemoryControlPlane::new();
        plane.handle("PUT", ROUTES, Some(json!([])));
        let append = format!("{}/...", ROUTES);
        assert_eq!(
            plane.handle("POST", &append, Some(json!([{ "@id": "a" }, { "@id": "b" }]))).0,
            200
        );
        assert_eq!(plane.ids(), vec!["a".to_string(), "b".to_string()]);

        assert_eq!(plane.handle("DELETE", "/id/a", None).0, 200);
        assert_eq!(plane.ids(), vec!["b".to_string()]);
        assert_eq!(plane.handle("DELETE", "/id/a", None).0, 404);
    }

    #[test]
    fn test_append_to_missing_collection_fails() {
        let plane = InMemoryControlPlane::new();
        let (code, _) = plane.handle("POST", &format!("{}/...", ROUTES), Some(json!([{}])));
        assert_eq!(code, 400);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let plane = InMemoryControlPlane::new();
        plane.handle("PUT", ROUTES, Some(json!([{ "@id": "a" }])));
        let (code, body) = plane.handle("POST", &format!("{}/...", ROUTES), Some(json!([{ "@id": "a" }])));
        assert_eq!(code, 400);
        assert!(body.contains("duplicate ID"));
        assert_eq!(plane.ids(), vec!["a".to_string()]);
    }

    #[test]
    fn test_get_missing_key_is_null() {
        let plane = InMemoryControlPlane::new();
        assert_eq!(plane.handle("GET", "/config/apps", None), (200, "null".to_string()));
        plane.handle("PUT", ROUTES, Some(json!([])));
        assert_eq!(
            plane.handle("GET", "/config/apps/http/servers/srv0/listen", None),
            (200, "null".to_string())
        );
    }

    #[test]
    fn test_get_through_missing_object_is_rejected() {
        let plane = InMemoryControlPlane::new();
        let (code, body) = plane.handle("GET", ROUTES, None);
        assert_eq!(code, 400);
        assert!(body.contains("invalid traversal path"));
    }

    #[test]
    fn test_requests_are_recorded() {
        let plane = InMemoryControlPlane::new();
        plane.handle("GET", "/config/", None);
        plane.handle("DELETE", "/id/x", None);
        let methods: Vec<String> = plane.requests().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec!["GET", "DELETE"]);
        plane.clear_requests();
        assert!(plane.requests().is_empty());
    }
}
