//! ControlApiClient against a fake admin API over HTTP.

mod common;

use std::time::Duration;

use axum::http::Method;
use common::{closed_url, fast_retry, FakeAdmin};
use serde_json::json;
use wsp_ingress::control_api::{get_config_json, get_json};
use wsp_ingress::{ConfigPaths, ControlApiClient, ControlPlane, IngressError, RouteManager};

#[test]
fn get_of_missing_key_decodes_as_default() {
    let admin = FakeAdmin::start();
    let client = admin.client();

    let apps: Vec<serde_json::Value> = get_json(&client, "/config/apps").unwrap();
    assert!(apps.is_empty());
    assert!(client.is_reachable());
}

#[test]
fn routes_of_fresh_instance_read_as_empty() {
    let admin = FakeAdmin::start();
    let client = admin.client();
    let routes_path = ConfigPaths::default().routes();

    let err = get_json::<Vec<serde_json::Value>>(&client, &routes_path).unwrap_err();
    assert_eq!(err.status_code(), Some(400));

    let routes: Vec<serde_json::Value> = get_config_json(&client, &routes_path).unwrap();
    assert!(routes.is_empty());
    assert!(RouteManager::new(&client, ConfigPaths::default())
        .list_routes()
        .unwrap()
        .is_empty());
}

#[test]
fn error_status_carries_code_and_body() {
    let admin = FakeAdmin::start();
    let client = admin.client();

    client.put("/config/apps", &json!({})).unwrap();
    let err = client.put("/config/apps", &json!({})).unwrap_err();

    match &err {
        IngressError::Status { method, code, .. } => {
            assert_eq!(method, "PUT");
            assert_eq!(*code, 409);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status_code(), Some(409));
    assert!(!err.is_retryable());
}

#[test]
fn deleting_unknown_id_succeeds() {
    let admin = FakeAdmin::start();
    admin.client().delete_id("route_nothing_here").unwrap();
}

#[test]
fn timed_out_post_is_not_retried() {
    let admin = FakeAdmin::start_slow(Method::POST, Duration::from_millis(800));
    let client = admin.client_with_timeout(Duration::from_millis(200));

    let err = client
        .post("/config/apps/http/servers/srv0/routes/...", &json!([{"@id": "r"}]))
        .unwrap_err();

    assert!(matches!(err, IngressError::Transport { retryable: false, .. }));
    assert_eq!(admin.hits(), 1);
}

#[test]
fn timed_out_get_is_retried_up_to_limit() {
    let admin = FakeAdmin::start_slow(Method::GET, Duration::from_millis(800));
    let client = admin.client_with_timeout(Duration::from_millis(200));

    let err = client.get("/config/").unwrap_err();

    assert!(err.is_unreachable());
    assert_eq!(admin.hits() as u32, fast_retry().max_attempts);
}

#[test]
fn unreachable_api_reports_transport_failure() {
    let client =
        ControlApiClient::new(&closed_url(), Duration::from_secs(2), fast_retry()).unwrap();
    assert!(!client.is_reachable());

    let manager = RouteManager::new(&client, ConfigPaths::default());
    let err = manager.add_route("app.example.com", "app:8080").unwrap_err();
    assert!(err.is_unreachable());
}

#[test]
fn routes_written_over_http_are_listed_back() {
    let admin = FakeAdmin::start();
    let client = admin.client();
    client.put(&ConfigPaths::default().routes(), &json!([])).unwrap();
    let manager = RouteManager::new(&client, ConfigPaths::default());

    manager.add_route("one.example.com", "one:80").unwrap();
    manager.add_route("two.example.com", "two:80").unwrap();
    manager.add_route("one.example.com", "one:81").unwrap();

    let routes = manager.list_routes().unwrap();
    assert_eq!(routes.len(), 2);
    let one = routes
        .iter()
        .find(|r| r.hosts == vec!["one.example.com".to_string()])
        .unwrap();
    assert_eq!(one.upstreams, vec!["one:81".to_string()]);
}
