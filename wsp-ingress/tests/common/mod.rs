//! A fake Caddy admin API served over real HTTP.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use serde_json::Value;
use wsp_ingress::fake::InMemoryControlPlane;
use wsp_ingress::{ControlApiClient, RetryPolicy};

struct AdminState {
    plane: Arc<InMemoryControlPlane>,
    hits: Arc<AtomicUsize>,
    slow_method: Option<Method>,
    delay: Duration,
}

pub struct FakeAdmin {
    pub url: String,
    pub plane: Arc<InMemoryControlPlane>,
    hits: Arc<AtomicUsize>,
}

impl FakeAdmin {
    pub fn start() -> Self {
        Self::spawn(None, Duration::ZERO)
    }

    /// Requests with `method` sleep for `delay` before being applied.
    pub fn start_slow(method: Method, delay: Duration) -> Self {
        Self::spawn(Some(method), delay)
    }

    fn spawn(slow_method: Option<Method>, delay: Duration) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let plane = Arc::new(InMemoryControlPlane::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let state = Arc::new(AdminState {
            plane: plane.clone(),
            hits: hits.clone(),
            slow_method,
            delay,
        });

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                let app = Router::new().fallback(admin_handler).with_state(state);
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self { url, plane, hits }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> ControlApiClient {
        ControlApiClient::new(&self.url, Duration::from_secs(5), fast_retry()).unwrap()
    }

    pub fn client_with_timeout(&self, timeout: Duration) -> ControlApiClient {
        ControlApiClient::new(&self.url, timeout, fast_retry()).unwrap()
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 20,
    }
}

/// An address nothing is listening on.
pub fn closed_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn admin_handler(
    State(state): State<Arc<AdminState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if state.slow_method.as_ref() == Some(&method) {
        tokio::time::sleep(state.delay).await;
    }

    let payload = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    [(header::CONTENT_TYPE, "application/json")],
                    serde_json::json!({ "error": e.to_string() }).to_string(),
                )
            }
        }
    };

    let (code, body) = state.plane.handle(method.as_str(), uri.path(), payload);
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}
