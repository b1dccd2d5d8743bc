#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use evalhub_sdk::{ClientOptions, RetryPolicy, WellKnownPaths};
use serde_json::{json, Value as JsonValue};
use tokio::sync::oneshot;

#[derive(Clone)]
pub struct MockResponse {
    pub status: StatusCode,
    pub body: JsonValue,
    pub delay: Duration,
}

impl MockResponse {
    pub fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body,
            delay: Duration::from_millis(0),
        }
    }

    pub fn ok(body: JsonValue) -> Self {
        Self::json(StatusCode::OK, body)
    }

    pub fn status(status: StatusCode) -> Self {
        Self::json(status, json!({"error": status.as_u16()}))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One request as seen by the mock server.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> JsonValue {
        serde_json::from_str(&self.body).expect("request body must be JSON")
    }
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    hits: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// Counts a request as open until the handler finishes or is dropped.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let open = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak_in_flight.fetch_max(open, Ordering::SeqCst);
    let _open = InFlight(state.in_flight.clone());
    state
        .requests
        .lock()
        .expect("request log mutex must not be poisoned")
        .push(Recorded {
            method,
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (response.status, Json(response.body))
}

pub struct TestServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    peak_in_flight: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl TestServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Most requests the server was handling at the same moment.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests
            .lock()
            .expect("request log mutex must not be poisoned")
            .clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("server saw no requests")
    }

    /// Options pointing at this server with fast, non-jittered retries and no
    /// credential auto-detection.
    pub fn options(&self) -> ClientOptions {
        ClientOptions::new(&self.base_url)
            .with_well_known_paths(WellKnownPaths::none())
            .with_retry(fast_retry(2))
    }
}

pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(max_retries)
        .with_initial_delay(Duration::from_millis(50))
        .with_backoff_factor(2.0)
        .with_randomize(false)
}

fn state(responses: Vec<MockResponse>) -> MockState {
    MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        requests: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
        in_flight: Arc::new(AtomicUsize::new(0)),
        peak_in_flight: Arc::new(AtomicUsize::new(0)),
    }
}

fn server(state: &MockState, base_url: String, shutdown: oneshot::Sender<()>) -> TestServer {
    TestServer {
        base_url,
        hits: state.hits.clone(),
        requests: state.requests.clone(),
        peak_in_flight: state.peak_in_flight.clone(),
        shutdown: Some(shutdown),
    }
}

/// Serves `responses` in order on the current runtime.
pub async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = state(responses);
    let app = Router::new().fallback(handler).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .expect("mock server must run");
    });

    server(&state, format!("http://{address}"), tx)
}

/// Serves `responses` from a dedicated thread, for blocking-client tests that
/// must not run inside a runtime.
pub fn spawn_server_thread(responses: Vec<MockResponse>) -> TestServer {
    let state = state(responses);
    let app = Router::new().fallback(handler).with_state(state.clone());

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind test listener");
    listener
        .set_nonblocking(true)
        .expect("listener must support non-blocking mode");
    let address = listener.local_addr().expect("must have local addr");
    let (tx, rx) = oneshot::channel::<()>();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("mock runtime must build");
        runtime.block_on(async move {
            let listener =
                tokio::net::TcpListener::from_std(listener).expect("must adopt listener");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .expect("mock server must run");
        });
    });

    server(&state, format!("http://{address}"), tx)
}

/// Address nothing is listening on.
pub fn refused_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);
    format!("http://{address}")
}

pub fn job_body(id: &str, status: &str) -> JsonValue {
    json!({
        "id": id,
        "status": status,
        "request": {
            "benchmark_id": "mmlu",
            "model": {"name": "llama", "url": "http://model:8000"}
        },
        "submitted_at": "2025-01-01T00:00:00Z"
    })
}
