use std::fs;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Certificate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::credentials::{Credentials, TlsVerification};
use crate::{ClientOptions, EvalHubError, Result, RetryPolicy};

/// Versioned API prefix appended to the base URL.
pub const API_PREFIX: &str = "/api/v1";

/// Idle keep-alive connections kept per host.
pub(crate) const POOL_MAX_IDLE_PER_HOST: usize = 5;

/// Requests one client keeps in flight at once; further calls queue.
pub const MAX_CONNECTIONS: usize = 20;

/// Counting limiter for the blocking client, the thread-parking
/// counterpart of the async client's `tokio::sync::Semaphore`.
#[derive(Debug)]
pub(crate) struct ConnectionLimiter {
    in_use: Mutex<usize>,
    released: Condvar,
    limit: usize,
}

impl ConnectionLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            in_use: Mutex::new(0),
            released: Condvar::new(),
            limit: limit.max(1),
        }
    }

    /// Blocks until a slot is free. The slot is returned when the permit drops.
    pub fn acquire(&self) -> ConnectionPermit<'_> {
        let mut in_use = self.in_use.lock();
        while *in_use >= self.limit {
            self.released.wait(&mut in_use);
        }
        *in_use += 1;
        ConnectionPermit { limiter: self }
    }
}

pub(crate) struct ConnectionPermit<'a> {
    limiter: &'a ConnectionLimiter,
}

impl Drop for ConnectionPermit<'_> {
    fn drop(&mut self) {
        *self.limiter.in_use.lock() -= 1;
        self.limiter.released.notify_one();
    }
}

/// Query parameters and JSON body for one logical request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Appends a query parameter when `value` is present.
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Serializes `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|err| EvalHubError::Encode(format!("request body: {err}")))?;
        self.json = Some(value);
        Ok(self)
    }
}

/// Everything a client needs from [`ClientOptions`], resolved once.
pub(crate) struct Prepared {
    pub base_url: String,
    pub api_base: String,
    pub credentials: Credentials,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub headers: HeaderMap,
    pub tls: TlsVerification,
    pub root_certs: Vec<Certificate>,
}

impl Prepared {
    pub fn from_options(options: &ClientOptions) -> Result<Self> {
        let base_url = options.base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(EvalHubError::Config("base URL cannot be empty".to_owned()));
        }
        let api_base = format!("{base_url}{API_PREFIX}");

        let credentials = Credentials::resolve(options);
        let headers = default_headers(credentials.bearer_token.as_deref())?;
        let tls = credentials.tls();
        let root_certs = match &tls {
            TlsVerification::CaBundle(path) => load_ca_bundle(path)?,
            _ => Vec::new(),
        };

        Ok(Self {
            base_url,
            api_base,
            credentials,
            retry: options.retry.clone(),
            timeout: options.timeout,
            headers,
            tls,
            root_certs,
        })
    }
}

fn default_headers(token: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            EvalHubError::Config("bearer token contains invalid header characters".to_owned())
        })?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
        debug!("HTTP client configured with bearer token authentication");
    }

    Ok(headers)
}

fn load_ca_bundle(path: &std::path::Path) -> Result<Vec<Certificate>> {
    let pem = fs::read(path).map_err(|err| EvalHubError::io(path, err))?;
    let certs = Certificate::from_pem_bundle(&pem).map_err(|err| {
        EvalHubError::Config(format!("invalid CA bundle {}: {err}", path.display()))
    })?;
    if certs.is_empty() {
        return Err(EvalHubError::Config(format!(
            "CA bundle {} contains no certificates",
            path.display()
        )));
    }
    Ok(certs)
}

/// Joins an API-relative path onto `api_base`.
pub(crate) fn join(api_base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{api_base}{path}")
    } else {
        format!("{api_base}/{path}")
    }
}

pub(crate) fn decode_json<T: DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|err| {
        EvalHubError::Decode(format!("invalid response JSON from {url}: {err}; body: {body}"))
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use reqwest::header;
    use tempfile::TempDir;

    use super::{decode_json, join, ConnectionLimiter, Prepared, RequestOptions};
    use crate::credentials::{TlsVerification, WellKnownPaths};
    use crate::{ClientOptions, EvalHubError};

    fn options(base_url: &str) -> ClientOptions {
        ClientOptions::new(base_url).with_well_known_paths(WellKnownPaths::none())
    }

    #[test]
    fn api_base_strips_trailing_slash() {
        let prepared = Prepared::from_options(&options("http://svc:8080/")).expect("prepare");
        assert_eq!(prepared.base_url, "http://svc:8080");
        assert_eq!(prepared.api_base, "http://svc:8080/api/v1");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let err = Prepared::from_options(&options("  ")).err().expect("must fail");
        assert!(matches!(err, EvalHubError::Config(_)));
    }

    #[test]
    fn bearer_header_only_with_token() {
        let prepared = Prepared::from_options(&options("http://svc")).expect("prepare");
        assert!(prepared.headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(
            prepared.headers.get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"application/json"[..])
        );

        let prepared =
            Prepared::from_options(&options("http://svc").with_token("abc")).expect("prepare");
        let auth = prepared
            .headers
            .get(header::AUTHORIZATION)
            .expect("authorization header");
        assert_eq!(auth.as_bytes(), b"Bearer abc");
        assert!(auth.is_sensitive());
    }

    #[test]
    fn invalid_ca_bundle_is_a_config_error() {
        let dir = TempDir::new().expect("tempdir");
        let bundle = dir.path().join("bad.pem");
        fs::write(&bundle, "not a certificate").expect("write");

        let err = Prepared::from_options(&options("https://svc").with_ca_bundle(&bundle))
            .err()
            .expect("must fail");
        assert!(matches!(err, EvalHubError::Config(_)));
    }

    #[test]
    fn insecure_mode_loads_no_certificates() {
        let dir = TempDir::new().expect("tempdir");
        let bundle = dir.path().join("bad.pem");
        fs::write(&bundle, "not a certificate").expect("write");

        let prepared = Prepared::from_options(
            &options("https://svc")
                .with_ca_bundle(&bundle)
                .with_insecure(true),
        )
        .expect("insecure mode never reads the bundle");
        assert_eq!(prepared.tls, TlsVerification::Disabled);
        assert!(prepared.root_certs.is_empty());
    }

    #[test]
    fn join_handles_missing_leading_slash() {
        assert_eq!(join("http://s/api/v1", "/health"), "http://s/api/v1/health");
        assert_eq!(join("http://s/api/v1", "jobs"), "http://s/api/v1/jobs");
    }

    #[test]
    fn request_options_collect_query_and_body() {
        let opts = RequestOptions::new()
            .query("limit", 10)
            .query_opt("status", None::<&str>)
            .query_opt("category", Some("math"))
            .json(&serde_json::json!({"a": 1}))
            .expect("encode");
        assert_eq!(
            opts.query,
            vec![
                ("limit".to_owned(), "10".to_owned()),
                ("category".to_owned(), "math".to_owned())
            ]
        );
        assert_eq!(opts.json, Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn decode_error_mentions_body() {
        let err = decode_json::<serde_json::Value>("http://s/x", "not json")
            .expect_err("must fail");
        match err {
            EvalHubError::Decode(message) => assert!(message.contains("not json")),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn limiter_caps_concurrent_holders() {
        let limiter = Arc::new(ConnectionLimiter::new(3));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..12)
            .map(|_| {
                let (limiter, current, peak) = (limiter.clone(), current.clone(), peak.clone());
                thread::spawn(move || {
                    let _permit = limiter.acquire();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    current.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }

        assert!((1..=3).contains(&peak.load(Ordering::SeqCst)));
        assert_eq!(*limiter.in_use.lock(), 0);
    }
}
