//! Blocking client with the same surface as [`EvalHubClient`](crate::EvalHubClient).
//!
//! Retry waits stall the calling thread. Do not construct or drop a
//! [`BlockingEvalHubClient`] from inside an async runtime.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::credentials::{Credentials, TlsVerification};
use crate::endpoints::{self, BenchmarkFilter, JobFilter};
use crate::retry::{RetryLoop, Step};
use crate::transport::{
    decode_json, join, ConnectionLimiter, Prepared, RequestOptions, MAX_CONNECTIONS,
    POOL_MAX_IDLE_PER_HOST,
};
use crate::{
    Benchmark, BenchmarksList, ClientOptions, Collection, CollectionList, EvalHubError,
    EvaluationJob, EvaluationRequest, EvaluationResponse, HealthStatus, JobsList, Provider,
    ProviderList, Result, RetryPolicy,
};

#[derive(Clone)]
pub struct BlockingEvalHubClient {
    inner: Arc<BlockingInner>,
}

struct BlockingInner {
    http: RwLock<Option<reqwest::blocking::Client>>,
    base_url: String,
    api_base: String,
    credentials: Credentials,
    retry: RetryPolicy,
    limiter: ConnectionLimiter,
}

impl fmt::Debug for BlockingEvalHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingEvalHubClient")
            .field("base_url", &self.inner.base_url)
            .field("credentials", &self.inner.credentials)
            .field("retry", &self.inner.retry)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl BlockingEvalHubClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let prepared = Prepared::from_options(&options)?;

        let mut builder = reqwest::blocking::Client::builder()
            .timeout(prepared.timeout)
            .default_headers(prepared.headers)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST);
        match prepared.tls {
            TlsVerification::Disabled => builder = builder.danger_accept_invalid_certs(true),
            TlsVerification::CaBundle(_) => {
                builder = builder.tls_built_in_root_certs(false);
                for cert in prepared.root_certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
            TlsVerification::SystemDefault => {}
        }
        let http = builder.build().map_err(EvalHubError::Transport)?;

        debug!(base_url = %prepared.base_url, "blocking EvalHub client initialised");
        Ok(Self {
            inner: Arc::new(BlockingInner {
                http: RwLock::new(Some(http)),
                base_url: prepared.base_url,
                api_base: prepared.api_base,
                credentials: prepared.credentials,
                retry: prepared.retry,
                limiter: ConnectionLimiter::new(MAX_CONNECTIONS),
            }),
        })
    }

    pub fn from_defaults() -> Result<Self> {
        Self::new(ClientOptions::default())
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn api_base(&self) -> &str {
        &self.inner.api_base
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    pub fn close(&self) {
        if self.inner.http.write().take().is_some() {
            debug!(base_url = %self.inner.base_url, "blocking EvalHub client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.http.read().is_none()
    }

    pub fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<reqwest::blocking::Response> {
        let url = join(&self.inner.api_base, path);
        self.execute(method, url, &options)
    }

    pub fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let url = join(&self.inner.api_base, path);
        let response = self.execute(method, url.clone(), &options)?;
        let body = response.text().map_err(EvalHubError::Transport)?;
        decode_json(&url, &body)
    }

    pub fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}{}", self.inner.base_url, endpoints::HEALTH);
        let response = self.execute(Method::GET, url.clone(), &RequestOptions::default())?;
        let body = response.text().map_err(EvalHubError::Transport)?;
        decode_json(&url, &body)
    }

    pub fn providers(&self) -> Providers<'_> {
        Providers { client: self }
    }

    pub fn benchmarks(&self) -> Benchmarks<'_> {
        Benchmarks { client: self }
    }

    pub fn collections(&self) -> Collections<'_> {
        Collections { client: self }
    }

    pub fn jobs(&self) -> Jobs<'_> {
        Jobs { client: self }
    }

    fn http(&self) -> Result<reqwest::blocking::Client> {
        self.inner.http.read().clone().ok_or(EvalHubError::Closed)
    }

    fn execute(
        &self,
        method: Method,
        url: String,
        options: &RequestOptions,
    ) -> Result<reqwest::blocking::Response> {
        let http = self.http()?;
        let mut retry = RetryLoop::new(&self.inner.retry, method.clone(), url.as_str());
        loop {
            let result = {
                let _permit = self.inner.limiter.acquire();
                send_once(&http, &method, &url, options)
            };
            match retry.record(result) {
                Step::Done(result) => return result,
                Step::Wait(delay) => thread::sleep(delay),
            }
        }
    }
}

fn send_once(
    http: &reqwest::blocking::Client,
    method: &Method,
    url: &str,
    options: &RequestOptions,
) -> Result<reqwest::blocking::Response> {
    let mut builder = http.request(method.clone(), url);
    if !options.query.is_empty() {
        builder = builder.query(&options.query);
    }
    if let Some(body) = &options.json {
        builder = builder.json(body);
    }

    let response = builder.send().map_err(EvalHubError::Transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(EvalHubError::Http {
        status: status.as_u16(),
        body,
    })
}

#[derive(Clone, Copy, Debug)]
pub struct Providers<'a> {
    client: &'a BlockingEvalHubClient,
}

impl Providers<'_> {
    pub fn list(&self) -> Result<ProviderList> {
        self.client
            .request_json(Method::GET, endpoints::PROVIDERS, RequestOptions::new())
    }

    pub fn get(&self, provider_id: &str) -> Result<Provider> {
        self.client.request_json(
            Method::GET,
            &endpoints::provider(provider_id),
            RequestOptions::new(),
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Benchmarks<'a> {
    client: &'a BlockingEvalHubClient,
}

impl Benchmarks<'_> {
    pub fn list(&self, filter: &BenchmarkFilter) -> Result<Vec<Benchmark>> {
        let list: BenchmarksList =
            self.client
                .request_json(Method::GET, endpoints::BENCHMARKS, filter.to_options())?;
        Ok(list.items)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Collections<'a> {
    client: &'a BlockingEvalHubClient,
}

impl Collections<'_> {
    pub fn list(&self) -> Result<CollectionList> {
        self.client
            .request_json(Method::GET, endpoints::COLLECTIONS, RequestOptions::new())
    }

    pub fn get(&self, collection_id: &str) -> Result<Collection> {
        self.client.request_json(
            Method::GET,
            &endpoints::collection(collection_id),
            RequestOptions::new(),
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Jobs<'a> {
    client: &'a BlockingEvalHubClient,
}

impl Jobs<'_> {
    pub fn submit(&self, request: &EvaluationRequest) -> Result<EvaluationJob> {
        let job: EvaluationJob = self.client.request_json(
            Method::POST,
            endpoints::JOBS,
            RequestOptions::new().json(request)?,
        )?;
        info!(job_id = %job.id, benchmark_id = %request.benchmark_id, "submitted evaluation job");
        Ok(job)
    }

    pub fn get(&self, job_id: &str) -> Result<EvaluationJob> {
        self.client
            .request_json(Method::GET, &endpoints::job(job_id), RequestOptions::new())
    }

    pub fn list(&self, filter: &JobFilter) -> Result<JobsList> {
        self.client
            .request_json(Method::GET, endpoints::JOBS, filter.to_options())
    }

    pub fn cancel(&self, job_id: &str) -> Result<()> {
        self.client
            .request(Method::DELETE, &endpoints::job(job_id), RequestOptions::new())?;
        info!(job_id, "cancelled evaluation job");
        Ok(())
    }

    pub fn results(&self, job_id: &str) -> Result<EvaluationResponse> {
        self.client.request_json(
            Method::GET,
            &endpoints::job_results(job_id),
            RequestOptions::new(),
        )
    }

    pub fn wait_for_completion(
        &self,
        job_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<EvaluationJob> {
        let started = Instant::now();
        loop {
            let job = self.get(job_id)?;
            if job.status.is_terminal() {
                return Ok(job);
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(EvalHubError::WaitTimeout {
                    job_id: job_id.to_owned(),
                    waited,
                });
            }
            debug!(job_id, status = %job.status, "job still in progress");
            thread::sleep(poll_interval.min(timeout - waited));
        }
    }
}
