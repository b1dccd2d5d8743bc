use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::credentials::{Credentials, TlsVerification};
use crate::endpoints::{self, BenchmarkFilter, JobFilter};
use crate::retry::{RetryLoop, Step};
use crate::transport::{
    decode_json, join, Prepared, RequestOptions, MAX_CONNECTIONS, POOL_MAX_IDLE_PER_HOST,
};
use crate::{
    Benchmark, BenchmarksList, ClientOptions, Collection, CollectionList, EvalHubError,
    EvaluationJob, EvaluationRequest, EvaluationResponse, HealthStatus, JobsList, Provider,
    ProviderList, Result, RetryPolicy,
};

/// Async client for the EvalHub REST API.
///
/// Clones share one connection pool and at most [`MAX_CONNECTIONS`] requests
/// in flight. [`close`](Self::close) releases the pool for every clone;
/// dropping the last clone does the same.
#[derive(Clone)]
pub struct EvalHubClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: RwLock<Option<reqwest::Client>>,
    base_url: String,
    api_base: String,
    credentials: Credentials,
    retry: RetryPolicy,
    limiter: Semaphore,
}

impl fmt::Debug for EvalHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalHubClient")
            .field("base_url", &self.inner.base_url)
            .field("credentials", &self.inner.credentials)
            .field("retry", &self.inner.retry)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EvalHubClient {
    /// Resolves credentials and TLS settings, then builds the connection pool.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use evalhub_sdk::{ClientOptions, EvalHubClient};
    ///
    /// # async fn run() -> evalhub_sdk::Result<()> {
    /// let client = EvalHubClient::new(ClientOptions::new("http://evalhub:8080"))?;
    /// let health = client.health().await?;
    /// println!("{}", health.status);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(options: ClientOptions) -> Result<Self> {
        let prepared = Prepared::from_options(&options)?;

        let mut builder = reqwest::Client::builder()
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

        debug!(base_url = %prepared.base_url, "EvalHub client initialised");
        Ok(Self {
            inner: Arc::new(ClientInner {
                http: RwLock::new(Some(http)),
                base_url: prepared.base_url,
                api_base: prepared.api_base,
                credentials: prepared.credentials,
                retry: prepared.retry,
                limiter: Semaphore::new(MAX_CONNECTIONS),
            }),
        })
    }

    /// Client for [`ClientOptions::default`].
    pub fn from_defaults() -> Result<Self> {
        Self::new(ClientOptions::default())
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// `<base_url>/api/v1`.
    pub fn api_base(&self) -> &str {
        &self.inner.api_base
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// Releases the connection pool. Later calls fail with
    /// [`EvalHubError::Closed`]. Closing twice is a no-op.
    pub fn close(&self) {
        self.inner.limiter.close();
        if self.inner.http.write().take().is_some() {
            debug!(base_url = %self.inner.base_url, "EvalHub client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.http.read().is_none()
    }

    /// Sends `method` to an API-relative `path` with retry.
    ///
    /// Any non-success status is returned as [`EvalHubError::Http`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<reqwest::Response> {
        let url = join(&self.inner.api_base, path);
        self.execute(method, url, &options).await
    }

    /// [`request`](Self::request) and decode the JSON body as `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let url = join(&self.inner.api_base, path);
        let response = self.execute(method, url.clone(), &options).await?;
        let body = response.text().await.map_err(EvalHubError::Transport)?;
        decode_json(&url, &body)
    }

    /// `GET <base_url>/health`.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}{}", self.inner.base_url, endpoints::HEALTH);
        let response = self
            .execute(Method::GET, url.clone(), &RequestOptions::default())
            .await?;
        let body = response.text().await.map_err(EvalHubError::Transport)?;
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

    fn http(&self) -> Result<reqwest::Client> {
        self.inner.http.read().clone().ok_or(EvalHubError::Closed)
    }

    async fn execute(
        &self,
        method: Method,
        url: String,
        options: &RequestOptions,
    ) -> Result<reqwest::Response> {
        let http = self.http()?;
        let mut retry = RetryLoop::new(&self.inner.retry, method.clone(), url.as_str());
        loop {
            let result = {
                let _permit = self
                    .inner
                    .limiter
                    .acquire()
                    .await
                    .map_err(|_| EvalHubError::Closed)?;
                send_once(&http, &method, &url, options).await
            };
            match retry.record(result) {
                Step::Done(result) => return result,
                Step::Wait(delay) => sleep(delay).await,
            }
        }
    }
}

async fn send_once(
    http: &reqwest::Client,
    method: &Method,
    url: &str,
    options: &RequestOptions,
) -> Result<reqwest::Response> {
    let mut builder = http.request(method.clone(), url);
    if !options.query.is_empty() {
        builder = builder.query(&options.query);
    }
    if let Some(body) = &options.json {
        builder = builder.json(body);
    }

    let response = builder.send().await.map_err(EvalHubError::Transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(EvalHubError::Http {
        status: status.as_u16(),
        body,
    })
}

/// `/evaluations/providers`.
#[derive(Clone, Copy, Debug)]
pub struct Providers<'a> {
    client: &'a EvalHubClient,
}

impl Providers<'_> {
    pub async fn list(&self) -> Result<ProviderList> {
        self.client
            .request_json(Method::GET, endpoints::PROVIDERS, RequestOptions::new())
            .await
    }

    pub async fn get(&self, provider_id: &str) -> Result<Provider> {
        self.client
            .request_json(
                Method::GET,
                &endpoints::provider(provider_id),
                RequestOptions::new(),
            )
            .await
    }
}

/// `/evaluations/benchmarks`.
#[derive(Clone, Copy, Debug)]
pub struct Benchmarks<'a> {
    client: &'a EvalHubClient,
}

impl Benchmarks<'_> {
    pub async fn list(&self, filter: &BenchmarkFilter) -> Result<Vec<Benchmark>> {
        let list: BenchmarksList = self
            .client
            .request_json(Method::GET, endpoints::BENCHMARKS, filter.to_options())
            .await?;
        Ok(list.items)
    }
}

/// `/evaluations/collections`.
#[derive(Clone, Copy, Debug)]
pub struct Collections<'a> {
    client: &'a EvalHubClient,
}

impl Collections<'_> {
    pub async fn list(&self) -> Result<CollectionList> {
        self.client
            .request_json(Method::GET, endpoints::COLLECTIONS, RequestOptions::new())
            .await
    }

    pub async fn get(&self, collection_id: &str) -> Result<Collection> {
        self.client
            .request_json(
                Method::GET,
                &endpoints::collection(collection_id),
                RequestOptions::new(),
            )
            .await
    }
}

/// `/evaluations/jobs`.
#[derive(Clone, Copy, Debug)]
pub struct Jobs<'a> {
    client: &'a EvalHubClient,
}

impl Jobs<'_> {
    pub async fn submit(&self, request: &EvaluationRequest) -> Result<EvaluationJob> {
        let job: EvaluationJob = self
            .client
            .request_json(
                Method::POST,
                endpoints::JOBS,
                RequestOptions::new().json(request)?,
            )
            .await?;
        info!(job_id = %job.id, benchmark_id = %request.benchmark_id, "submitted evaluation job");
        Ok(job)
    }

    pub async fn get(&self, job_id: &str) -> Result<EvaluationJob> {
        self.client
            .request_json(Method::GET, &endpoints::job(job_id), RequestOptions::new())
            .await
    }

    pub async fn list(&self, filter: &JobFilter) -> Result<JobsList> {
        self.client
            .request_json(Method::GET, endpoints::JOBS, filter.to_options())
            .await
    }

    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        self.client
            .request(Method::DELETE, &endpoints::job(job_id), RequestOptions::new())
            .await?;
        info!(job_id, "cancelled evaluation job");
        Ok(())
    }

    pub async fn results(&self, job_id: &str) -> Result<EvaluationResponse> {
        self.client
            .request_json(
                Method::GET,
                &endpoints::job_results(job_id),
                RequestOptions::new(),
            )
            .await
    }

    /// Polls the job every `poll_interval` until it reaches a terminal status.
    ///
    /// Fails with [`EvalHubError::WaitTimeout`] once `timeout` has elapsed.
    pub async fn wait_for_completion(
        &self,
        job_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<EvaluationJob> {
        let started = Instant::now();
        loop {
            let job = self.get(job_id).await?;
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
            sleep(poll_interval.min(timeout - waited)).await;
        }
    }
}
