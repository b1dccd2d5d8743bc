//! `evalhub-sdk` is a client SDK for the EvalHub benchmark-evaluation service.
//!
//! It provides:
//! - [`EvalHubClient`] (async) and [`BlockingEvalHubClient`] over the
//!   `/api/v1` REST surface, with bearer-token auth, CA bundle detection and
//!   exponential-backoff retry
//! - typed request/response models ([`EvaluationRequest`], [`EvaluationJob`], ...)
//! - with the `adapter` feature, the [`adapter`] runtime that framework
//!   integrations use to run a single job and report back to the service

mod blocking;
mod client;
mod endpoints;
mod error;
mod models;
mod options;
mod transport;

#[cfg(test)]
mod log_capture;

pub mod credentials;
pub mod retry;

#[cfg(feature = "adapter")]
pub mod adapter;

pub use blocking::BlockingEvalHubClient;
pub use client::EvalHubClient;
pub use credentials::{Credentials, TlsVerification, WellKnownPaths};
pub use endpoints::{BenchmarkFilter, JobFilter};
pub use error::EvalHubError;
pub use models::{
    Benchmark, BenchmarkReference, BenchmarksList, Collection, CollectionList, ErrorResponse,
    EvaluationJob, EvaluationRequest, EvaluationResponse, EvaluationResult, EvaluationStatus,
    HealthStatus, JobStatus, JobsList, MetricValue, ModelConfig, Provider, ProviderList, Resource,
};
pub use options::{ClientOptions, RetryPolicy, DEFAULT_BASE_URL};
pub use retry::calculate_retry_delay;
pub use transport::{RequestOptions, API_PREFIX, MAX_CONNECTIONS};

/// Resource handles borrowed from a client, e.g. `client.jobs()`.
pub mod resources {
    pub use crate::client::{Benchmarks, Collections, Jobs, Providers};

    /// Blocking counterparts of the async resource handles.
    pub mod blocking {
        pub use crate::blocking::{Benchmarks, Collections, Jobs, Providers};
    }
}

pub use reqwest::Method;

pub type Result<T> = std::result::Result<T, EvalHubError>;
