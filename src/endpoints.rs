//! API-relative paths and query filters shared by both client variants.

use crate::{JobStatus, RequestOptions};

pub(crate) const PROVIDERS: &str = "/evaluations/providers";
pub(crate) const BENCHMARKS: &str = "/evaluations/benchmarks";
pub(crate) const COLLECTIONS: &str = "/evaluations/collections";
pub(crate) const JOBS: &str = "/evaluations/jobs";

/// Health lives outside the versioned prefix.
pub(crate) const HEALTH: &str = "/health";

pub(crate) fn provider(id: &str) -> String {
    format!("{PROVIDERS}/{}", urlencoding::encode(id))
}

pub(crate) fn collection(id: &str) -> String {
    format!("{COLLECTIONS}/{}", urlencoding::encode(id))
}

pub(crate) fn job(id: &str) -> String {
    format!("{JOBS}/{}", urlencoding::encode(id))
}

pub(crate) fn job_results(id: &str) -> String {
    format!("{}/results", job(id))
}

pub(crate) fn job_update(id: &str) -> String {
    format!("{}/update", job(id))
}

/// Narrows `benchmarks().list(..)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BenchmarkFilter {
    pub category: Option<String>,
    pub provider_id: Option<String>,
}

impl BenchmarkFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn provider(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: Some(provider_id.into()),
            ..Self::default()
        }
    }

    pub(crate) fn to_options(&self) -> RequestOptions {
        RequestOptions::new()
            .query_opt("category", self.category.as_deref())
            .query_opt("provider_id", self.provider_id.as_deref())
    }
}

/// Narrows `jobs().list(..)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: Option<u32>,
}

impl JobFilter {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn to_options(&self) -> RequestOptions {
        RequestOptions::new()
            .query_opt("status", self.status.map(JobStatus::as_str))
            .query_opt("limit", self.limit)
    }
}
