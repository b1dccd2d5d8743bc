//! Request and response records mirroring the service's REST schema.
//!
//! List envelopes accept both the server's field names (`providers`,
//! `total_providers`, ...) and the normalized `items` / `total_count`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Standard job status values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// `true` once the job can no longer change status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluation-specific progress states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Initializing,
    LoadingModel,
    LoadingDataset,
    Evaluating,
    Scoring,
    Finalizing,
}

/// Configuration for the model being evaluated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model parameters such as temperature or max_tokens.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    /// Fields the schema does not name are kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns a copy whose parameters are `defaults` overridden by this
    /// config's own parameters.
    pub fn merge_with_defaults(&self, defaults: &Map<String, Value>) -> Self {
        let mut parameters = defaults.clone();
        for (key, value) in &self.parameters {
            parameters.insert(key.clone(), value.clone());
        }
        Self {
            parameters,
            ..self.clone()
        }
    }
}

/// An evaluation provider (a framework exposing benchmarks).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub benchmarks: Vec<Benchmark>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderList {
    #[serde(default, alias = "providers")]
    pub items: Vec<Provider>,
    #[serde(default, alias = "total_providers")]
    pub total_count: u64,
}

/// A benchmark offered by a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    #[serde(alias = "benchmark_id")]
    pub id: String,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub num_few_shot: Option<u32>,
    #[serde(default)]
    pub dataset_size: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarksList {
    #[serde(default, alias = "benchmarks")]
    pub items: Vec<Benchmark>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Points at a benchmark of a specific provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkReference {
    pub benchmark_id: String,
    #[serde(default)]
    pub provider_id: Option<String>,
}

/// Identity and bookkeeping shared by server-managed resources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A named group of benchmarks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub resource: Resource,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionList {
    #[serde(default, alias = "collections")]
    pub items: Vec<Collection>,
    #[serde(default, alias = "total_collections")]
    pub total_count: u64,
}

fn default_random_seed() -> Option<u64> {
    Some(42)
}

/// Request to run an evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub benchmark_id: String,
    pub model: ModelConfig,
    /// Number of examples to evaluate; `None` evaluates all of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_examples: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_few_shot: Option<u32>,
    #[serde(default = "default_random_seed")]
    pub random_seed: Option<u64>,
    #[serde(default)]
    pub benchmark_config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Higher runs first.
    #[serde(default)]
    pub priority: i32,
}

impl EvaluationRequest {
    pub fn new(benchmark_id: impl Into<String>, model: ModelConfig) -> Self {
        Self {
            benchmark_id: benchmark_id.into(),
            model,
            num_examples: None,
            num_few_shot: None,
            random_seed: default_random_seed(),
            benchmark_config: Map::new(),
            experiment_name: None,
            tags: BTreeMap::new(),
            priority: 0,
        }
    }
}

/// A metric value as reported by an evaluation framework.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// Numeric view of the value, when it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }
}

fn default_metric_type() -> String {
    "float".to_owned()
}

/// One metric from an evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub metric_name: String,
    pub metric_value: MetricValue,
    #[serde(default = "default_metric_type")]
    pub metric_type: String,
    /// 95% confidence interval, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_samples: Option<u64>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EvaluationResult {
    pub fn new(metric_name: impl Into<String>, metric_value: MetricValue) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_value,
            metric_type: default_metric_type(),
            confidence_interval: None,
            num_samples: None,
            metadata: Map::new(),
        }
    }
}

/// Evaluation job as tracked by the service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationJob {
    #[serde(alias = "job_id")]
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub evaluation_status: Option<EvaluationStatus>,
    pub request: EvaluationRequest,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Fraction complete, 0.0 to 1.0.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub total_steps: Option<u32>,
    #[serde(default)]
    pub completed_steps: Option<u32>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_details: Option<Map<String, Value>>,
    #[serde(default)]
    pub estimated_duration: Option<u64>,
    #[serde(default)]
    pub actual_duration: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobsList {
    #[serde(default, alias = "jobs")]
    pub items: Vec<EvaluationJob>,
    #[serde(default, alias = "total_jobs")]
    pub total_count: u64,
}

/// Final results of an evaluation job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub job_id: String,
    pub benchmark_id: String,
    pub model_name: String,
    pub results: Vec<EvaluationResult>,
    #[serde(default)]
    pub overall_score: Option<f64>,
    pub num_examples_evaluated: u64,
    #[serde(default)]
    pub evaluation_metadata: Map<String, Value>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// Body of `GET /health`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Standard error payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub error_message: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub details: Option<Map<String, Value>>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        BenchmarksList, CollectionList, EvaluationJob, EvaluationRequest, EvaluationResult,
        HealthStatus, JobStatus, JobsList, MetricValue, ModelConfig, ProviderList,
    };

    #[test]
    fn provider_list_accepts_server_and_normalized_fields() {
        let server: ProviderList = serde_json::from_value(json!({
            "providers": [{"id": "lm_eval", "label": "LM Evaluation Harness"}],
            "total_providers": 1
        }))
        .expect("server shape");
        assert_eq!(server.total_count, 1);
        assert_eq!(server.items[0].id, "lm_eval");

        let normalized: ProviderList = serde_json::from_value(json!({
            "items": [{"id": "ragas", "label": "RAGAS"}],
            "total_count": 1
        }))
        .expect("normalized shape");
        assert_eq!(normalized.items[0].label.as_deref(), Some("RAGAS"));
    }

    #[test]
    fn benchmarks_list_maps_benchmark_id() {
        let list: BenchmarksList = serde_json::from_value(json!({
            "benchmarks": [{
                "benchmark_id": "mmlu",
                "provider_id": "lm_eval",
                "name": "MMLU",
                "category": "knowledge",
                "metrics": ["accuracy"],
                "num_few_shot": 5
            }],
            "total_count": 1,
            "providers": [],
            "categories": []
        }))
        .expect("benchmarks");
        assert_eq!(list.items[0].id, "mmlu");
        assert_eq!(list.items[0].name.as_deref(), Some("MMLU"));
        assert_eq!(list.items[0].num_few_shot, Some(5));
    }

    #[test]
    fn collection_and_jobs_lists_parse_server_shapes() {
        let collections: CollectionList = serde_json::from_value(json!({
            "collections": [{
                "resource": {"id": "healthcare_v1", "created_at": "2026-01-27T12:00:00Z"},
                "name": "Healthcare Safety v1",
                "benchmarks": [{"benchmark_id": "medqa", "provider_id": "lm_eval"}]
            }],
            "total_collections": 1
        }))
        .expect("collections");
        assert_eq!(collections.items[0].resource.id, "healthcare_v1");
        assert_eq!(collections.items[0].benchmarks.len(), 1);

        let jobs: JobsList = serde_json::from_value(json!({
            "jobs": [{
                "id": "job-123",
                "status": "completed",
                "request": {"benchmark_id": "mmlu", "model": {"name": "m", "url": "http://m"}},
                "submitted_at": "2026-01-27T12:00:00Z"
            }],
            "total_jobs": 1
        }))
        .expect("jobs");
        assert_eq!(jobs.total_count, 1);
        assert_eq!(jobs.items[0].status, JobStatus::Completed);
        assert_eq!(jobs.items[0].request.random_seed, Some(42));
    }

    #[test]
    fn job_accepts_legacy_job_id() {
        let job: EvaluationJob = serde_json::from_value(json!({
            "job_id": "job_1",
            "status": "pending",
            "request": {"benchmark_id": "b", "model": {"name": "m"}},
            "submitted_at": "2024-01-01T12:00:00Z"
        }))
        .expect("job");
        assert_eq!(job.id, "job_1");
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn request_serializes_defaults_and_skips_empty_options() {
        let request = EvaluationRequest::new("gsm8k", ModelConfig::new("llama").with_url("http://v"));
        let value = serde_json::to_value(&request).expect("encode");
        assert_eq!(value["random_seed"], json!(42));
        assert_eq!(value["priority"], json!(0));
        assert_eq!(value["model"]["url"], json!("http://v"));
        assert!(value.get("num_examples").is_none());
    }

    #[test]
    fn model_config_keeps_unknown_fields_and_merges_defaults() {
        let model: ModelConfig = serde_json::from_value(json!({
            "name": "m",
            "parameters": {"temperature": 0.2},
            "custom_flag": true
        }))
        .expect("model");
        assert_eq!(model.extra.get("custom_flag"), Some(&json!(true)));

        let defaults = json!({"temperature": 1.0, "max_tokens": 64});
        let merged = model.merge_with_defaults(defaults.as_object().expect("object"));
        assert_eq!(merged.parameters["temperature"], json!(0.2));
        assert_eq!(merged.parameters["max_tokens"], json!(64));
    }

    #[test]
    fn metric_values_of_every_kind() {
        let results: Vec<EvaluationResult> = serde_json::from_value(json!([
            {"metric_name": "acc", "metric_value": 0.85},
            {"metric_name": "n", "metric_value": 3, "metric_type": "int"},
            {"metric_name": "ok", "metric_value": true},
            {"metric_name": "grade", "metric_value": "A"}
        ]))
        .expect("results");
        assert_eq!(results[0].metric_value, MetricValue::Float(0.85));
        assert_eq!(results[0].metric_type, "float");
        assert_eq!(results[1].metric_value.as_f64(), Some(3.0));
        assert_eq!(results[2].metric_value, MetricValue::Bool(true));
        assert_eq!(results[3].metric_value, MetricValue::Text("A".to_owned()));
    }

    #[test]
    fn health_status_keeps_extra_fields() {
        let health: HealthStatus =
            serde_json::from_value(json!({"status": "healthy", "version": "1.2"}))
                .expect("health");
        assert_eq!(health.status, "healthy");
        assert_eq!(health.details["version"], json!("1.2"));
    }
}
