use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EvalHubError, EvaluationResult, JobStatus, ModelConfig, Result};

/// Execution phases reported alongside a [`JobStatus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Initializing,
    LoadingData,
    RunningEvaluation,
    PostProcessing,
    PersistingArtifacts,
    Completed,
}

fn default_timeout_seconds() -> Option<u64> {
    Some(3600)
}

/// Job specification mounted into the job pod at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: String,
    pub benchmark_id: String,
    pub model: ModelConfig,
    /// `None` evaluates every example.
    #[serde(default)]
    pub num_examples: Option<u64>,
    #[serde(default)]
    pub benchmark_config: Map<String, Value>,
    #[serde(default)]
    pub experiment_name: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: Option<u64>,
    /// Service (or sidecar) base URL that receives status updates.
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl JobSpec {
    /// Reads and parses a JSON job spec.
    ///
    /// A missing or unreadable file is [`EvalHubError::Io`]; malformed JSON or
    /// a schema mismatch is [`EvalHubError::JobSpec`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| EvalHubError::io(path, err))?;
        serde_json::from_str(&raw)
            .map_err(|err| EvalHubError::JobSpec(format!("{}: {err}", path.display())))
    }
}

/// Progress report sent through [`JobCallbacks::report_status`](super::JobCallbacks::report_status).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobStatusUpdate {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<JobPhase>,
    /// Fraction complete in `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Map<String, Value>>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl JobStatusUpdate {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            phase: None,
            progress: None,
            message: None,
            current_step: None,
            total_steps: None,
            completed_steps: None,
            error_message: None,
            error_details: None,
            timestamp: Utc::now(),
        }
    }

    /// A `failed` update carrying `error_message`.
    pub fn failed(error_message: impl Into<String>) -> Self {
        let mut update = Self::new(JobStatus::Failed);
        update.error_message = Some(error_message.into());
        update
    }

    pub fn with_phase(mut self, phase: JobPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_steps(mut self, completed: u32, total: u32) -> Self {
        self.completed_steps = Some(completed);
        self.total_steps = Some(total);
        self
    }
}

/// Files to package as an OCI artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OciArtifactSpec {
    /// Files or directories; directories are included recursively.
    pub files: Vec<PathBuf>,
    /// Root that artifact entry names are made relative to.
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub job_id: String,
    pub benchmark_id: String,
    pub model_name: String,
}

impl OciArtifactSpec {
    pub fn new(spec: &JobSpec, files: Vec<PathBuf>) -> Self {
        Self {
            files,
            base_path: None,
            title: None,
            description: None,
            annotations: BTreeMap::new(),
            job_id: spec.job_id.clone(),
            benchmark_id: spec.benchmark_id.clone(),
            model_name: spec.model.name.clone(),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }
}

/// Where an artifact ended up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OciArtifactResult {
    /// `sha256:<hex>`.
    pub digest: String,
    /// `<oci_ref>@<digest>`.
    pub reference: String,
    pub size_bytes: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Outcome of one benchmark run, returned by a
/// [`FrameworkAdapter`](super::FrameworkAdapter).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobResults {
    pub job_id: String,
    pub benchmark_id: String,
    pub model_name: String,
    pub results: Vec<EvaluationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    pub num_examples_evaluated: u64,
    pub duration_seconds: f64,
    #[serde(default = "Utc::now")]
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub evaluation_metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oci_artifact: Option<OciArtifactResult>,
}
