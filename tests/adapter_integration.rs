#![cfg(feature = "adapter")]

mod common;

use std::fs;
use std::path::PathBuf;

use axum::http::{Method, StatusCode};
use common::{spawn_server_thread, MockResponse};
use evalhub_sdk::adapter::{
    AdapterSettings, DefaultCallbacks, FrameworkAdapter, JobCallbacks, JobPhase, JobResults,
    JobRunner, JobSpec, JobStatusUpdate, OciArtifactSpec,
};
use evalhub_sdk::{
    BlockingEvalHubClient, EvalHubError, EvaluationResult, JobStatus, MetricValue, Result,
};
use serde_json::json;
use tempfile::TempDir;

fn write_spec(dir: &TempDir, callback_url: &str) -> PathBuf {
    let path = dir.path().join("job.json");
    fs::write(
        &path,
        json!({
            "job_id": "job-42",
            "benchmark_id": "arc_easy",
            "model": {"name": "granite", "url": "http://model:8000"},
            "num_examples": 10,
            "callback_url": callback_url
        })
        .to_string(),
    )
    .expect("write job spec");
    path
}

fn results_for(spec: &JobSpec) -> JobResults {
    JobResults {
        job_id: spec.job_id.clone(),
        benchmark_id: spec.benchmark_id.clone(),
        model_name: spec.model.name.clone(),
        results: vec![EvaluationResult::new("accuracy", MetricValue::Float(0.8))],
        overall_score: Some(0.8),
        num_examples_evaluated: spec.num_examples.unwrap_or_default(),
        duration_seconds: 0.5,
        completed_at: chrono::Utc::now(),
        evaluation_metadata: Default::default(),
        oci_artifact: None,
    }
}

struct ArtifactAdapter {
    output_dir: PathBuf,
}

impl FrameworkAdapter for ArtifactAdapter {
    fn run_benchmark_job(
        &self,
        spec: &JobSpec,
        callbacks: &dyn JobCallbacks,
    ) -> Result<JobResults> {
        callbacks.report_status(
            &JobStatusUpdate::new(JobStatus::Running)
                .with_phase(JobPhase::RunningEvaluation)
                .with_progress(0.5),
        )?;

        let output = self.output_dir.join("results.json");
        fs::write(&output, b"{\"accuracy\": 0.8}")
            .map_err(|err| EvalHubError::Adapter(err.to_string()))?;
        let artifact = callbacks.create_oci_artifact(&OciArtifactSpec::new(spec, vec![output]))?;

        let mut results = results_for(spec);
        results.oci_artifact = Some(artifact);
        Ok(results)
    }
}

struct BrokenAdapter;

impl FrameworkAdapter for BrokenAdapter {
    fn run_benchmark_job(&self, _: &JobSpec, _: &dyn JobCallbacks) -> Result<JobResults> {
        Err(EvalHubError::Adapter("dataset download failed".to_owned()))
    }
}

#[test]
fn status_updates_are_posted_to_the_sidecar() {
    let server = spawn_server_thread(vec![MockResponse::ok(json!({"ok": true}))]);
    let sidecar = BlockingEvalHubClient::new(server.options()).expect("sidecar client");
    let callbacks = DefaultCallbacks::new("job-1").with_sidecar(sidecar);

    callbacks
        .report_status(
            &JobStatusUpdate::new(JobStatus::Running)
                .with_phase(JobPhase::LoadingData)
                .with_message("loading"),
        )
        .expect("report status");

    let request = server.last_request();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "/api/v1/evaluations/jobs/job-1/update");
    let body = request.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["phase"], "loading_data");
    assert_eq!(body["message"], "loading");
    assert!(body.get("progress").is_none());
}

#[test]
fn sidecar_failure_falls_back_to_local_logging() {
    let server = spawn_server_thread(vec![MockResponse::status(StatusCode::NOT_FOUND)]);
    let sidecar = BlockingEvalHubClient::new(server.options()).expect("sidecar client");
    let callbacks = DefaultCallbacks::new("job-1").with_sidecar(sidecar);

    callbacks
        .report_status(&JobStatusUpdate::new(JobStatus::Running))
        .expect("fallback must not fail the job");

    assert_eq!(server.hits(), 1);
}

#[test]
fn runner_reports_progress_artifact_and_results() {
    let server = spawn_server_thread(vec![
        MockResponse::ok(json!({"ok": true})),
        MockResponse::ok(json!({"ok": true})),
    ]);
    let dir = TempDir::new().expect("tempdir");
    let spec_path = write_spec(&dir, &server.base_url);
    let settings = AdapterSettings::default().with_job_spec_path(&spec_path);

    let runner = JobRunner::new(settings).expect("runner");
    let callbacks = runner.default_callbacks().expect("callbacks");
    assert!(callbacks.has_sidecar());

    let adapter = ArtifactAdapter {
        output_dir: dir.path().to_path_buf(),
    };
    let results = runner.run(&adapter, &callbacks).expect("run");

    let artifact = results.oci_artifact.as_ref().expect("artifact");
    assert!(artifact
        .reference
        .starts_with("localhost:5000/eval-results/arc_easy:job-42@sha256:"));
    assert_eq!(artifact.size_bytes, 17);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].json()["status"], "running");
    let posted = requests[1].json();
    assert_eq!(requests[1].path, "/api/v1/evaluations/jobs/job-42/update");
    assert_eq!(posted["job_id"], "job-42");
    assert_eq!(posted["oci_artifact"]["digest"], artifact.digest.as_str());
    assert_eq!(posted["results"][0]["metric_name"], "accuracy");
}

#[test]
fn runner_reports_failure_before_returning_error() {
    let server = spawn_server_thread(vec![MockResponse::ok(json!({"ok": true}))]);
    let dir = TempDir::new().expect("tempdir");
    let spec_path = write_spec(&dir, &server.base_url);

    let runner = JobRunner::with_job_spec_path(AdapterSettings::default(), spec_path)
        .expect("runner");
    let callbacks = runner.default_callbacks().expect("callbacks");

    let err = runner.run(&BrokenAdapter, &callbacks).expect_err("must fail");

    assert!(matches!(err, EvalHubError::Adapter(_)));
    let posted = server.last_request().json();
    assert_eq!(posted["status"], "failed");
    assert!(posted["error_message"]
        .as_str()
        .is_some_and(|message| message.contains("dataset download failed")));
}
