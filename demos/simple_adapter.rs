//! Minimal framework adapter.
//!
//! Run locally with a job spec at `meta/job.json` (or `EVALHUB_JOB_SPEC_PATH`):
//!
//! ```text
//! {"job_id": "local-1", "benchmark_id": "gsm8k", "model": {"name": "demo"}}
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use evalhub_sdk::adapter::{
    FrameworkAdapter, JobCallbacks, JobPhase, JobResults, JobRunner, JobSpec, JobStatusUpdate,
    OciArtifactSpec,
};
use evalhub_sdk::{EvalHubError, EvaluationResult, JobStatus, MetricValue};
use serde_json::json;
use tracing_subscriber::EnvFilter;

struct ExampleAdapter {
    output_dir: PathBuf,
}

impl ExampleAdapter {
    fn evaluate(&self, spec: &JobSpec, examples: u64) -> Vec<EvaluationResult> {
        let few_shot = spec
            .benchmark_config
            .get("num_few_shot")
            .and_then(|value| value.as_u64())
            .unwrap_or(0);
        let accuracy = 0.6 + 0.02 * few_shot.min(10) as f64;

        let mut accuracy_metric = EvaluationResult::new("accuracy", MetricValue::Float(accuracy));
        accuracy_metric.num_samples = Some(examples);
        vec![
            accuracy_metric,
            EvaluationResult::new("examples", MetricValue::Int(examples as i64)),
        ]
    }
}

impl FrameworkAdapter for ExampleAdapter {
    fn run_benchmark_job(
        &self,
        spec: &JobSpec,
        callbacks: &dyn JobCallbacks,
    ) -> evalhub_sdk::Result<JobResults> {
        let started = Instant::now();
        let examples = spec.num_examples.unwrap_or(100);

        callbacks.report_status(
            &JobStatusUpdate::new(JobStatus::Running)
                .with_phase(JobPhase::Initializing)
                .with_progress(0.0)
                .with_message(format!("initializing {}", spec.benchmark_id)),
        )?;

        callbacks.report_status(
            &JobStatusUpdate::new(JobStatus::Running)
                .with_phase(JobPhase::RunningEvaluation)
                .with_progress(0.3)
                .with_steps(1, 3),
        )?;
        let results = self.evaluate(spec, examples);
        let overall_score = results.first().and_then(|metric| metric.metric_value.as_f64());

        callbacks.report_status(
            &JobStatusUpdate::new(JobStatus::Running)
                .with_phase(JobPhase::PersistingArtifacts)
                .with_progress(0.9)
                .with_steps(2, 3),
        )?;
        fs::create_dir_all(&self.output_dir)
            .map_err(|err| EvalHubError::Adapter(format!("output dir: {err}")))?;
        let output = self.output_dir.join(format!("{}_results.json", spec.job_id));
        let body = json!({ "job_id": spec.job_id, "results": results });
        fs::write(&output, body.to_string())
            .map_err(|err| EvalHubError::Adapter(format!("write results: {err}")))?;

        let artifact = callbacks.create_oci_artifact(
            &OciArtifactSpec::new(spec, vec![output]).with_base_path(&self.output_dir),
        )?;

        Ok(JobResults {
            job_id: spec.job_id.clone(),
            benchmark_id: spec.benchmark_id.clone(),
            model_name: spec.model.name.clone(),
            results,
            overall_score,
            num_examples_evaluated: examples,
            duration_seconds: started.elapsed().as_secs_f64(),
            completed_at: chrono::Utc::now(),
            evaluation_metadata: Default::default(),
            oci_artifact: Some(artifact),
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runner = JobRunner::from_env()?;
    let callbacks = runner.default_callbacks()?;
    let adapter = ExampleAdapter {
        output_dir: std::env::temp_dir().join("evalhub_job_results"),
    };

    let results = runner.run(&adapter, &callbacks)?;
    println!(
        "job {} finished with score {:?}",
        results.job_id, results.overall_score
    );
    Ok(())
}
