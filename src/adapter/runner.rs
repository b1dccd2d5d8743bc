use std::path::PathBuf;

use tracing::{error, info, warn};

use super::{AdapterSettings, DefaultCallbacks, JobCallbacks, JobResults, JobSpec, JobStatusUpdate};
use crate::Result;

/// A benchmark framework integration.
///
/// Runs exactly one job to completion on the calling thread, reporting
/// progress through `callbacks`.
pub trait FrameworkAdapter {
    fn run_benchmark_job(&self, spec: &JobSpec, callbacks: &dyn JobCallbacks)
        -> Result<JobResults>;
}

/// Loads the job spec once and drives an adapter through a single job.
#[derive(Debug)]
pub struct JobRunner {
    settings: AdapterSettings,
    spec: JobSpec,
}

impl JobRunner {
    /// Loads the job spec from [`AdapterSettings::resolved_job_spec_path`].
    pub fn new(settings: AdapterSettings) -> Result<Self> {
        let path = settings.resolved_job_spec_path();
        info!(path = %path.display(), "loading job spec");
        let spec = JobSpec::from_file(&path)?;
        Ok(Self { settings, spec })
    }

    /// Like [`JobRunner::new`], with `path` taking precedence over the settings.
    pub fn with_job_spec_path(settings: AdapterSettings, path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(settings.with_job_spec_path(path))
    }

    /// [`JobRunner::new`] over [`AdapterSettings::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(AdapterSettings::from_env()?)
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    pub fn job_spec(&self) -> &JobSpec {
        &self.spec
    }

    /// [`DefaultCallbacks`] wired to this job's callback URL and registry.
    pub fn default_callbacks(&self) -> Result<DefaultCallbacks> {
        DefaultCallbacks::from_settings(&self.spec, &self.settings)
    }

    /// Runs `adapter` and reports its results.
    ///
    /// If the adapter fails, a `failed` status carrying the error is reported
    /// before the error is returned.
    pub fn run<A>(&self, adapter: &A, callbacks: &dyn JobCallbacks) -> Result<JobResults>
    where
        A: FrameworkAdapter + ?Sized,
    {
        info!(
            job_id = %self.spec.job_id,
            benchmark_id = %self.spec.benchmark_id,
            model = %self.spec.model.name,
            "starting benchmark job"
        );

        match adapter.run_benchmark_job(&self.spec, callbacks) {
            Ok(results) => {
                callbacks.report_results(&results)?;
                Ok(results)
            }
            Err(err) => {
                error!(job_id = %self.spec.job_id, error = %err, "benchmark job failed");
                let update = JobStatusUpdate::failed(err.to_string());
                if let Err(report_err) = callbacks.report_status(&update) {
                    warn!(
                        job_id = %self.spec.job_id,
                        error = %report_err,
                        "could not report job failure"
                    );
                }
                Err(err)
            }
        }
    }
}
