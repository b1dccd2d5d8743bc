use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    AdapterSettings, DigestPersister, JobResults, JobSpec, JobStatusUpdate, OciArtifactResult,
    OciArtifactSpec, OciCoordinate, Persister, RegistryConfig,
};
use crate::{endpoints, BlockingEvalHubClient, RequestOptions, Result};

/// Channel from a running adapter back to the service.
pub trait JobCallbacks {
    /// Reports progress for the current job.
    fn report_status(&self, update: &JobStatusUpdate) -> Result<()>;

    /// Packages and stores result files, returning their content address.
    fn create_oci_artifact(&self, spec: &OciArtifactSpec) -> Result<OciArtifactResult>;

    /// Reports the final results for the current job.
    fn report_results(&self, results: &JobResults) -> Result<()>;
}

/// Callbacks that POST to the service when a sidecar client is configured
/// and fall back to local log lines otherwise.
///
/// Delivery failures never fail the job: they are logged and the update is
/// written to the local log instead.
#[derive(Debug)]
pub struct DefaultCallbacks<P = DigestPersister> {
    job_id: String,
    sidecar: Option<BlockingEvalHubClient>,
    registry: RegistryConfig,
    persister: P,
}

impl DefaultCallbacks<DigestPersister> {
    /// Local-only callbacks for `job_id`.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            sidecar: None,
            registry: RegistryConfig::default(),
            persister: DigestPersister::new(),
        }
    }

    /// Callbacks for a loaded job: the sidecar is the spec's `callback_url`,
    /// contacted with the settings' token and CA configuration.
    pub fn from_settings(spec: &JobSpec, settings: &AdapterSettings) -> Result<Self> {
        let mut callbacks = Self::new(spec.job_id.clone()).with_registry(settings.registry.clone());
        if let Some(url) = spec.callback_url.as_deref() {
            let client = BlockingEvalHubClient::new(settings.client_options(url))?;
            callbacks = callbacks.with_sidecar(client);
        }
        Ok(callbacks)
    }
}

impl<P> DefaultCallbacks<P> {
    pub fn with_sidecar(mut self, client: BlockingEvalHubClient) -> Self {
        self.sidecar = Some(client);
        self
    }

    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Swaps the artifact backend.
    pub fn with_persister<Q: Persister>(self, persister: Q) -> DefaultCallbacks<Q> {
        DefaultCallbacks {
            job_id: self.job_id,
            sidecar: self.sidecar,
            registry: self.registry,
            persister,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn has_sidecar(&self) -> bool {
        self.sidecar.is_some()
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    /// `true` when the update reached the service.
    fn post_update<T: Serialize>(&self, payload: &T, what: &str) -> bool {
        let Some(client) = &self.sidecar else {
            return false;
        };

        let sent = RequestOptions::new().json(payload).and_then(|options| {
            client.request(Method::POST, &endpoints::job_update(&self.job_id), options)
        });
        match sent {
            Ok(_) => true,
            Err(err) => {
                warn!(job_id = %self.job_id, error = %err, "failed to send {what} to EvalHub");
                false
            }
        }
    }
}

impl<P: Persister> JobCallbacks for DefaultCallbacks<P> {
    fn report_status(&self, update: &JobStatusUpdate) -> Result<()> {
        if self.post_update(update, "status update") {
            debug!(job_id = %self.job_id, status = %update.status, "status update sent to EvalHub");
            return Ok(());
        }

        info!(
            job_id = %self.job_id,
            status = %update.status,
            phase = ?update.phase,
            progress = ?update.progress,
            message = update.message.as_deref().unwrap_or(""),
            "job status"
        );
        Ok(())
    }

    fn create_oci_artifact(&self, spec: &OciArtifactSpec) -> Result<OciArtifactResult> {
        info!(job_id = %spec.job_id, "creating OCI artifact");
        let coordinate = OciCoordinate::for_artifact(&self.registry, spec);
        self.persister.persist(spec, &coordinate)
    }

    fn report_results(&self, results: &JobResults) -> Result<()> {
        if self.post_update(results, "results") {
            info!(job_id = %results.job_id, "results sent to EvalHub");
            return Ok(());
        }

        info!(
            job_id = %results.job_id,
            benchmark_id = %results.benchmark_id,
            model = %results.model_name,
            score = ?results.overall_score,
            examples = results.num_examples_evaluated,
            duration_secs = results.duration_seconds,
            "job completed"
        );
        Ok(())
    }
}
