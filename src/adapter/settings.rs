//! Adapter runtime configuration, read once from the process environment.

use std::path::PathBuf;
use std::str::FromStr;

use super::RegistryConfig;
use crate::{ClientOptions, EvalHubError, Result};

pub const MODE_ENV: &str = "EVALHUB_MODE";
pub const JOB_SPEC_PATH_ENV: &str = "EVALHUB_JOB_SPEC_PATH";
pub const REGISTRY_URL_ENV: &str = "REGISTRY_URL";
pub const REGISTRY_USERNAME_ENV: &str = "REGISTRY_USERNAME";
pub const REGISTRY_PASSWORD_ENV: &str = "REGISTRY_PASSWORD";
pub const REGISTRY_INSECURE_ENV: &str = "REGISTRY_INSECURE";
pub const AUTH_TOKEN_PATH_ENV: &str = "EVALHUB_AUTH_TOKEN_PATH";
pub const CA_BUNDLE_PATH_ENV: &str = "EVALHUB_CA_BUNDLE_PATH";

/// Job spec mount inside a Kubernetes job pod.
pub const K8S_JOB_SPEC_PATH: &str = "/meta/job.json";
/// Repo-relative job spec used for local runs.
pub const LOCAL_JOB_SPEC_PATH: &str = "meta/job.json";

/// Where the adapter runs. Only affects defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    K8s,
    #[default]
    Local,
}

impl FromStr for Mode {
    type Err = EvalHubError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "k8s" => Ok(Self::K8s),
            "local" => Ok(Self::Local),
            other => Err(EvalHubError::Config(format!(
                "{MODE_ENV} must be 'k8s' or 'local', got '{other}'"
            ))),
        }
    }
}

/// Registry credentials are redacted in `Debug` output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdapterSettings {
    pub mode: Mode,
    pub job_spec_path: Option<PathBuf>,
    pub registry: RegistryConfig,
    pub auth_token_path: Option<PathBuf>,
    pub ca_bundle_path: Option<PathBuf>,
}

impl AdapterSettings {
    /// Reads every adapter variable from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mode = get(MODE_ENV)
            .map(|value| value.parse::<Mode>())
            .transpose()?
            .unwrap_or_default();
        let registry_insecure = get(REGISTRY_INSECURE_ENV)
            .map(|value| parse_bool(REGISTRY_INSECURE_ENV, &value))
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            mode,
            job_spec_path: get(JOB_SPEC_PATH_ENV).map(PathBuf::from),
            registry: RegistryConfig {
                url: get(REGISTRY_URL_ENV),
                username: get(REGISTRY_USERNAME_ENV),
                password: get(REGISTRY_PASSWORD_ENV),
                insecure: registry_insecure,
            },
            auth_token_path: get(AUTH_TOKEN_PATH_ENV).map(PathBuf::from),
            ca_bundle_path: get(CA_BUNDLE_PATH_ENV).map(PathBuf::from),
        })
    }

    /// Overrides the job spec location.
    pub fn with_job_spec_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.job_spec_path = Some(path.into());
        self
    }

    /// Explicit path, else `/meta/job.json` in k8s mode, else `meta/job.json`.
    pub fn resolved_job_spec_path(&self) -> PathBuf {
        match (&self.job_spec_path, self.mode) {
            (Some(path), _) => path.clone(),
            (None, Mode::K8s) => PathBuf::from(K8S_JOB_SPEC_PATH),
            (None, Mode::Local) => PathBuf::from(LOCAL_JOB_SPEC_PATH),
        }
    }

    /// Checks the job spec exists and a registry is configured.
    pub fn validate_runtime(&self) -> Result<()> {
        let spec_path = self.resolved_job_spec_path();
        if !spec_path.exists() {
            return Err(EvalHubError::Config(format!(
                "job spec file not found at {}; set {JOB_SPEC_PATH_ENV} (or {MODE_ENV}=k8s for {K8S_JOB_SPEC_PATH})",
                spec_path.display()
            )));
        }
        if self.registry.url.is_none() {
            return Err(EvalHubError::Config(format!(
                "{REGISTRY_URL_ENV} environment variable is required"
            )));
        }
        Ok(())
    }

    /// Client options for `base_url` carrying the configured token and CA paths.
    pub fn client_options(&self, base_url: impl Into<String>) -> ClientOptions {
        let mut options = ClientOptions::new(base_url);
        if let Some(path) = &self.auth_token_path {
            options = options.with_token_path(path);
        }
        if let Some(path) = &self.ca_bundle_path {
            options = options.with_ca_bundle(path);
        }
        options
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(EvalHubError::Config(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}
