use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{OciArtifactResult, OciArtifactSpec};
use crate::{EvalHubError, Result};

/// Registry used when none is configured.
pub const DEFAULT_REGISTRY: &str = "localhost:5000";

/// Target registry for evaluation artifacts.
///
/// Credentials and `insecure` travel with each [`OciCoordinate`] so a pushing
/// [`Persister`] can authenticate; [`DigestPersister`] only uses the host.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure: bool,
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl RegistryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Configured registry host, or [`DEFAULT_REGISTRY`].
    pub fn host(&self) -> &str {
        self.url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_REGISTRY)
    }
}

/// OCI reference an artifact is published under, and the registry holding it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciCoordinate {
    pub oci_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oci_subject: Option<String>,
    #[serde(skip)]
    pub registry: RegistryConfig,
}

impl OciCoordinate {
    /// `<registry>/eval-results/<benchmark_id>:<job_id>`.
    pub fn for_artifact(registry: &RegistryConfig, spec: &OciArtifactSpec) -> Self {
        Self {
            oci_ref: format!(
                "{}/eval-results/{}:{}",
                registry.host(),
                spec.benchmark_id,
                spec.job_id
            ),
            oci_subject: None,
            registry: registry.clone(),
        }
    }
}

/// Stores an artifact and reports its content address.
pub trait Persister {
    fn persist(&self, spec: &OciArtifactSpec, coordinate: &OciCoordinate)
        -> Result<OciArtifactResult>;
}

/// Computes the artifact's content digest without pushing it anywhere.
///
/// The digest covers every file's path relative to the artifact root and its
/// contents, in path order, so it is stable across directory listing order.
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestPersister;

impl DigestPersister {
    pub fn new() -> Self {
        Self
    }
}

impl Persister for DigestPersister {
    fn persist(
        &self,
        spec: &OciArtifactSpec,
        coordinate: &OciCoordinate,
    ) -> Result<OciArtifactResult> {
        let entries = collect_entries(spec)?;
        if entries.is_empty() {
            return Err(EvalHubError::Persist(format!(
                "artifact for job {} contains no files",
                spec.job_id
            )));
        }

        let mut hasher = Sha256::new();
        let mut size_bytes = 0u64;
        for entry in &entries {
            let contents = fs::read(&entry.path).map_err(|err| EvalHubError::io(&entry.path, err))?;
            let len = contents.len() as u64;
            hasher.update(entry.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(len.to_be_bytes());
            hasher.update(&contents);
            size_bytes += len;
        }

        let digest = format!("sha256:{}", hex::encode(hasher.finalize()));
        let reference = format!("{}@{digest}", coordinate.oci_ref);
        info!(
            job_id = %spec.job_id,
            files = entries.len(),
            size_bytes,
            %reference,
            registry = coordinate.registry.host(),
            "computed artifact digest; artifact was not pushed to a registry"
        );

        Ok(OciArtifactResult {
            digest,
            reference,
            size_bytes,
            created_at: Utc::now(),
        })
    }
}

struct Entry {
    name: String,
    path: PathBuf,
}

fn collect_entries(spec: &OciArtifactSpec) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for path in &spec.files {
        if path.is_dir() {
            let root = spec.base_path.as_deref().unwrap_or(path);
            walk(path, root, &mut entries)?;
        } else if path.is_file() {
            let root = spec
                .base_path
                .as_deref()
                .or_else(|| path.parent())
                .unwrap_or_else(|| Path::new(""));
            entries.push(entry(path, root));
        } else {
            return Err(EvalHubError::Persist(format!(
                "artifact file not found: {}",
                path.display()
            )));
        }
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries.dedup_by(|a, b| a.name == b.name && a.path == b.path);
    Ok(entries)
}

fn walk(dir: &Path, root: &Path, entries: &mut Vec<Entry>) -> Result<()> {
    let listing = fs::read_dir(dir).map_err(|err| EvalHubError::io(dir, err))?;
    for item in listing {
        let path = item.map_err(|err| EvalHubError::io(dir, err))?.path();
        if path.is_dir() {
            walk(&path, root, entries)?;
        } else if path.is_file() {
            entries.push(entry(&path, root));
        } else {
            debug!(path = %path.display(), "skipping non-regular file");
        }
    }
    Ok(())
}

fn entry(path: &Path, root: &Path) -> Entry {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let name = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Entry {
        name,
        path: path.to_path_buf(),
    }
}
