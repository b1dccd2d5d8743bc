//! Bearer token and CA bundle resolution.
//!
//! Every source is optional. A configured path that does not exist is logged
//! and skipped so the client keeps working outside Kubernetes, where the
//! service-account mounts are absent.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::ClientOptions;

/// Kubernetes service-account token mount.
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
/// OpenShift service CA injected via annotation.
pub const OPENSHIFT_SERVICE_CA_PATH: &str = "/etc/pki/ca-trust/source/anchors/service-ca.crt";
/// Kubernetes service-account CA mount.
pub const SERVICE_ACCOUNT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Filesystem locations probed when no explicit credential is usable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WellKnownPaths {
    /// Service-identity bearer token file.
    pub token: Option<PathBuf>,
    /// CA bundle candidates, first existing one wins.
    pub ca_bundles: Vec<PathBuf>,
}

impl Default for WellKnownPaths {
    fn default() -> Self {
        Self {
            token: Some(PathBuf::from(SERVICE_ACCOUNT_TOKEN_PATH)),
            ca_bundles: vec![
                PathBuf::from(OPENSHIFT_SERVICE_CA_PATH),
                PathBuf::from(SERVICE_ACCOUNT_CA_PATH),
            ],
        }
    }
}

impl WellKnownPaths {
    /// No auto-detection at all.
    pub fn none() -> Self {
        Self {
            token: None,
            ca_bundles: Vec::new(),
        }
    }
}

/// How the transport verifies server certificates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TlsVerification {
    /// Verification disabled.
    Disabled,
    /// Verify against this PEM bundle only.
    CaBundle(PathBuf),
    /// Verify against the platform's default trust store.
    SystemDefault,
}

/// Resolved authentication and TLS material. Immutable after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub bearer_token: Option<String>,
    pub ca_bundle_path: Option<PathBuf>,
    pub insecure: bool,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("ca_bundle_path", &self.ca_bundle_path)
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl Credentials {
    /// Runs the token and CA priority chains for `options`.
    ///
    /// CA detection is skipped entirely in insecure mode.
    pub fn resolve(options: &ClientOptions) -> Self {
        let bearer_token = resolve_token_with(
            options.auth_token.as_deref(),
            options.auth_token_path.as_deref(),
            &options.well_known,
        );

        let ca_bundle_path = if options.insecure {
            warn!("TLS verification disabled - skipping CA bundle detection");
            None
        } else {
            resolve_ca_bundle_with(options.ca_bundle_path.as_deref(), &options.well_known)
        };

        Self {
            bearer_token,
            ca_bundle_path,
            insecure: options.insecure,
        }
    }

    /// Verification mode derived from these credentials.
    pub fn tls(&self) -> TlsVerification {
        build_tls_config(self.insecure, self.ca_bundle_path.as_deref())
    }
}

/// Resolves a bearer token using the default well-known locations.
///
/// Priority: non-empty `explicit`, then the file at `path`, then the
/// service-account token mount, then `None`.
pub fn resolve_token(explicit: Option<&str>, path: Option<&Path>) -> Option<String> {
    resolve_token_with(explicit, path, &WellKnownPaths::default())
}

/// [`resolve_token`] with caller-supplied well-known locations.
pub fn resolve_token_with(
    explicit: Option<&str>,
    path: Option<&Path>,
    well_known: &WellKnownPaths,
) -> Option<String> {
    if let Some(token) = explicit.filter(|token| !token.is_empty()) {
        return Some(token.to_owned());
    }

    if let Some(path) = path {
        match read_token_file(path) {
            Some(token) => return Some(token),
            None => warn!(path = %path.display(), "specified token path does not exist"),
        }
    }

    if let Some(default_path) = well_known.token.as_deref() {
        if let Some(token) = read_token_file(default_path) {
            debug!(path = %default_path.display(), "auto-detected service account token");
            return Some(token);
        }
    }

    debug!("no authentication token found, running without credentials");
    None
}

/// Resolves a CA bundle using the default well-known locations.
///
/// Priority: `path` if it exists, then the first existing well-known bundle,
/// then `None` (platform trust store).
pub fn resolve_ca_bundle(path: Option<&Path>) -> Option<PathBuf> {
    resolve_ca_bundle_with(path, &WellKnownPaths::default())
}

/// [`resolve_ca_bundle`] with caller-supplied well-known locations.
pub fn resolve_ca_bundle_with(path: Option<&Path>, well_known: &WellKnownPaths) -> Option<PathBuf> {
    if let Some(path) = path {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "specified CA bundle does not exist");
    }

    for candidate in &well_known.ca_bundles {
        if candidate.exists() {
            debug!(path = %candidate.display(), "auto-detected CA bundle");
            return Some(candidate.clone());
        }
    }

    debug!("no CA bundle found, using system trust store");
    None
}

/// Chooses the verification mode. Insecure mode wins over any bundle.
pub fn build_tls_config(insecure: bool, ca_bundle: Option<&Path>) -> TlsVerification {
    if insecure {
        warn!("TLS verification disabled (insecure mode)");
        return TlsVerification::Disabled;
    }

    match ca_bundle {
        Some(path) => {
            debug!(path = %path.display(), "TLS verification using CA bundle");
            TlsVerification::CaBundle(path.to_path_buf())
        }
        None => {
            debug!("TLS verification using system CA certificates");
            TlsVerification::SystemDefault
        }
    }
}

// A file that vanishes or cannot be read between the existence check and the
// read is treated like a missing one.
fn read_token_file(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(contents) => Some(contents.trim().to_owned()),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "token file could not be read");
            None
        }
    }
}
