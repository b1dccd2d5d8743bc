use std::path::PathBuf;
use std::time::Duration;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum EvalHubError {
    /// Network or request execution error from `reqwest` (timeout, connect,
    /// reset and similar). Surfaced unchanged once retries are exhausted.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Response decoding or protocol-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Request payload could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
    /// Invalid client or adapter configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// The client was used after [`close`](crate::EvalHubClient::close).
    #[error("client is closed")]
    Closed,
    /// Filesystem access failed.
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The job specification file is malformed.
    #[error("invalid job spec: {0}")]
    JobSpec(String),
    /// Artifact persistence failed.
    #[error("artifact persistence failed: {0}")]
    Persist(String),
    /// A framework adapter reported a failure.
    #[error("adapter error: {0}")]
    Adapter(String),
    /// A job did not reach a terminal status in time.
    #[error("job {job_id} did not finish within {waited:?}")]
    WaitTimeout { job_id: String, waited: Duration },
}

impl EvalHubError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` for transport-level timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }

    /// Returns `true` for connection establishment failures.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_connect())
    }
}
