//! Runtime for framework adapters executing a single evaluation job.
//!
//! A job pod starts with a [`JobSpec`] mounted on disk. A [`JobRunner`] loads
//! it, hands it to a [`FrameworkAdapter`], and reports progress, artifacts and
//! final results through [`JobCallbacks`].
//!
//! ```no_run
//! use evalhub_sdk::adapter::{
//!     FrameworkAdapter, JobCallbacks, JobResults, JobRunner, JobSpec,
//! };
//!
//! struct MyAdapter;
//!
//! impl FrameworkAdapter for MyAdapter {
//!     fn run_benchmark_job(
//!         &self,
//!         spec: &JobSpec,
//!         callbacks: &dyn JobCallbacks,
//!     ) -> evalhub_sdk::Result<JobResults> {
//!         unimplemented!()
//!     }
//! }
//!
//! # fn main() -> evalhub_sdk::Result<()> {
//! let runner = JobRunner::from_env()?;
//! let callbacks = runner.default_callbacks()?;
//! runner.run(&MyAdapter, &callbacks)?;
//! # Ok(())
//! # }
//! ```

mod callbacks;
mod job;
mod persister;
mod runner;
mod settings;

pub use callbacks::{DefaultCallbacks, JobCallbacks};
pub use job::{JobPhase, JobResults, JobSpec, JobStatusUpdate, OciArtifactResult, OciArtifactSpec};
pub use persister::{DigestPersister, OciCoordinate, Persister, RegistryConfig, DEFAULT_REGISTRY};
pub use runner::{FrameworkAdapter, JobRunner};
pub use settings::{AdapterSettings, Mode};
