//! Error types for workers, connections and the supervisor.

use std::fmt;

use thiserror::Error;

/// Errors surfaced by the SDK runtime.
///
/// Handler errors are plain [`anyhow::Error`]s and never show up here unless a
/// worker decides to report them (see [`Error::NoHandler`]).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read from the environment
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The configured server address is not a valid endpoint
    #[error("invalid service address {address:?}: {source}")]
    InvalidAddress {
        /// The address as configured
        address: String,
        /// Underlying parse error
        #[source]
        source: tonic::transport::Error,
    },
    /// The server could not be reached
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// The address that was dialled
        address: String,
        /// Underlying transport error
        #[source]
        source: tonic::transport::Error,
    },
    /// The event stream failed with a non-EOF error
    #[error("stream error: {0}")]
    Stream(#[from] tonic::Status),
    /// The worker was asked to shut down before the server closed the stream
    #[error("worker cancelled")]
    Cancelled,
    /// An event arrived that no registered handler could process
    #[error("no handler available for trigger type")]
    NoHandler,
    /// A middleware invocation did not finish within the configured timeout
    #[error("handler timed out after {0:?}")]
    HandlerTimeout(std::time::Duration),
    /// A worker task panicked
    #[error("worker {0} panicked")]
    WorkerPanicked(String),
    /// One or more workers failed
    #[error(transparent)]
    Workers(WorkerErrors),
}

impl Error {
    /// Returns true for errors caused by the server going away, rather than by
    /// the worker itself.
    ///
    /// These are expected when running without a live server attached, e.g.
    /// while the resource graph is being collected at build time.
    pub fn is_eof(&self) -> bool {
        match self {
            Error::Connect { .. } => true,
            Error::Stream(status) => {
                matches!(
                    status.code(),
                    tonic::Code::Unavailable | tonic::Code::Cancelled
                ) || status.message().contains("EOF")
            }
            _ => false,
        }
    }
}

/// The collected failures of every worker that returned an error.
#[derive(Debug, Default)]
pub struct WorkerErrors {
    errors: Vec<(String, Error)>,
}

impl WorkerErrors {
    /// Record the failure of a worker.
    pub fn push(&mut self, worker: impl Into<String>, error: Error) {
        self.errors.push((worker.into(), error));
    }

    /// Number of failed workers.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if no worker failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterate over `(worker, error)` pairs in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.errors.iter().map(|(w, e)| (w.as_str(), e))
    }

    /// Drop every error matching the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&Error) -> bool) {
        self.errors.retain(|(_, e)| keep(e));
    }
}

impl fmt::Display for WorkerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} worker(s) failed", self.errors.len())?;
        for (worker, error) in &self.errors {
            write!(f, "\n  {worker}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WorkerErrors {}
