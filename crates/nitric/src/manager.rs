//! Worker supervisor.

use std::fmt;

use tonic::transport::Channel;

use crate::config::Config;
use crate::connection;
use crate::error::{Error, WorkerErrors};
use crate::worker::{Shutdown, ShutdownHandle, Worker, start_isolated};

/// Owns the registered workers of an application and runs them to completion.
///
/// ```no_run
/// use nitric::middleware::{compose, middleware};
/// use nitric::{ApiRoute, HttpContext, Manager, StreamWorker};
///
/// # async fn serve() -> Result<(), nitric::Error> {
/// let mut manager = Manager::from_env()?;
/// let hello = middleware(|mut ctx: HttpContext, next| async move {
///     ctx.response.text("hello");
///     next(ctx).await
/// });
/// let channel = manager.connect().await?;
/// manager.register(StreamWorker::api(
///     channel,
///     ApiRoute::new("main", "/hello").method("GET"),
///     compose([hello]),
/// ));
/// manager.run().await
/// # }
/// ```
pub struct Manager {
    config: Config,
    workers: Vec<Box<dyn Worker>>,
    shutdown: ShutdownHandle,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.workers.iter().map(|w| w.name()).collect();
        f.debug_struct("Manager")
            .field("config", &self.config)
            .field("workers", &names)
            .finish_non_exhaustive()
    }
}

impl Manager {
    /// Create an empty manager.
    pub fn new(config: Config) -> Self {
        let (shutdown, _) = Shutdown::channel();
        Self {
            config,
            workers: Vec::new(),
            shutdown,
        }
    }

    /// Create an empty manager configured from the environment.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(Config::from_env()?))
    }

    /// The manager's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a new channel to the server for a worker.
    pub async fn connect(&self) -> Result<Channel, Error> {
        connection::connect(&self.config).await
    }

    /// Add a worker. Workers are started by [`Manager::run`].
    pub fn register(&mut self, worker: impl Worker + 'static) -> &mut Self {
        let mut worker = Box::new(worker);
        worker.configure(&self.config);
        tracing::debug!("Registered worker {}", worker.name());
        self.workers.push(worker);
        self
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns true if no workers are registered.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// A handle that stops every worker started by [`Manager::run`].
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Start every worker on its own task and wait for all of them.
    ///
    /// Failures do not stop sibling workers; every error is collected and
    /// returned together. Workers stopped through [`Manager::shutdown_handle`]
    /// are not failures. In build mode errors caused by the server being
    /// absent are ignored.
    pub async fn run(self) -> Result<(), Error> {
        let Self {
            config,
            workers,
            shutdown,
        } = self;

        tracing::info!("Starting {} worker(s)", workers.len());
        let tasks: Vec<_> = workers
            .into_iter()
            .map(|worker| {
                let name = worker.name().to_string();
                let signal = shutdown.subscribe();
                (name, tokio::spawn(start_isolated(worker, signal)))
            })
            .collect();

        let mut errors = WorkerErrors::default();
        for (name, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(join) => Err(Error::WorkerPanicked(format!("{name}: {join}"))),
            };
            match result {
                Ok(()) => tracing::info!("Worker {} finished", name),
                Err(err) => errors.push(name, err),
            }
        }

        if shutdown.is_shutdown() {
            errors.retain(|err| !matches!(err, Error::Cancelled));
        }

        if config.is_build() {
            let before = errors.len();
            errors.retain(|err| !err.is_eof());
            if before != errors.len() {
                tracing::debug!(
                    "Ignored {} disconnect error(s) in build mode",
                    before - errors.len()
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::error!("{}", errors);
            Err(Error::Workers(errors))
        }
    }
}
