//! Embeddable facade tying the store, dispatcher and supervised workers
//! together.

use std::sync::Arc;

use queueable_core::{JobEvent, JobId, Payload, QueueableConfig, WorkerId};
use ractor::ActorRef;
use ractor::rpc::CallResult;
use serde::Serialize;
use store::{JobStore, RedisJobStore};
use tokio::sync::{Mutex, broadcast};

use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, EngineError};
use crate::handler::JobHandler;
use crate::messages::{SupervisorMessage, WorkerExit, WorkerInfo};
use crate::reporter::OutcomeReporter;
use crate::supervisor::start_supervisor;

/// A running queue engine.
///
/// Clones share the same store, event stream and supervisor.
pub struct Engine<S> {
    store: Arc<S>,
    config: QueueableConfig,
    reporter: OutcomeReporter,
    supervisor: ActorRef<SupervisorMessage>,
    supervisor_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            reporter: self.reporter.clone(),
            supervisor: self.supervisor.clone(),
            supervisor_task: self.supervisor_task.clone(),
        }
    }
}

impl Engine<RedisJobStore> {
    /// Connect to Redis and start the engine.
    pub async fn connect(config: QueueableConfig) -> Result<Self, EngineError> {
        let store = RedisJobStore::connect(&config.store).await?;
        Self::with_store(store, config).await
    }
}

impl<S: JobStore> Engine<S> {
    /// Start an engine on an existing store.
    pub async fn with_store(store: S, config: QueueableConfig) -> Result<Self, EngineError> {
        let store = Arc::new(store);
        let reporter = OutcomeReporter::default();

        let (supervisor, task) =
            start_supervisor(store.clone(), reporter.clone(), config.worker.clone())
                .await
                .map_err(|e| EngineError::Spawn(e.to_string()))?;

        Ok(Self {
            store,
            config,
            reporter,
            supervisor,
            supervisor_task: Arc::new(Mutex::new(Some(task))),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &QueueableConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> Dispatcher<S> {
        Dispatcher::new(self.store.clone(), self.reporter.clone())
    }

    pub async fn enqueue(&self, queue: &str, payload: Payload) -> Result<JobId, DispatchError> {
        self.dispatcher().enqueue(queue, payload).await
    }

    pub async fn dispatch<T>(&self, queue: &str, args: &T) -> Result<JobId, DispatchError>
    where
        T: Serialize + ?Sized,
    {
        self.dispatcher().dispatch(queue, args).await
    }

    /// Subscribe to lifecycle events from every worker and producer.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.reporter.subscribe()
    }

    /// Start workers for `handler`.
    ///
    /// A `concurrency` of zero uses the configured worker count.
    pub async fn process<H: JobHandler>(
        &self,
        handler: H,
        concurrency: usize,
    ) -> Result<Vec<WorkerId>, EngineError> {
        let concurrency = if concurrency == 0 {
            self.config.worker.concurrency.max(1) as usize
        } else {
            concurrency
        };
        let handler: Arc<dyn JobHandler> = Arc::new(handler);

        let started = self
            .call(|reply| SupervisorMessage::StartWorkers {
                handler,
                concurrency,
                reply,
            })
            .await??;
        Ok(started)
    }

    /// Workers currently running.
    pub async fn workers(&self) -> Result<Vec<WorkerInfo>, EngineError> {
        self.call(|reply| SupervisorMessage::ListWorkers { reply })
            .await
    }

    /// Drain every worker and stop the supervisor.
    pub async fn shutdown(&self) -> Result<Vec<WorkerExit>, EngineError> {
        let exits = self
            .call(|reply| SupervisorMessage::Shutdown { reply })
            .await?;

        if let Some(task) = self.supervisor_task.lock().await.take() {
            task.await
                .map_err(|e| EngineError::Supervisor(e.to_string()))?;
        }

        tracing::info!(workers = exits.len(), "Engine stopped");
        Ok(exits)
    }

    async fn call<T, F>(&self, build: F) -> Result<T, EngineError>
    where
        F: FnOnce(ractor::RpcReplyPort<T>) -> SupervisorMessage,
        T: Send + 'static,
    {
        match self.supervisor.call(build, None).await {
            Ok(CallResult::Success(value)) => Ok(value),
            Ok(CallResult::Timeout) => Err(EngineError::Supervisor("call timed out".into())),
            Ok(CallResult::SenderError) => {
                Err(EngineError::Supervisor("supervisor dropped the reply".into()))
            }
            Err(_) => Err(EngineError::Supervisor("supervisor is not running".into())),
        }
    }
}
