//! Supervisor actor that owns every worker started by the engine.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use queueable_core::WorkerConfig;
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};
use store::JobStore;

use crate::messages::{SupervisorMessage, WorkerExit, WorkerInfo};
use crate::reporter::OutcomeReporter;
use crate::worker_actor::{WorkerHandle, WorkerLoop};

/// State for the supervisor actor.
pub struct SupervisorState<S> {
    store: Arc<S>,
    reporter: OutcomeReporter,
    config: WorkerConfig,
    /// Running workers by actor id.
    workers: HashMap<ActorId, WorkerHandle>,
}

/// Supervisor actor arguments.
pub struct SupervisorArgs<S> {
    pub store: Arc<S>,
    pub reporter: OutcomeReporter,
    pub config: WorkerConfig,
}

/// Supervisor actor that manages worker actors.
pub struct Supervisor<S>(PhantomData<fn() -> S>);

impl<S> Default for Supervisor<S> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<S: JobStore> Actor for Supervisor<S> {
    type Msg = SupervisorMessage;
    type State = SupervisorState<S>;
    type Arguments = SupervisorArgs<S>;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker supervisor");

        Ok(SupervisorState {
            store: args.store,
            reporter: args.reporter,
            config: args.config,
            workers: HashMap::new(),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::StartWorkers {
                handler,
                concurrency,
                reply,
            } => {
                let worker = WorkerLoop::new(
                    state.store.clone(),
                    handler,
                    state.reporter.clone(),
                    state.config.clone(),
                );

                let mut started = Vec::with_capacity(concurrency);
                let mut failure = None;
                for _ in 0..concurrency {
                    match worker.spawn_linked(myself.get_cell()).await {
                        Ok(handle) => {
                            started.push(handle.worker_id());
                            state.workers.insert(handle.actor().get_id(), handle);
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }

                match failure {
                    Some(e) => {
                        tracing::error!(
                            queue = %worker.queue_name(),
                            started = started.len(),
                            error = %e,
                            "Failed to start workers"
                        );
                        let _ = reply.send(Err(e));
                    }
                    None => {
                        let _ = reply.send(Ok(started));
                    }
                }
            }

            SupervisorMessage::ListWorkers { reply } => {
                let workers = state
                    .workers
                    .values()
                    .map(|handle| WorkerInfo {
                        worker_id: handle.worker_id(),
                        queue: handle.queue().to_string(),
                    })
                    .collect();
                let _ = reply.send(workers);
            }

            SupervisorMessage::Shutdown { reply } => {
                tracing::info!(workers = state.workers.len(), "Shutting down supervisor");

                let handles: Vec<WorkerHandle> = state.workers.drain().map(|(_, h)| h).collect();
                for handle in &handles {
                    handle.shutdown();
                }

                let mut exits = Vec::with_capacity(handles.len());
                for handle in handles {
                    let worker_id = handle.worker_id();
                    let queue = handle.queue().to_string();
                    let result = handle.join().await;
                    if let Err(e) = &result {
                        tracing::warn!(worker_id = %worker_id, queue = %queue, error = %e, "Worker exited with error");
                    }
                    exits.push(WorkerExit {
                        worker_id,
                        queue,
                        result,
                    });
                }

                let _ = reply.send(exits);
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                if let Some(handle) = state.workers.remove(&cell.get_id()) {
                    let worker_id = handle.worker_id();
                    let queue = handle.queue().to_string();
                    match handle.join().await {
                        Ok(processed) => tracing::info!(
                            worker_id = %worker_id,
                            queue = %queue,
                            processed,
                            "Worker terminated"
                        ),
                        Err(e) => tracing::error!(
                            worker_id = %worker_id,
                            queue = %queue,
                            reason = ?reason,
                            error = %e,
                            "Worker terminated with error"
                        ),
                    }
                }
            }
            SupervisionEvent::ActorFailed(cell, err) => {
                if let Some(handle) = state.workers.remove(&cell.get_id()) {
                    tracing::error!(
                        worker_id = %handle.worker_id(),
                        queue = %handle.queue(),
                        error = %err,
                        "Worker failed"
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Start a supervisor for `store`.
pub async fn start_supervisor<S: JobStore>(
    store: Arc<S>,
    reporter: OutcomeReporter,
    config: WorkerConfig,
) -> Result<(ActorRef<SupervisorMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    let args = SupervisorArgs {
        store,
        reporter,
        config,
    };
    Actor::spawn(None, Supervisor::default(), args).await
}
