//! Worker actor that claims and executes jobs from one queue.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use queueable_core::{Job, WorkerConfig, WorkerId, validate_queue_name};
use ractor::{Actor, ActorCell, ActorProcessingErr, ActorRef};
use store::{JobStore, StoreError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::WorkerError;
use crate::handler::{JobHandler, execute};
use crate::messages::{WorkerMessage, WorkerStatus};
use crate::reporter::OutcomeReporter;

type ExitSender = oneshot::Sender<Result<u64, WorkerError>>;

/// State for the worker actor.
pub struct WorkerActorState<S> {
    worker_id: WorkerId,
    queue: String,
    store: Arc<S>,
    handler: Arc<dyn JobHandler>,
    reporter: OutcomeReporter,
    config: WorkerConfig,
    /// Delay before the next poll after an empty claim.
    backoff: Duration,
    /// Consecutive failed claims.
    claim_failures: u32,
    processed: u64,
    failed: u64,
    exit: Option<ExitSender>,
}

impl<S: JobStore> WorkerActorState<S> {
    fn status(&self) -> WorkerStatus {
        WorkerStatus {
            worker_id: self.worker_id,
            queue: self.queue.clone(),
            processed: self.processed,
            failed: self.failed,
        }
    }

    /// Hand the exit status to whoever holds the [`WorkerHandle`].
    fn report_exit(&mut self, result: Result<u64, WorkerError>) {
        if let Some(exit) = self.exit.take() {
            let _ = exit.send(result);
        }
    }

    fn next_backoff(&mut self) -> Duration {
        let delay = self.backoff;
        self.backoff = (delay * 2).min(self.config.max_poll_interval());
        delay
    }

    /// Run a claimed job and record its outcome.
    ///
    /// Handler failures of any kind are recorded; only store failures are
    /// returned, since the outcome is then not durable.
    async fn process(&mut self, job: Job) -> Result<(), StoreError> {
        self.reporter.started(&job, self.worker_id);

        let outcome = execute(
            self.handler.as_ref(),
            job.payload.clone(),
            self.config.handler_timeout(),
        )
        .await;

        match outcome {
            Ok(result) => {
                let stored = self
                    .store
                    .mark_completed(&job.queue, job.id, result.clone())
                    .await?;
                self.processed += 1;
                self.reporter
                    .completed(&stored, self.handler.as_ref(), &result);
            }
            Err(error) => {
                let stored = self
                    .store
                    .mark_failed(&job.queue, job.id, &error.to_string())
                    .await?;
                self.processed += 1;
                self.failed += 1;
                self.reporter.failed(&stored, self.handler.as_ref(), &error);
            }
        }

        Ok(())
    }
}

/// Worker actor arguments.
pub struct WorkerArgs<S> {
    pub worker_id: WorkerId,
    pub queue: String,
    pub store: Arc<S>,
    pub handler: Arc<dyn JobHandler>,
    pub reporter: OutcomeReporter,
    pub config: WorkerConfig,
    exit: Option<ExitSender>,
}

/// Worker actor that polls one queue.
///
/// Messages are handled one at a time, so a `Shutdown` sent while a job runs
/// is only seen once that job's outcome is stored.
pub struct WorkerActor<S>(PhantomData<fn() -> S>);

impl<S> Default for WorkerActor<S> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<S: JobStore> Actor for WorkerActor<S> {
    type Msg = WorkerMessage;
    type State = WorkerActorState<S>;
    type Arguments = WorkerArgs<S>;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        // Jobs left Active by a killed worker are not recovered.
        tracing::debug!(
            worker_id = %args.worker_id,
            queue = %args.queue,
            "Stalled active jobs are not reclaimed by this worker"
        );

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            queue: args.queue,
            store: args.store,
            handler: args.handler,
            reporter: args.reporter,
            backoff: args.config.poll_interval(),
            config: args.config,
            claim_failures: 0,
            processed: 0,
            failed: 0,
            exit: args.exit,
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.reporter.worker_started(state.worker_id, &state.queue);
        myself.send_message(WorkerMessage::Poll)?;
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                match state.store.claim_next(&state.queue, state.worker_id).await {
                    Ok(Some(job)) => {
                        state.claim_failures = 0;
                        state.backoff = state.config.poll_interval();

                        let job_id = job.id;
                        if let Err(e) = state.process(job).await {
                            if matches!(e, StoreError::InvalidTransition { .. }) {
                                tracing::error!(
                                    worker_id = %state.worker_id,
                                    queue = %state.queue,
                                    job_id = %job_id,
                                    error = %e,
                                    "Claimed job was not active when finishing"
                                );
                            } else {
                                tracing::error!(
                                    worker_id = %state.worker_id,
                                    queue = %state.queue,
                                    job_id = %job_id,
                                    error = %e,
                                    "Failed to record job outcome"
                                );
                            }
                            state.report_exit(Err(WorkerError::Store(e)));
                            myself.stop(Some("store failure".into()));
                            return Ok(());
                        }

                        myself.send_message(WorkerMessage::Poll)?;
                    }

                    Ok(None) => {
                        state.claim_failures = 0;
                        let delay = state.next_backoff();
                        myself.send_after(delay, || WorkerMessage::Poll);
                    }

                    Err(e) => {
                        state.claim_failures += 1;
                        if state.claim_failures > state.config.store_retry_limit {
                            tracing::error!(
                                worker_id = %state.worker_id,
                                queue = %state.queue,
                                attempts = state.claim_failures,
                                error = %e,
                                "Giving up after repeated claim failures"
                            );
                            state.report_exit(Err(WorkerError::Store(e)));
                            myself.stop(Some("store unavailable".into()));
                            return Ok(());
                        }

                        let delay = state.next_backoff();
                        tracing::warn!(
                            worker_id = %state.worker_id,
                            queue = %state.queue,
                            attempt = state.claim_failures,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Failed to claim job"
                        );
                        myself.send_after(delay, || WorkerMessage::Poll);
                    }
                }
            }

            WorkerMessage::Shutdown => {
                tracing::info!(
                    worker_id = %state.worker_id,
                    queue = %state.queue,
                    "Shutting down worker"
                );
                let processed = state.processed;
                state.report_exit(Ok(processed));
                myself.stop(None);
            }

            WorkerMessage::GetStatus { reply } => {
                let _ = reply.send(state.status());
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state
            .reporter
            .worker_stopped(state.worker_id, &state.queue, state.processed);
        Ok(())
    }
}

/// Handle to a running worker.
pub struct WorkerHandle {
    worker_id: WorkerId,
    queue: String,
    actor: ActorRef<WorkerMessage>,
    task: JoinHandle<()>,
    exit: oneshot::Receiver<Result<u64, WorkerError>>,
}

impl WorkerHandle {
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn actor(&self) -> &ActorRef<WorkerMessage> {
        &self.actor
    }

    /// Ask the worker to stop once its current job, if any, is recorded.
    pub fn shutdown(&self) {
        // Already stopped workers have nothing to drain.
        let _ = self.actor.send_message(WorkerMessage::Shutdown);
    }

    /// Current counters.
    ///
    /// Answered between jobs, so this waits for an in-flight handler.
    pub async fn status(&self) -> Result<WorkerStatus, WorkerError> {
        match self
            .actor
            .call(|reply| WorkerMessage::GetStatus { reply }, None)
            .await
        {
            Ok(ractor::rpc::CallResult::Success(status)) => Ok(status),
            Ok(_) => Err(WorkerError::Terminated(format!(
                "worker {} did not answer",
                self.worker_id
            ))),
            Err(e) => Err(WorkerError::Terminated(e.to_string())),
        }
    }

    /// Wait for the worker to stop.
    ///
    /// Returns the number of jobs processed, or the store error that stopped
    /// the worker.
    pub async fn join(self) -> Result<u64, WorkerError> {
        if let Err(e) = self.task.await {
            return Err(WorkerError::Terminated(e.to_string()));
        }
        match self.exit.await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Terminated(format!(
                "worker {} stopped without reporting",
                self.worker_id
            ))),
        }
    }

    /// Shut down and wait.
    pub async fn stop(self) -> Result<u64, WorkerError> {
        self.shutdown();
        self.join().await
    }
}

/// Long-running consumer for one handler.
///
/// ```ignore
/// let worker = WorkerLoop::new(store, Arc::new(SendEmail), reporter, config);
/// let processed = worker.run().await?;
/// ```
pub struct WorkerLoop<S> {
    store: Arc<S>,
    handler: Arc<dyn JobHandler>,
    reporter: OutcomeReporter,
    config: WorkerConfig,
}

impl<S: JobStore> WorkerLoop<S> {
    pub fn new(
        store: Arc<S>,
        handler: Arc<dyn JobHandler>,
        reporter: OutcomeReporter,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            handler,
            reporter,
            config,
        }
    }

    /// Queue consumed when no explicit queue is given.
    pub fn queue_name(&self) -> String {
        self.handler.queue_name()
    }

    /// Start a worker on `queue`, or the handler's own queue.
    pub async fn spawn(&self, queue: Option<&str>) -> Result<WorkerHandle, WorkerError> {
        self.start(queue, None).await
    }

    /// Start a worker and wait until it stops.
    pub async fn run(self) -> Result<u64, WorkerError> {
        self.spawn(None).await?.join().await
    }

    /// Like [`WorkerLoop::run`], consuming `queue` instead of the handler's
    /// own queue.
    pub async fn run_on(self, queue: &str) -> Result<u64, WorkerError> {
        self.spawn(Some(queue)).await?.join().await
    }

    pub(crate) async fn spawn_linked(
        &self,
        supervisor: ActorCell,
    ) -> Result<WorkerHandle, WorkerError> {
        self.start(None, Some(supervisor)).await
    }

    async fn start(
        &self,
        queue: Option<&str>,
        supervisor: Option<ActorCell>,
    ) -> Result<WorkerHandle, WorkerError> {
        let queue = queue.map(str::to_string).unwrap_or_else(|| self.queue_name());
        validate_queue_name(&queue).map_err(WorkerError::InvalidQueueName)?;

        let worker_id = WorkerId::new();
        let (exit_tx, exit_rx) = oneshot::channel();
        let args = WorkerArgs {
            worker_id,
            queue: queue.clone(),
            store: self.store.clone(),
            handler: self.handler.clone(),
            reporter: self.reporter.clone(),
            config: self.config.clone(),
            exit: Some(exit_tx),
        };

        let name = Some(format!("worker-{}", worker_id));
        let spawned = match supervisor {
            Some(supervisor) => {
                Actor::spawn_linked(name, WorkerActor::default(), args, supervisor).await
            }
            None => Actor::spawn(name, WorkerActor::default(), args).await,
        };
        let (actor, task) = spawned.map_err(|e| WorkerError::Spawn(e.to_string()))?;

        Ok(WorkerHandle {
            worker_id,
            queue,
            actor,
            task,
            exit: exit_rx,
        })
    }
}
