//! Runs the [`Controller`] on tokio.
//!
//! The driver task is the only owner of the controller. Network calls and
//! timers are spawned as separate tasks that report back as [`Input`]s over
//! an mpsc channel. Each session gets a [`CancellationToken`]; superseding or
//! ending a session cancels it, which aborts that session's sleeps and
//! in-flight requests. Deliveries are the exception: once a job is done on
//! the backend its file is saved even if a newer session takes over, and
//! only driver shutdown aborts them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use grab_proto::media::DownloadJob;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::view::{start_error_fallback, DOWNLOAD_FAILED};
use crate::controller::{Controller, Effect, Input, Notice, ProgressView, SessionToken};
use crate::deliver::ArtifactSink;
use crate::quota::QuotaReader;
use crate::runner::JobRunner;

/// Requests from the front-end.
#[derive(Debug)]
pub enum DriverCommand {
    Start(DownloadJob),
    RefreshQuota,
    Shutdown,
}

/// What the front-end should redraw.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverUpdate {
    Progress(ProgressView),
    Quota(i64),
    Notice(Notice),
}

/// Cheap handle for sending commands to a running driver.
#[derive(Clone)]
pub struct ProgressHandle {
    tx: mpsc::Sender<DriverCommand>,
}

type SendResult = Result<(), mpsc::error::SendError<DriverCommand>>;

impl ProgressHandle {
    pub async fn start(&self, job: DownloadJob) -> SendResult {
        self.tx.send(DriverCommand::Start(job)).await
    }

    pub async fn refresh_quota(&self) -> SendResult {
        self.tx.send(DriverCommand::RefreshQuota).await
    }

    pub async fn shutdown(&self) -> SendResult {
        self.tx.send(DriverCommand::Shutdown).await
    }
}

pub struct ProgressDriver {
    controller: Controller,
    runner: Arc<dyn JobRunner>,
    sink: Arc<dyn ArtifactSink>,
    quota: Arc<dyn QuotaReader>,
    updates: mpsc::Sender<DriverUpdate>,
    inputs: mpsc::Sender<Input>,
    sessions: HashMap<SessionToken, CancellationToken>,
    /// Cancelled when the driver stops; aborts deliveries still running.
    shutdown: CancellationToken,
}

impl ProgressDriver {
    /// Spawn the driver task. Updates arrive on the returned receiver; the
    /// driver stops on [`DriverCommand::Shutdown`] or when every handle is
    /// dropped.
    pub fn spawn(
        controller: Controller,
        runner: Arc<dyn JobRunner>,
        sink: Arc<dyn ArtifactSink>,
        quota: Arc<dyn QuotaReader>,
    ) -> (ProgressHandle, mpsc::Receiver<DriverUpdate>, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (update_tx, update_rx) = mpsc::channel(256);
        let (input_tx, input_rx) = mpsc::channel(64);

        let driver = Self {
            controller,
            runner,
            sink,
            quota,
            updates: update_tx,
            inputs: input_tx,
            sessions: HashMap::new(),
            shutdown: CancellationToken::new(),
        };
        let task = tokio::spawn(driver.run(cmd_rx, input_rx));
        (ProgressHandle { tx: cmd_tx }, update_rx, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<DriverCommand>,
        mut inputs: mpsc::Receiver<Input>,
    ) {
        info!("driver: started");
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(DriverCommand::Start(job)) => {
                        let polling = self.runner.supports_progress_polling(job.kind);
                        self.dispatch(Input::Start { job, polling }).await;
                    }
                    Some(DriverCommand::RefreshQuota) => self.refresh_quota(),
                    Some(DriverCommand::Shutdown) | None => break,
                },
                Some(input) = inputs.recv() => self.dispatch(input).await,
            }
        }

        for (_, cancel) in self.sessions.drain() {
            cancel.cancel();
        }
        self.shutdown.cancel();
        info!("driver: stopped");
    }

    async fn dispatch(&mut self, input: Input) {
        for effect in self.controller.handle(input) {
            self.execute(effect).await;
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Render(view) => self.publish(DriverUpdate::Progress(view)).await,
            Effect::Notice(notice) => self.publish(DriverUpdate::Notice(notice)).await,
            Effect::RefreshQuota => self.refresh_quota(),

            Effect::StartJob { token, job } => {
                let runner = Arc::clone(&self.runner);
                self.spawn_for(token, async move {
                    let result = runner.start(&job).await.map_err(|e| {
                        warn!("driver: start of job {} failed: {}", job.id, e);
                        e.user_message(start_error_fallback(job.kind))
                    });
                    Input::Started { token, result }
                });
            }
            Effect::FetchArtifact { token, job } => {
                let runner = Arc::clone(&self.runner);
                self.spawn_for(token, async move {
                    let result = runner.fetch_artifact(&job).await.map_err(|e| {
                        warn!("driver: fetch of job {} failed: {}", job.id, e);
                        e.user_message(DOWNLOAD_FAILED)
                    });
                    Input::Fetched { token, result }
                });
            }
            Effect::PollAfter {
                token,
                task_id,
                delay,
            } => {
                let runner = Arc::clone(&self.runner);
                self.spawn_for(token, async move {
                    tokio::time::sleep(delay).await;
                    let result = runner.status(&task_id).await.map_err(|e| {
                        if e.is_transport() {
                            debug!("driver: poll of {} did not reach the backend: {}", task_id, e);
                        } else {
                            warn!("driver: poll of {} rejected: {}", task_id, e);
                        }
                        e.to_string()
                    });
                    Input::Polled { token, result }
                });
            }
            Effect::TickAfter { token, delay } => {
                self.spawn_for(token, async move {
                    tokio::time::sleep(delay).await;
                    Input::SimTick { token }
                });
            }
            Effect::FinishStepAfter { token, delay } => {
                self.spawn_for(token, async move {
                    tokio::time::sleep(delay).await;
                    Input::FinishStep { token }
                });
            }
            Effect::DeliverTaskFile {
                token,
                task_id,
                after,
            } => {
                let sink = Arc::clone(&self.sink);
                self.spawn_delivery(async move {
                    tokio::time::sleep(after).await;
                    let result = sink.save_task_file(&task_id).await.map_err(|e| {
                        warn!("driver: saving task {} failed: {}", task_id, e);
                        e.to_string()
                    });
                    Input::Delivered { token, result }
                });
            }
            Effect::SaveBlob {
                token,
                filename,
                bytes,
            } => {
                let sink = Arc::clone(&self.sink);
                self.spawn_delivery(async move {
                    let result = sink.save_blob(bytes, &filename).await.map_err(|e| {
                        warn!("driver: saving {} failed: {}", filename, e);
                        e.to_string()
                    });
                    Input::Delivered { token, result }
                });
            }
            Effect::DismissAfter { token, delay } => {
                self.spawn_for(token, async move {
                    tokio::time::sleep(delay).await;
                    Input::Dismiss { token }
                });
            }

            Effect::Cancel(token) => {
                if let Some(cancel) = self.sessions.remove(&token) {
                    debug!("driver: cancelling session {:?}", token);
                    cancel.cancel();
                }
            }
            Effect::Release(token) => {
                if let Some(cancel) = self.sessions.remove(&token) {
                    cancel.cancel();
                }
            }
        }
    }

    /// Run `work` under the session's cancellation token and feed its result
    /// back into the controller.
    fn spawn_for<F>(&mut self, token: SessionToken, work: F)
    where
        F: Future<Output = Input> + Send + 'static,
    {
        let cancel = self.sessions.entry(token).or_default().clone();
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                input = work => {
                    let _ = inputs.send(input).await;
                }
            }
        });
    }

    /// Like [`Self::spawn_for`], but only driver shutdown cancels `work`.
    /// An aborted delivery leaves no partial file behind (see
    /// [`crate::deliver::DirSink`]).
    fn spawn_delivery<F>(&self, work: F)
    where
        F: Future<Output = Input> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                input = work => {
                    let _ = inputs.send(input).await;
                }
            }
        });
    }

    fn refresh_quota(&self) {
        let quota = Arc::clone(&self.quota);
        let updates = self.updates.clone();
        tokio::spawn(async move {
            if let Some(remaining) = quota.remaining().await {
                let _ = updates.send(DriverUpdate::Quota(remaining)).await;
            }
        });
    }

    async fn publish(&self, update: DriverUpdate) {
        if self.updates.send(update).await.is_err() {
            debug!("driver: update receiver gone");
        }
    }
}
