//! Driver task and the handles used to talk to it.
//!
//! [`Driver::spawn`] moves the driver onto its own tokio task. Everything
//! mutable (ack state, frame cursor, the job in progress) stays on that task;
//! callers only hold channel ends.

use std::future::pending;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::driver::{Driver, JobProgress, JobReport, TransferReport};
use crate::core::{DriverError, DriverResult, JobFailure, TransferFailure};
use crate::job::{FrameSequence, JobId};
use crate::transport::{BleLink, Notification, NotificationStats};

#[derive(Debug)]
enum Command {
    SendBuffer {
        bytes: Vec<u8>,
        cancel: CancellationToken,
        reply: oneshot::Sender<Result<TransferReport, TransferFailure>>,
    },
    StartJob {
        frames: FrameSequence,
        reply: oneshot::Sender<DriverResult<JobHandle>>,
    },
    Stats {
        reply: oneshot::Sender<NotificationStats>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Progress of a frame job as published by the driver task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Frame `frame` has been written and awaits its notification.
    Running {
        /// Index of the last frame written.
        frame: usize,
    },
    /// Every frame was acknowledged.
    Complete(JobReport),
    /// The job was aborted.
    Failed(JobFailure),
}

impl JobStatus {
    /// Check if the job has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running { .. })
    }
}

/// An admitted frame job.
///
/// Dropping the handle does not stop the job; use [`cancel`](Self::cancel).
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    status: watch::Receiver<JobStatus>,
    cancel: CancellationToken,
}

impl JobHandle {
    /// The job's identifier.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Latest published status.
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Ask the driver to abort the job at the next frame boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the job to finish.
    pub async fn wait(mut self) -> Result<JobReport, JobFailure> {
        let terminal = self
            .status
            .wait_for(JobStatus::is_terminal)
            .await
            .map(|status| status.clone());
        let status = terminal.unwrap_or_else(|_| self.status.borrow().clone());

        match status {
            JobStatus::Complete(report) => Ok(report),
            JobStatus::Failed(failure) => Err(failure),
            JobStatus::Running { frame } => Err(JobFailure::new(frame, DriverError::DriverClosed)),
        }
    }
}

/// Cloneable handle to a running driver task.
///
/// The task stops when [`shutdown`](Self::shutdown) is called or every
/// handle has been dropped.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
}

impl DriverHandle {
    /// Send `bytes` as an acknowledged chunked transfer.
    pub async fn send_large_buffer(
        &self,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<TransferReport, TransferFailure> {
        self.send_large_buffer_with(bytes, CancellationToken::new())
            .await
    }

    /// Send `bytes`, stopping at the next chunk boundary once `cancel` fires.
    pub async fn send_large_buffer_with(
        &self,
        bytes: impl Into<Vec<u8>>,
        cancel: CancellationToken,
    ) -> Result<TransferReport, TransferFailure> {
        let closed = || TransferFailure::new(0, DriverError::DriverClosed);
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SendBuffer {
                bytes: bytes.into(),
                cancel,
                reply,
            })
            .await
            .map_err(|_| closed())?;
        rx.await.map_err(|_| closed())?
    }

    /// Start a frame job.
    ///
    /// Frame 0 has been written when this returns `Ok`. Rejected with
    /// [`DriverError::JobInProgress`] while another job runs.
    pub async fn start_job(&self, frames: impl Into<FrameSequence>) -> DriverResult<JobHandle> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::StartJob {
                frames: frames.into(),
                reply,
            })
            .await
            .map_err(|_| DriverError::DriverClosed)?;
        rx.await.map_err(|_| DriverError::DriverClosed)?
    }

    /// Notification counters of the session.
    ///
    /// Notifications are consumed as they arrive, including while the driver
    /// is idle.
    pub async fn notification_stats(&self) -> DriverResult<NotificationStats> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats { reply })
            .await
            .map_err(|_| DriverError::DriverClosed)?;
        rx.await.map_err(|_| DriverError::DriverClosed)
    }

    /// Stop the driver task and disconnect.
    ///
    /// A job still in progress fails with [`DriverError::DriverClosed`].
    pub async fn shutdown(&self) -> DriverResult<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| DriverError::DriverClosed)?;
        rx.await.map_err(|_| DriverError::DriverClosed)
    }

    /// Check if the driver task has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

impl<L: BleLink> Driver<L> {
    /// Move the driver onto a new tokio task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> DriverHandle {
        let (tx, rx) = mpsc::channel(self.config().command_queue_depth.max(1));
        let task = DriverTask {
            driver: self,
            commands: rx,
            job: None,
            listening: true,
        };
        tokio::spawn(task.run());
        DriverHandle { commands: tx }
    }
}

#[derive(Debug)]
struct ActiveJob {
    id: JobId,
    status: watch::Sender<JobStatus>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

struct DriverTask<L: BleLink> {
    driver: Driver<L>,
    commands: mpsc::Receiver<Command>,
    job: Option<ActiveJob>,
    listening: bool,
}

impl<L: BleLink> DriverTask<L> {
    async fn run(mut self) {
        debug!("driver task started");

        let shutdown = loop {
            let job_active = self.job.is_some();
            let listening = self.listening;
            let deadline = self.job.as_ref().and_then(|job| job.deadline);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::SendBuffer { bytes, cancel, reply }) => {
                        let result = self.driver.send_large_buffer(&bytes, &cancel).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::StartJob { frames, reply }) => {
                        let _ = reply.send(self.start_job(frames));
                    }
                    Some(Command::Stats { reply }) => {
                        let _ = reply.send(self.driver.dispatcher().stats());
                    }
                    Some(Command::Shutdown { reply }) => break Some(reply),
                    None => break None,
                },
                received = self.driver.next_notification(), if listening => {
                    self.on_notification(received).await;
                }
                () = job_cancelled(self.job.as_ref()), if job_active => {
                    let failure = self.driver.fail_job(DriverError::Cancelled);
                    self.finish_job(Err(failure));
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let timeout = self.driver.config().frame_timeout.unwrap_or_default();
                    let failure = self.driver.fail_job(DriverError::AckTimeout { timeout });
                    self.finish_job(Err(failure));
                }
            }
        };

        self.commands.close();
        if self.job.is_some() {
            let failure = self.driver.fail_job(DriverError::DriverClosed);
            self.finish_job(Err(failure));
        }
        self.driver.close();
        info!("driver task stopped");

        if let Some(reply) = shutdown {
            let _ = reply.send(());
        }
    }

    fn start_job(&mut self, frames: FrameSequence) -> DriverResult<JobHandle> {
        if !self.listening {
            return Err(DriverError::TransportUnavailable(
                "notification channel closed".into(),
            ));
        }
        let id = self.driver.start_job(frames)?;
        let (status, status_rx) = watch::channel(JobStatus::Running { frame: 0 });
        let cancel = CancellationToken::new();
        self.job = Some(ActiveJob {
            id,
            status,
            cancel: cancel.clone(),
            deadline: self.frame_deadline(),
        });
        Ok(JobHandle {
            id,
            status: status_rx,
            cancel,
        })
    }

    async fn on_notification(&mut self, received: Option<Notification>) {
        let Some(notification) = received else {
            warn!("notification channel closed");
            self.listening = false;
            if self.job.is_some() {
                let failure = self.driver.fail_job(DriverError::TransportUnavailable(
                    "notification channel closed".into(),
                ));
                self.finish_job(Err(failure));
            }
            return;
        };

        let cancel = self
            .job
            .as_ref()
            .map(|job| job.cancel.clone())
            .unwrap_or_default();
        let progress = self.driver.handle_notification(&notification, &cancel).await;

        match progress {
            Ok(JobProgress::Sent { index }) => {
                let deadline = self.frame_deadline();
                if let Some(job) = self.job.as_mut() {
                    job.deadline = deadline;
                    job.status.send_replace(JobStatus::Running { frame: index });
                }
            }
            Ok(JobProgress::Complete(report)) => self.finish_job(Ok(report)),
            Ok(JobProgress::Ignored) => {}
            Err(failure) => self.finish_job(Err(failure)),
        }
    }

    fn finish_job(&mut self, outcome: Result<JobReport, JobFailure>) {
        let Some(job) = self.job.take() else {
            return;
        };
        let status = match outcome {
            Ok(report) => {
                info!(id = %job.id, frames = report.frames, bytes = report.bytes, "job complete");
                JobStatus::Complete(report)
            }
            Err(failure) => {
                warn!(id = %job.id, error = %failure, "job failed");
                JobStatus::Failed(failure)
            }
        };
        job.status.send_replace(status);
    }

    fn frame_deadline(&self) -> Option<Instant> {
        self.driver
            .config()
            .frame_timeout
            .map(|timeout| Instant::now() + timeout)
    }
}

async fn job_cancelled(job: Option<&ActiveJob>) {
    match job {
        Some(job) => job.cancel.cancelled().await,
        None => pending().await,
    }
}
