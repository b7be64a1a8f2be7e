//! The replay driver: acknowledged writes, buffer transfers, and frame jobs
//! on one transport session.
//!
//! [`Driver`] owns the session, its notification dispatcher, and the frame
//! sequencer. All of its methods take `&mut self`, so a buffer transfer and
//! a frame job can never write to the session at the same time. Use it
//! directly from one task, or hand it to [`Driver::spawn`](Driver::spawn)
//! and talk to it through a [`DriverHandle`](super::DriverHandle).

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::DriverConfig;
use crate::core::{
    AckStatus, DeviceAddress, DriverError, DriverResult, JobFailure, TransferFailure,
};
use crate::job::{Advance, FrameSequence, FrameSequencer, JobId};
use crate::transport::{
    BleLink, Connector, Notification, NotificationDispatcher, TransportSession, split,
};

/// A successful chunk acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckReceipt {
    /// Notification payload.
    pub payload: Vec<u8>,
    /// Time between the write and the notification.
    pub latency: Duration,
}

/// Summary of a completed buffer transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Bytes sent.
    pub bytes: usize,
    /// Chunks sent, each acknowledged.
    pub chunks: usize,
    /// Chunk size derived from the MTU.
    pub chunk_size: usize,
    /// MTU at the start of the transfer.
    pub mtu: u16,
    /// Payload of the final acknowledgment, if any chunk was sent.
    pub last_ack: Option<Vec<u8>>,
}

/// Summary of a completed frame job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// The job.
    pub job: JobId,
    /// Frames written.
    pub frames: usize,
    /// Total bytes written.
    pub bytes: usize,
}

/// Outcome of feeding one notification to a running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobProgress {
    /// Frame `index` was written; waiting for its notification.
    Sent {
        /// Index of the frame just written.
        index: usize,
    },
    /// The final notification arrived.
    Complete(JobReport),
    /// No job was in progress.
    Ignored,
}

/// Replay driver for one session.
#[derive(Debug)]
pub struct Driver<L: BleLink> {
    session: TransportSession<L>,
    dispatcher: NotificationDispatcher,
    sequencer: FrameSequencer,
    config: DriverConfig,
}

impl<L: BleLink> Driver<L> {
    /// Create a driver on an open session.
    pub fn new(
        session: TransportSession<L>,
        dispatcher: NotificationDispatcher,
        config: DriverConfig,
    ) -> Self {
        Self {
            session,
            dispatcher,
            sequencer: FrameSequencer::new(),
            config,
        }
    }

    /// Open a session on a connected link.
    pub fn open(link: L, config: DriverConfig) -> DriverResult<Self> {
        let (session, dispatcher) = TransportSession::open(link, config.session)?;
        Ok(Self::new(session, dispatcher, config))
    }

    /// Connect to `address` and open a session.
    pub async fn connect<C>(
        connector: &C,
        address: DeviceAddress,
        config: DriverConfig,
    ) -> DriverResult<Self>
    where
        C: Connector<Link = L>,
    {
        let (session, dispatcher) =
            TransportSession::connect(connector, address, config.session).await?;
        Ok(Self::new(session, dispatcher, config))
    }

    /// Write one chunk and wait for the notification acknowledging it.
    ///
    /// Stale notifications queued before the write are discarded. Exactly one
    /// write is issued; a refused write fails immediately.
    pub async fn send_chunk_wait_ack(
        &mut self,
        chunk: &[u8],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> DriverResult<AckReceipt> {
        if self.sequencer.is_in_progress() {
            return Err(DriverError::Busy);
        }
        if cancel.is_cancelled() {
            return Err(DriverError::Cancelled);
        }

        self.dispatcher.arm();
        self.session.write(chunk)?;
        let sent_at = Instant::now();

        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DriverError::Cancelled),
            received = recv_within(&mut self.dispatcher, Some(timeout)) => received,
        };
        let notification = received.inspect_err(|e| {
            warn!(len = chunk.len(), error = %e, "no acknowledgment");
        })?;
        self.dispatcher.settle();

        let latency = notification.received_at().saturating_duration_since(sent_at);
        match self.config.ack_validator.check(notification.payload()) {
            AckStatus::Success => Ok(AckReceipt {
                payload: notification.into_payload(),
                latency,
            }),
            AckStatus::Failure(code) => {
                let payload = notification.into_payload();
                warn!(?code, payload = %hex::encode(&payload), "acknowledgment rejected");
                Err(DriverError::AckRejected { code, payload })
            }
        }
    }

    /// Send `buffer` in MTU-sized chunks, each acknowledged before the next.
    ///
    /// The MTU is read from the link when the transfer starts. The transfer
    /// stops at the first failing chunk; chunks already acknowledged stay
    /// sent.
    pub async fn send_large_buffer(
        &mut self,
        buffer: &[u8],
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferFailure> {
        if self.sequencer.is_in_progress() {
            warn!(bytes = buffer.len(), "transfer rejected: frame job in progress");
            return Err(TransferFailure::new(0, DriverError::Busy));
        }

        let mtu = self.session.mtu();
        let chunks = split(buffer, mtu);
        let chunk_size = chunks.chunk_size();
        let total = chunks.len();
        info!(bytes = buffer.len(), mtu, chunk_size, chunks = total, "transfer started");

        let mut last_ack = None;
        for (index, chunk) in chunks.enumerate() {
            let receipt = self
                .send_chunk_wait_ack(chunk.bytes, self.config.ack_timeout, cancel)
                .await
                .map_err(|reason| {
                    warn!(offset = chunk.offset, chunk = index, error = %reason, "transfer stopped");
                    TransferFailure::new(chunk.offset, reason)
                })?;
            debug!(
                offset = chunk.offset,
                len = chunk.len(),
                latency = ?receipt.latency,
                ack = %hex::encode(&receipt.payload),
                "chunk acknowledged"
            );
            last_ack = Some(receipt.payload);

            if index + 1 < total && !self.config.chunk_spacing.is_zero() {
                tokio::time::sleep(self.config.chunk_spacing).await;
            }
        }

        info!(bytes = buffer.len(), chunks = total, "transfer complete");
        Ok(TransferReport {
            bytes: buffer.len(),
            chunks: total,
            chunk_size,
            mtu,
            last_ack,
        })
    }

    /// Admit a frame job and write its first frame.
    ///
    /// Rejected with [`DriverError::JobInProgress`] while another job runs.
    /// If the first write is refused the job is aborted at frame 0.
    pub fn start_job(&mut self, frames: FrameSequence) -> DriverResult<JobId> {
        let (id, first) = self.sequencer.start(frames)?;
        self.dispatcher.arm();
        if let Err(e) = self.session.write(&first) {
            self.sequencer.abort();
            return Err(e);
        }
        debug!(%id, frame = 0, len = first.len(), "frame written");
        Ok(id)
    }

    /// Wait for the next notification on the session.
    ///
    /// Returns `None` once the link has dropped its sink. Cancel safe.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        self.dispatcher.recv().await
    }

    /// Advance the running job on `notification`.
    ///
    /// Waits the settle delay before writing the next frame. Any failure
    /// aborts the job.
    pub async fn handle_notification(
        &mut self,
        notification: &Notification,
        cancel: &CancellationToken,
    ) -> Result<JobProgress, JobFailure> {
        let in_progress = self.sequencer.is_in_progress();
        let Some(job) = self.sequencer.job_id().filter(|_| in_progress) else {
            debug!(payload = %hex::encode(notification.payload()), "notification outside job");
            return Ok(JobProgress::Ignored);
        };
        if let AckStatus::Failure(code) = self.config.ack_validator.check(notification.payload()) {
            let payload = notification.payload().to_vec();
            return Err(self.fail_job(DriverError::AckRejected { code, payload }));
        }

        match self.sequencer.on_notification() {
            Advance::Ignored => Ok(JobProgress::Ignored),
            Advance::Complete { .. } => Ok(JobProgress::Complete(self.job_report(job))),
            Advance::Write { index, frame } => {
                if cancel.is_cancelled() {
                    return Err(self.fail_job(DriverError::Cancelled));
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(self.fail_job(DriverError::Cancelled)),
                    _ = tokio::time::sleep(self.config.frame_settle_delay) => {}
                }
                self.session
                    .write(&frame)
                    .map_err(|reason| self.fail_job(reason))?;
                debug!(frame = index, len = frame.len(), "frame written");
                Ok(JobProgress::Sent { index })
            }
        }
    }

    /// Run a frame job to completion on the current task.
    ///
    /// A job that is rejected before it starts reports frame 0.
    pub async fn run_job(
        &mut self,
        frames: FrameSequence,
        cancel: &CancellationToken,
    ) -> Result<JobReport, JobFailure> {
        self.start_job(frames)
            .map_err(|reason| JobFailure::new(0, reason))?;

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.fail_job(DriverError::Cancelled)),
                received = recv_within(&mut self.dispatcher, self.config.frame_timeout) => received,
            };
            let notification = received.map_err(|reason| self.fail_job(reason))?;

            match self.handle_notification(&notification, cancel).await? {
                JobProgress::Complete(report) => return Ok(report),
                JobProgress::Sent { .. } | JobProgress::Ignored => {}
            }
        }
    }

    /// Abort the running job, if any. Returns the frame it stopped at.
    pub fn cancel_job(&mut self) -> Option<usize> {
        self.sequencer.abort()
    }

    /// Abort the running job because of `reason`.
    pub fn fail_job(&mut self, reason: DriverError) -> JobFailure {
        let frame_index = self
            .sequencer
            .abort()
            .or(self.sequencer.cursor())
            .unwrap_or(0);
        warn!(job = ?self.sequencer.job_id(), frame_index, error = %reason, "job failed");
        JobFailure::new(frame_index, reason)
    }

    fn job_report(&self, job: JobId) -> JobReport {
        let (frames, bytes) = self
            .sequencer
            .frames()
            .map(|frames| (frames.len(), frames.total_bytes()))
            .unwrap_or_default();
        JobReport { job, frames, bytes }
    }

    /// Check if a frame job is in progress.
    pub fn is_job_in_progress(&self) -> bool {
        self.sequencer.is_in_progress()
    }

    /// The frame sequencer.
    pub fn sequencer(&self) -> &FrameSequencer {
        &self.sequencer
    }

    /// The transport session.
    pub fn session(&self) -> &TransportSession<L> {
        &self.session
    }

    /// The notification dispatcher.
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Abort any running job and disconnect.
    pub fn close(&mut self) {
        if let Some(frame_index) = self.sequencer.abort() {
            warn!(frame_index, "closing with a job in progress");
        }
        self.session.close();
    }
}

/// Wait for a notification, giving up after `timeout` when one is set.
async fn recv_within(
    dispatcher: &mut NotificationDispatcher,
    timeout: Option<Duration>,
) -> DriverResult<Notification> {
    let received = match timeout {
        Some(limit) => tokio::time::timeout(limit, dispatcher.recv())
            .await
            .map_err(|_| DriverError::AckTimeout { timeout: limit })?,
        None => dispatcher.recv().await,
    };
    received.ok_or_else(|| DriverError::TransportUnavailable("notification channel closed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StatusByte;
    use crate::job::Frame;
    use crate::transport::mock::{LinkEvent, MockConnector, MockLink};

    const ACK: &[u8] = &[0x66, 0x00];

    fn driver(link: &MockLink) -> Driver<MockLink> {
        Driver::open(link.clone(), DriverConfig::default()).unwrap()
    }

    fn buffer(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    fn frames(n: u8) -> FrameSequence {
        (0..n).map(|i| Frame::from(vec![0x66, i, 0x1b])).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_ack_receipt() {
        let link = MockLink::new().with_auto_ack(ACK);
        let mut driver = driver(&link);

        let receipt = driver
            .send_chunk_wait_ack(&[1, 2, 3], Duration::from_millis(100), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(receipt.payload, ACK);
        assert_eq!(receipt.latency, Duration::ZERO);
        assert!(driver.dispatcher().ack_state().is_received());
        assert!(!driver.dispatcher().ack_state().is_expected());
        assert_eq!(driver.dispatcher().ack_state().last_payload(), ACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_discards_stale_notification() {
        let link = MockLink::new();
        let mut driver = driver(&link);
        link.notify(&[0xEE]);

        let err = driver
            .send_chunk_wait_ack(&[1], Duration::from_millis(100), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DriverError::AckTimeout {
                timeout: Duration::from_millis(100)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_interleaves_writes_and_acks() {
        let link = MockLink::new().with_mtu(23).with_auto_ack(ACK);
        let mut driver = driver(&link);
        let data = buffer(100);

        let report = driver
            .send_large_buffer(&data, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            report,
            TransferReport {
                bytes: 100,
                chunks: 5,
                chunk_size: 20,
                mtu: 23,
                last_ack: Some(ACK.to_vec()),
            }
        );

        let events = link.events();
        assert_eq!(events.len(), 10);
        for (i, pair) in events.chunks(2).enumerate() {
            assert_eq!(pair[0], LinkEvent::Write(data[i * 20..(i + 1) * 20].to_vec()));
            assert_eq!(pair[1], LinkEvent::Notify(ACK.to_vec()));
        }
        assert_eq!(link.writes().concat(), data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_chunk_waits_for_ack() {
        let link = MockLink::new().with_mtu(23);
        let mut driver = driver(&link);
        let data = buffer(40);
        let cancel = CancellationToken::new();

        let (result, ()) = tokio::join!(driver.send_large_buffer(&data, &cancel), async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            assert_eq!(link.write_count(), 1);
            assert!(link.notify(ACK));

            tokio::time::sleep(Duration::from_millis(400)).await;
            assert_eq!(link.write_count(), 2);
            assert!(link.notify(&[0x66, 0x01]));
        });

        let report = result.unwrap();
        assert_eq!(report.chunks, 2);
        assert_eq!(report.last_ack, Some(vec![0x66, 0x01]));
        assert_eq!(
            link.events(),
            vec![
                LinkEvent::Write(data[..20].to_vec()),
                LinkEvent::Notify(ACK.to_vec()),
                LinkEvent::Write(data[20..].to_vec()),
                LinkEvent::Notify(vec![0x66, 0x01]),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_lost_during_ack_wait() {
        let link = MockLink::new();
        let mut driver = driver(&link);
        let data = buffer(60);
        let cancel = CancellationToken::new();

        let (result, ()) = tokio::join!(driver.send_large_buffer(&data, &cancel), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            link.disconnect();
        });

        let failure = result.unwrap_err();
        assert_eq!(failure.offset, 0);
        assert!(matches!(failure.reason, DriverError::TransportUnavailable(_)));
        assert!(failure.reason.is_fatal());
        assert_eq!(link.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_uses_current_mtu() {
        let link = MockLink::new().with_mtu(23).with_auto_ack(ACK);
        let mut driver = driver(&link);
        link.set_mtu(103);

        let report = driver
            .send_large_buffer(&buffer(250), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.chunk_size, 100);
        assert_eq!(report.chunks, 3);
        assert_eq!(link.writes().last().unwrap().len(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_spacing_between_chunks_only() {
        let link = MockLink::new().with_auto_ack(ACK);
        let mut driver = driver(&link);

        let started = Instant::now();
        driver
            .send_large_buffer(&buffer(60), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_after_first_chunk() {
        let link = MockLink::new();
        let mut driver = driver(&link);

        let started = Instant::now();
        let failure = driver
            .send_large_buffer(&buffer(100), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.offset, 0);
        assert_eq!(
            failure.reason,
            DriverError::AckTimeout {
                timeout: Duration::from_millis(1000)
            }
        );
        assert_eq!(link.write_count(), 1);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_write_reports_offset() {
        let link = MockLink::new().with_auto_ack(ACK).reject_write_at(2);
        let mut driver = driver(&link);

        let failure = driver
            .send_large_buffer(&buffer(100), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure, TransferFailure::new(40, DriverError::WriteRejected { len: 20 }));
        assert_eq!(link.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_ack_payload() {
        let link = MockLink::new().with_auto_ack(&[0x66, 0x07]);
        let config = DriverConfig::builder()
            .ack_validator(StatusByte::new(1, 0x00))
            .build();
        let mut driver = Driver::open(link.clone(), config).unwrap();

        let failure = driver
            .send_large_buffer(&buffer(50), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.offset, 0);
        assert_eq!(
            failure.reason,
            DriverError::AckRejected {
                code: Some(0x07),
                payload: vec![0x66, 0x07]
            }
        );
        assert_eq!(link.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_cancelled_before_start() {
        let link = MockLink::new().with_auto_ack(ACK);
        let mut driver = driver(&link);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = driver.send_large_buffer(&buffer(40), &cancel).await.unwrap_err();
        assert_eq!(failure, TransferFailure::new(0, DriverError::Cancelled));
        assert_eq!(link.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_cancelled_while_waiting() {
        let link = MockLink::new();
        let mut driver = driver(&link);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let data = buffer(40);

        let (result, ()) = tokio::join!(driver.send_large_buffer(&data, &cancel), async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });
        assert_eq!(result.unwrap_err(), TransferFailure::new(0, DriverError::Cancelled));
        assert_eq!(link.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_buffer() {
        let link = MockLink::new();
        let mut driver = driver(&link);

        let report = driver
            .send_large_buffer(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(report.last_ack, None);
        assert_eq!(link.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_four_frames_four_notifications() {
        let link = MockLink::new();
        let mut driver = driver(&link);
        let cancel = CancellationToken::new();
        let sequence = frames(4);

        driver.start_job(sequence.clone()).unwrap();
        assert_eq!(link.writes(), vec![sequence[0].to_vec()]);

        for index in 1..4 {
            assert!(link.notify(ACK));
            let notification = driver.next_notification().await.unwrap();
            let progress = driver.handle_notification(&notification, &cancel).await.unwrap();
            assert_eq!(progress, JobProgress::Sent { index });
            assert_eq!(link.write_count(), index + 1);
        }

        link.notify(ACK);
        let notification = driver.next_notification().await.unwrap();
        let progress = driver.handle_notification(&notification, &cancel).await.unwrap();
        assert!(matches!(progress, JobProgress::Complete(JobReport { frames: 4, bytes: 12, .. })));
        assert!(!driver.is_job_in_progress());

        let written: Vec<Vec<u8>> = sequence.iter().map(|frame| frame.to_vec()).collect();
        assert_eq!(link.writes(), written);

        link.notify(ACK);
        let notification = driver.next_notification().await.unwrap();
        assert_eq!(
            driver.handle_notification(&notification, &cancel).await,
            Ok(JobProgress::Ignored)
        );
        assert_eq!(link.write_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_job_waits_settle_delay() {
        let link = MockLink::new().with_auto_ack(ACK);
        let mut driver = driver(&link);

        let started = Instant::now();
        let report = driver
            .run_job(frames(4), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.frames, 4);
        assert_eq!(link.write_count(), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_rejected_while_in_progress() {
        let link = MockLink::new();
        let mut driver = driver(&link);

        driver.start_job(frames(3)).unwrap();
        assert_eq!(driver.start_job(frames(2)), Err(DriverError::JobInProgress));
        assert_eq!(link.write_count(), 1);

        let failure = driver
            .send_large_buffer(&buffer(10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.reason, DriverError::Busy);

        assert_eq!(driver.cancel_job(), Some(0));
        assert!(driver.start_job(frames(2)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_write_failure_aborts_job() {
        let link = MockLink::new().with_auto_ack(ACK).reject_write_at(2);
        let mut driver = driver(&link);

        let failure = driver
            .run_job(frames(4), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            failure,
            JobFailure::new(2, DriverError::WriteRejected { len: 3 })
        );
        assert!(!driver.is_job_in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_frame_write_failure() {
        let link = MockLink::new().reject_write_at(0);
        let mut driver = driver(&link);

        assert_eq!(
            driver.start_job(frames(2)),
            Err(DriverError::WriteRejected { len: 3 })
        );
        assert!(!driver.is_job_in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_timeout() {
        let link = MockLink::new();
        let config = DriverConfig::builder()
            .frame_timeout(Duration::from_millis(200))
            .build();
        let mut driver = Driver::open(link.clone(), config).unwrap();

        let failure = driver
            .run_job(frames(3), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.frame_index, 0);
        assert!(failure.reason.is_peer_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_rejected_ack_payload() {
        let link = MockLink::new().with_auto_ack(&[0x66, 0x01]);
        let config = DriverConfig::builder()
            .ack_validator(StatusByte::new(1, 0x00))
            .build();
        let mut driver = Driver::open(link.clone(), config).unwrap();

        let failure = driver
            .run_job(frames(3), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.frame_index, 0);
        assert!(matches!(failure.reason, DriverError::AckRejected { code: Some(1), .. }));
        assert_eq!(link.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_cancelled_during_settle() {
        let link = MockLink::new().with_auto_ack(ACK);
        let mut driver = driver(&link);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let (result, ()) = tokio::join!(driver.run_job(frames(4), &cancel), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        assert_eq!(result.unwrap_err(), JobFailure::new(1, DriverError::Cancelled));
        assert_eq!(link.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_and_close() {
        let link = MockLink::new();
        let connector = MockConnector::new(link.clone());
        let address: DeviceAddress = "58:8C:81:72:AB:0A".parse().unwrap();

        let mut driver = Driver::connect(&connector, address, DriverConfig::default())
            .await
            .unwrap();
        assert_eq!(driver.session().address(), Some(address));

        driver.start_job(frames(2)).unwrap();
        driver.close();
        assert!(link.is_disconnected());
        assert!(!driver.is_job_in_progress());
    }
}
