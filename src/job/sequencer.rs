//! Frame sequencer state machine.
//!
//! ```text
//!            start()                 notification            notification
//!   Idle ────────────▶ Awaiting(0) ─────────────▶ Awaiting(1) ─ ··· ─▶ Complete
//!     ▲                    │                          │
//!     │                    └────── abort() ───────────┴──────────▶ Aborted
//!     └──────────── start() (from Complete / Aborted) ◀────────────────┘
//! ```
//!
//! The sequencer performs no I/O. It tells the caller which frame to write
//! and the caller reports failures back through [`FrameSequencer::abort`].

use std::fmt;

use tracing::{debug, info, warn};

use super::frame::{Frame, FrameSequence};
use crate::core::{DriverError, DriverResult};

/// Identifier of an admitted job, unique per sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// Numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// No job has been started.
    Idle,
    /// Frame `i` was written; waiting for the notification that advances.
    AwaitingFrame(usize),
    /// Every frame was written and the final notification arrived.
    Complete,
    /// The job stopped early while working on `frame_index`.
    Aborted {
        /// Frame being written or awaited when the job stopped.
        frame_index: usize,
    },
}

impl JobState {
    /// Check if a job is in progress.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, JobState::AwaitingFrame(_))
    }

    /// Check if the state is final (`Complete` or `Aborted`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Aborted { .. })
    }
}

/// What the caller must do after a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Write `frame` (index `index`) without response.
    Write {
        /// Index of the frame in the sequence.
        index: usize,
        /// The frame to write.
        frame: Frame,
    },
    /// The sequence is exhausted; the job is complete.
    Complete {
        /// Number of frames written.
        frames: usize,
    },
    /// No job is in progress; the notification means nothing here.
    Ignored,
}

/// Drives one frame job at a time.
#[derive(Debug)]
pub struct FrameSequencer {
    frames: Option<FrameSequence>,
    state: JobState,
    job: Option<JobId>,
    next_id: u64,
}

impl Default for FrameSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSequencer {
    /// Create an idle sequencer.
    pub fn new() -> Self {
        Self {
            frames: None,
            state: JobState::Idle,
            job: None,
            next_id: 1,
        }
    }

    /// Admit a job and return frame 0, which the caller writes immediately.
    ///
    /// Rejected with [`DriverError::JobInProgress`] while another job is
    /// running; the caller must [`abort`](Self::abort) it first.
    pub fn start(&mut self, frames: FrameSequence) -> DriverResult<(JobId, Frame)> {
        if self.state.is_in_progress() {
            warn!(job = ?self.job, "start rejected: job in progress");
            return Err(DriverError::JobInProgress);
        }
        let first = frames.first().cloned().ok_or(DriverError::EmptySequence)?;

        let id = JobId(self.next_id);
        self.next_id += 1;
        info!(%id, frames = frames.len(), bytes = frames.total_bytes(), "job started");

        self.frames = Some(frames);
        self.job = Some(id);
        self.state = JobState::AwaitingFrame(0);
        Ok((id, first))
    }

    /// Advance on a notification.
    pub fn on_notification(&mut self) -> Advance {
        let JobState::AwaitingFrame(current) = self.state else {
            debug!(state = ?self.state, "notification outside job");
            return Advance::Ignored;
        };
        let Some(frames) = self.frames.as_ref() else {
            return Advance::Ignored;
        };

        let next = current + 1;
        match frames.get(next) {
            Some(frame) => {
                self.state = JobState::AwaitingFrame(next);
                debug!(frame = next, len = frame.len(), "advancing");
                Advance::Write {
                    index: next,
                    frame: frame.clone(),
                }
            }
            None => {
                self.state = JobState::Complete;
                info!(job = ?self.job, frames = frames.len(), "all frames sent");
                Advance::Complete {
                    frames: frames.len(),
                }
            }
        }
    }

    /// Stop the job in progress.
    ///
    /// Returns the index of the frame it was working on, or `None` if no job
    /// was in progress.
    pub fn abort(&mut self) -> Option<usize> {
        let JobState::AwaitingFrame(frame_index) = self.state else {
            return None;
        };
        self.state = JobState::Aborted { frame_index };
        warn!(job = ?self.job, frame_index, "job aborted");
        Some(frame_index)
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Check if a job is in progress.
    pub fn is_in_progress(&self) -> bool {
        self.state.is_in_progress()
    }

    /// Index of the last frame handed out, or `None` before the first job.
    pub fn cursor(&self) -> Option<usize> {
        match self.state {
            JobState::Idle => None,
            JobState::AwaitingFrame(index) => Some(index),
            JobState::Aborted { frame_index } => Some(frame_index),
            JobState::Complete => self.frames.as_ref().map(|frames| frames.len()),
        }
    }

    /// Most recently admitted job.
    pub fn job_id(&self) -> Option<JobId> {
        self.job
    }

    /// Frames of the most recently admitted job.
    pub fn frames(&self) -> Option<&FrameSequence> {
        self.frames.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: u8) -> FrameSequence {
        (0..n).map(|i| Frame::from(vec![0xF0 | i, i])).collect()
    }

    #[test]
    fn test_four_frames_four_notifications() {
        let mut sequencer = FrameSequencer::new();
        assert_eq!(sequencer.state(), JobState::Idle);
        assert_eq!(sequencer.cursor(), None);

        let (_, first) = sequencer.start(frames(4)).unwrap();
        assert_eq!(first.as_bytes(), &[0xF0, 0]);
        assert_eq!(sequencer.state(), JobState::AwaitingFrame(0));

        for expected in 1..4usize {
            match sequencer.on_notification() {
                Advance::Write { index, frame } => {
                    assert_eq!(index, expected);
                    assert_eq!(frame.as_bytes(), &[0xF0 | expected as u8, expected as u8]);
                }
                other => panic!("unexpected {other:?}"),
            }
            assert!(sequencer.is_in_progress());
        }

        assert_eq!(sequencer.on_notification(), Advance::Complete { frames: 4 });
        assert!(!sequencer.is_in_progress());
        assert_eq!(sequencer.state(), JobState::Complete);
        assert_eq!(sequencer.cursor(), Some(4));

        assert_eq!(sequencer.on_notification(), Advance::Ignored);
    }

    #[test]
    fn test_single_frame_job() {
        let mut sequencer = FrameSequencer::new();
        sequencer.start(frames(1)).unwrap();
        assert_eq!(sequencer.on_notification(), Advance::Complete { frames: 1 });
    }

    #[test]
    fn test_notification_while_idle_ignored() {
        let mut sequencer = FrameSequencer::new();
        assert_eq!(sequencer.on_notification(), Advance::Ignored);
        assert_eq!(sequencer.state(), JobState::Idle);
    }

    #[test]
    fn test_restart_rejected_while_in_progress() {
        let mut sequencer = FrameSequencer::new();
        let (first_id, _) = sequencer.start(frames(3)).unwrap();
        sequencer.on_notification();

        assert_eq!(sequencer.start(frames(2)), Err(DriverError::JobInProgress));
        assert_eq!(sequencer.state(), JobState::AwaitingFrame(1));
        assert_eq!(sequencer.job_id(), Some(first_id));
        assert_eq!(sequencer.frames().unwrap().len(), 3);
    }

    #[test]
    fn test_restart_after_abort() {
        let mut sequencer = FrameSequencer::new();
        let (first_id, _) = sequencer.start(frames(3)).unwrap();
        sequencer.on_notification();

        assert_eq!(sequencer.abort(), Some(1));
        assert_eq!(sequencer.state(), JobState::Aborted { frame_index: 1 });
        assert_eq!(sequencer.abort(), None);
        assert_eq!(sequencer.on_notification(), Advance::Ignored);

        let (second_id, _) = sequencer.start(frames(2)).unwrap();
        assert!(second_id > first_id);
        assert_eq!(sequencer.cursor(), Some(0));
    }

    #[test]
    fn test_restart_after_complete() {
        let mut sequencer = FrameSequencer::new();
        sequencer.start(frames(1)).unwrap();
        sequencer.on_notification();
        assert!(sequencer.start(frames(2)).is_ok());
        assert_eq!(sequencer.state(), JobState::AwaitingFrame(0));
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let mut sequencer = FrameSequencer::new();
        assert_eq!(
            sequencer.start(FrameSequence::new(Vec::new())),
            Err(DriverError::EmptySequence)
        );
        assert_eq!(sequencer.state(), JobState::Idle);
    }
}
