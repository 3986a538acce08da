//! Job coordination.
//!
//! A job moves through a fixed sequence of states:
//!
//! ```text
//! Received -> Validated -> Probed -> TimelineBuilt -> Encoding -> Streaming -> Done
//! ```
//!
//! Any non-terminal state may also move to `Failed`. Transitions are strictly
//! forward; [`JobTracker`] rejects anything else.
//!
//! [`JobCoordinator::run`] drives a submission up to `Encoding` and returns a
//! [`CompletedJob`] that owns the working directory. Delivery
//! ([`CompletedJob::into_stream`] or [`CompletedJob::persist_to`]) moves it
//! through `Streaming` to its terminal state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bf_av::workspace::JOB_PREFIX;
use bf_av::{Engine, OutputSpec, ScopedDir};
use bf_core::config::Config;
use bf_core::{
    output_file_name, AudiobookRequest, ChapterTimestamp, Error, JobId, JobSubmission, Result,
};
use chrono::Datelike;

use crate::delivery::{DeliveryHandle, DeliveryOutcome, ScopedStream};
use crate::orchestrator::MuxOrchestrator;
use crate::prober::DurationProber;
use crate::timeline::build_timeline;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Validated,
    Probed,
    TimelineBuilt,
    Encoding,
    Streaming,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    fn successor(self) -> Option<JobState> {
        match self {
            JobState::Received => Some(JobState::Validated),
            JobState::Validated => Some(JobState::Probed),
            JobState::Probed => Some(JobState::TimelineBuilt),
            JobState::TimelineBuilt => Some(JobState::Encoding),
            JobState::Encoding => Some(JobState::Streaming),
            JobState::Streaming => Some(JobState::Done),
            JobState::Done | JobState::Failed => None,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobState::Failed || self.successor() == Some(next)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Received => "received",
            JobState::Validated => "validated",
            JobState::Probed => "probed",
            JobState::TimelineBuilt => "timeline_built",
            JobState::Encoding => "encoding",
            JobState::Streaming => "streaming",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Current state of one job plus its id for log correlation.
#[derive(Debug, Clone)]
pub struct JobTracker {
    id: JobId,
    state: JobState,
}

impl JobTracker {
    /// Start tracking a job. The id is also recorded into the current span's
    /// `job` field when the caller's span declares one.
    pub fn new(id: JobId) -> Self {
        tracing::Span::current().record("job", id.short().as_str());
        tracing::info!(job = %id.short(), "Job received");
        Self {
            id,
            state: JobState::Received,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// [`Error::Internal`] if the transition is not strictly forward.
    pub fn advance(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "job {}: illegal transition {} -> {next}",
                self.id.short(),
                self.state
            )));
        }
        tracing::debug!(job = %self.id.short(), from = %self.state, to = %next, "Job transition");
        self.state = next;
        Ok(())
    }

    /// Record `err` and move to `Failed`, handing the error back.
    pub fn fail(&mut self, err: Error) -> Error {
        if self.state.is_terminal() {
            tracing::warn!(job = %self.id.short(), state = %self.state, "Late failure: {err}");
            return err;
        }
        tracing::error!(
            job = %self.id.short(),
            from = %self.state,
            kind = err.code(),
            "Job failed: {err}"
        );
        self.state = JobState::Failed;
        err
    }
}

/// An encoded audiobook waiting to be delivered.
///
/// Owns the job's working directory; the directory goes away once delivery
/// finishes, or when this value is dropped.
#[derive(Debug)]
pub struct CompletedJob {
    pub id: JobId,
    pub output_path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub timestamps: Vec<ChapterTimestamp>,
    scope: ScopedDir,
    tracker: JobTracker,
}

impl CompletedJob {
    pub fn state(&self) -> JobState {
        self.tracker.state()
    }

    /// Start streaming the output. The working directory moves into the
    /// stream.
    pub async fn into_stream(self) -> Result<(ScopedStream, JobDelivery)> {
        let CompletedJob {
            output_path,
            scope,
            mut tracker,
            ..
        } = self;

        tracker.advance(JobState::Streaming)?;
        match ScopedStream::open(&output_path, scope).await {
            Ok((stream, handle)) => Ok((stream, JobDelivery { tracker, handle })),
            Err(e) => Err(tracker.fail(e)),
        }
    }

    /// Copy the output to `dest` and release the working directory.
    ///
    /// Returns the number of bytes written.
    pub async fn persist_to(self, dest: &Path) -> Result<u64> {
        let CompletedJob {
            output_path,
            scope,
            mut tracker,
            ..
        } = self;

        tracker.advance(JobState::Streaming)?;
        let copied = tokio::fs::copy(&output_path, dest).await;
        scope.release();
        match copied {
            Ok(bytes) => {
                tracker.advance(JobState::Done)?;
                tracing::info!(
                    job = %tracker.id().short(),
                    bytes,
                    "Audiobook written to {}",
                    dest.display()
                );
                Ok(bytes)
            }
            Err(e) => Err(tracker.fail(Error::Delivery(format!(
                "failed to write {}: {e}",
                dest.display()
            )))),
        }
    }
}

/// Completion side of a streamed delivery.
#[derive(Debug)]
pub struct JobDelivery {
    tracker: JobTracker,
    handle: DeliveryHandle,
}

impl JobDelivery {
    /// Wait for the stream's terminal event and record the job's final state.
    pub async fn finished(self) -> (JobState, DeliveryOutcome) {
        let JobDelivery {
            mut tracker,
            handle,
        } = self;
        let outcome = handle.await;

        match outcome.clone().into_result() {
            Ok(bytes) => {
                if tracker.advance(JobState::Done).is_ok() {
                    tracing::info!(job = %tracker.id().short(), bytes, "Audiobook delivered");
                }
            }
            Err(e) => {
                tracker.fail(e);
            }
        }
        (tracker.state(), outcome)
    }
}

/// Runs submissions through validation, probing, timeline construction, and
/// encoding.
#[derive(Debug, Clone)]
pub struct JobCoordinator {
    prober: DurationProber,
    orchestrator: MuxOrchestrator,
    temp_root: Option<PathBuf>,
    year: Option<i32>,
}

impl JobCoordinator {
    pub fn new(engine: Arc<dyn Engine>, config: &Config) -> Self {
        Self {
            prober: DurationProber::new(engine.clone(), config.encode.probe_concurrency),
            orchestrator: MuxOrchestrator::new(engine, OutputSpec::from(&config.encode)),
            temp_root: config.workspace.temp_root.clone(),
            year: None,
        }
    }

    /// Pin the year written into metadata documents.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Root directory under which job scopes are created.
    pub fn temp_root(&self) -> Option<&Path> {
        self.temp_root.as_deref()
    }

    /// Run one submission up to an encoded output.
    ///
    /// `staging` is the scope holding the uploaded files. It is released as
    /// soon as the engine is done with the inputs, or on any earlier failure.
    pub async fn run(
        &self,
        submission: JobSubmission,
        staging: Option<ScopedDir>,
    ) -> Result<CompletedJob> {
        let mut tracker = JobTracker::new(JobId::new());
        let mut staging = staging;

        let result = self.drive(&mut tracker, submission, &mut staging).await;
        if let Some(scope) = staging.take() {
            scope.release();
        }
        result.map_err(|e| tracker.fail(e))
    }

    async fn drive(
        &self,
        tracker: &mut JobTracker,
        submission: JobSubmission,
        staging: &mut Option<ScopedDir>,
    ) -> Result<CompletedJob> {
        let request = AudiobookRequest::from_submission(submission)?;
        tracker.advance(JobState::Validated)?;
        tracing::info!(
            job = %tracker.id().short(),
            title = %request.book_title,
            chapters = request.chapters.len(),
            cover = request.cover_art_path.is_some(),
            "Job validated"
        );

        let scope = ScopedDir::acquire(self.temp_root.as_deref(), JOB_PREFIX)?;

        let durations = self.prober.probe_all(&request.chapters).await?;
        tracker.advance(JobState::Probed)?;

        let year = self.year.unwrap_or_else(|| chrono::Local::now().year());
        let timeline = build_timeline(&request, &durations, year)?;
        tracker.advance(JobState::TimelineBuilt)?;
        tracing::debug!(
            job = %tracker.id().short(),
            total_ms = timeline.total_ms(),
            "Chapter timeline built"
        );

        tracker.advance(JobState::Encoding)?;
        let muxed = self
            .orchestrator
            .mux(&request, &timeline.document, scope.path())
            .await;

        if let Some(staged) = staging.take() {
            staged.release();
        }

        let output_path = match muxed {
            Ok(path) => path,
            Err(e) => {
                scope.release();
                return Err(e);
            }
        };

        let size_bytes = tokio::fs::metadata(&output_path).await?.len();
        tracing::info!(
            job = %tracker.id().short(),
            size_bytes,
            "Audiobook encoded"
        );

        Ok(CompletedJob {
            id: tracker.id(),
            output_path,
            file_name: output_file_name(&request.book_title),
            size_bytes,
            timestamps: timeline.timestamps,
            scope,
            tracker: tracker.clone(),
        })
    }
}
