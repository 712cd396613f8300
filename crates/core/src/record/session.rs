use std::ops::{Deref, DerefMut};

use crate::{
    render::Renderer, timeline::PlaybackClock, CueCaptureError, Result, SketchContext,
};

use super::{ArchiveBatcher, ArchiveSink, CaptureSettings, Frame, FrameCapture, FrameEncoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    #[default]
    Idle,
    Arming,
    Capturing,
    Flushing,
}

/// Bookkeeping for one capture run.
#[derive(Debug, Default)]
pub struct CaptureSession {
    status: CaptureStatus,
    frame_counter: u64,
    part_number: u32,
    frames: Vec<Frame>,
    timestamp: i64,
}

impl CaptureSession {
    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, CaptureStatus::Capturing | CaptureStatus::Flushing)
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn part_number(&self) -> u32 {
        self.part_number
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn buffered(&self) -> usize {
        self.frames.len()
    }

    /// `Idle -> Arming`. Returns `false`, changing nothing, when a session is
    /// already under way.
    pub fn arm(&mut self, timestamp: i64) -> bool {
        if self.status != CaptureStatus::Idle {
            return false;
        }
        self.status = CaptureStatus::Arming;
        self.frame_counter = 0;
        self.part_number = 1;
        self.frames.clear();
        self.timestamp = timestamp;
        true
    }

    fn begin_capturing(&mut self) {
        self.status = CaptureStatus::Capturing;
    }

    fn next_frame_index(&mut self) -> u64 {
        let index = self.frame_counter;
        self.frame_counter += 1;
        index
    }

    fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn begin_flush(&mut self) -> Vec<Frame> {
        self.status = CaptureStatus::Flushing;
        std::mem::take(&mut self.frames)
    }

    fn finish_flush(&mut self) {
        self.part_number += 1;
        self.status = CaptureStatus::Capturing;
    }

    /// Back to `Idle`, discarding anything still buffered. Counters stay
    /// readable until the next `arm`.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.status = CaptureStatus::Idle;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another session is capturing or flushing.
    Busy,
    /// Capture is switched off in the settings.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub total_frames: u64,
    pub captured_frames: u64,
    pub dropped_frames: Vec<u64>,
    pub parts: u32,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed(CaptureReport),
    Rejected(RejectReason),
}

/// Drives an offline capture: clock, cues, render, capture and batching.
#[derive(Debug)]
pub struct CaptureExporter<E, S> {
    settings: CaptureSettings,
    capture: FrameCapture<E>,
    batcher: ArchiveBatcher,
    sink: S,
    session: CaptureSession,
    last_timestamp: i64,
}

impl<E: FrameEncoder, S: ArchiveSink> CaptureExporter<E, S> {
    pub fn new(settings: CaptureSettings, encoder: E, sink: S) -> Result<Self> {
        settings.validate()?;

        let background = settings
            .composite_background
            .then(|| settings.background.clone().unwrap_or_default());
        let capture = FrameCapture::new(settings.prefix.clone(), background, encoder);
        let batcher = ArchiveBatcher::new(
            settings.prefix.clone(),
            settings.fps,
            capture.extension(),
            settings.flush_threshold,
        );

        Ok(Self {
            settings,
            capture,
            batcher,
            sink,
            session: CaptureSession::default(),
            last_timestamp: i64::MIN,
        })
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Restarts `sketch` and captures `floor(duration_seconds * fps)` frames
    /// of it, so repeated captures produce the same frames.
    ///
    /// Starting while another session is active, or while capture is
    /// disabled, does nothing and reports [`CaptureOutcome::Rejected`]. Any
    /// failure other than a single frame failing to encode discards the
    /// session and is returned as [`CueCaptureError::CaptureAborted`].
    pub async fn start_capture<R: Renderer>(
        &mut self,
        sketch: &mut SketchContext<R>,
        duration_seconds: f64,
    ) -> Result<CaptureOutcome> {
        if !self.settings.enabled {
            tracing::debug!("capture disabled, ignoring start request");
            return Ok(CaptureOutcome::Rejected(RejectReason::Disabled));
        }
        if self.session.status() != CaptureStatus::Idle {
            tracing::debug!(status = ?self.session.status(), "capture already running, ignoring start request");
            return Ok(CaptureOutcome::Rejected(RejectReason::Busy));
        }
        if !duration_seconds.is_finite() || duration_seconds < 0.0 {
            return Err(CueCaptureError::InvalidInput(
                "capture duration must be a finite, non-negative number of seconds",
            ));
        }

        let timestamp = self.next_timestamp();
        let mut clock = PlaybackClock::offline(duration_seconds, self.settings.fps);
        let total_frames = clock.total_frames().unwrap_or(0);
        sketch.restart();

        let Self {
            settings,
            capture,
            batcher,
            sink,
            session,
            ..
        } = self;
        session.arm(timestamp);
        session.begin_capturing();
        tracing::info!(total_frames, timestamp, prefix = %settings.prefix, "capture started");

        let mut run = CaptureRun {
            capture,
            batcher: &*batcher,
            sink,
            session: ActiveSession(session),
        };
        let result = run.run(sketch, &mut clock, total_frames).await;
        let parts = run.session.part_number() - 1;
        run.session.reset();

        match result {
            Ok(dropped_frames) => {
                let report = CaptureReport {
                    total_frames,
                    captured_frames: total_frames - dropped_frames.len() as u64,
                    dropped_frames,
                    parts,
                    timestamp,
                };
                tracing::info!(
                    frames = report.captured_frames,
                    dropped = report.dropped_frames.len(),
                    parts = report.parts,
                    "capture complete"
                );
                Ok(CaptureOutcome::Completed(report))
            }
            Err(err) => {
                let frame = clock.frame_index().unwrap_or(0);
                tracing::error!(frame, error = %err, "capture failed");
                Err(CueCaptureError::aborted(frame, err))
            }
        }
    }

    /// Wall-clock milliseconds, bumped when two sessions would share one.
    fn next_timestamp(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let timestamp = if now <= self.last_timestamp {
            self.last_timestamp + 1
        } else {
            now
        };
        self.last_timestamp = timestamp;
        timestamp
    }
}

/// Session borrow that puts the session back to `Idle` if a run is
/// abandoned, including when the capture future is dropped mid-flight.
#[derive(Debug)]
struct ActiveSession<'a>(&'a mut CaptureSession);

impl Deref for ActiveSession<'_> {
    type Target = CaptureSession;

    fn deref(&self) -> &CaptureSession {
        self.0
    }
}

impl DerefMut for ActiveSession<'_> {
    fn deref_mut(&mut self) -> &mut CaptureSession {
        self.0
    }
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        if self.0.status() != CaptureStatus::Idle {
            tracing::warn!(
                frame = self.0.frame_counter(),
                buffered = self.0.buffered(),
                "capture abandoned, discarding session"
            );
            self.0.reset();
        }
    }
}

/// One capture run over the exporter's parts.
struct CaptureRun<'a, E, S> {
    capture: &'a mut FrameCapture<E>,
    batcher: &'a ArchiveBatcher,
    sink: &'a mut S,
    session: ActiveSession<'a>,
}

impl<E: FrameEncoder, S: ArchiveSink> CaptureRun<'_, E, S> {
    async fn run<R: Renderer>(
        &mut self,
        sketch: &mut SketchContext<R>,
        clock: &mut PlaybackClock,
        total_frames: u64,
    ) -> Result<Vec<u64>> {
        let mut dropped = Vec::new();

        while !clock.is_exhausted() {
            let now = clock.advance();
            sketch.step(now)?;

            let index = self.session.next_frame_index();
            tracing::debug!(frame = index + 1, total_frames, "capturing frame");

            match self.capture.capture_frame(sketch.renderer.surface(), index).await {
                Ok(frame) => self.session.push(frame),
                Err(err) if err.is_encoding() => {
                    tracing::warn!(frame = index, error = %err, "dropping frame");
                    dropped.push(index);
                }
                Err(err) => return Err(err),
            }

            if self.batcher.should_flush(self.session.buffered()) {
                self.flush().await?;
            }
        }

        if self.session.buffered() > 0 {
            self.flush().await?;
        }
        Ok(dropped)
    }

    async fn flush(&mut self) -> Result<()> {
        let frames = self.session.begin_flush();
        let part = self
            .batcher
            .build_part(frames, self.session.part_number(), self.session.timestamp());
        tracing::info!(part = part.part_number, frames = part.frames.len(), "creating archive part");

        self.sink.persist(part).await?;
        self.session.finish_flush();
        Ok(())
    }
}
