use std::time::Instant;

/// Virtual frame rate used by offline capture.
pub const DEFAULT_FPS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockMode {
    /// Follows wall-clock time from the first tick. Best effort only.
    Live,
    /// Fixed `1 / fps` steps over a known number of frames.
    Offline { fps: u32, total_frames: u64 },
}

/// Single source of "now" for cue dispatch.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    mode: ClockMode,
    time_seconds: f64,
    ticks: u64,
    started: Option<Instant>,
}

impl PlaybackClock {
    pub fn live() -> Self {
        Self {
            mode: ClockMode::Live,
            time_seconds: 0.0,
            ticks: 0,
            started: None,
        }
    }

    /// Offline clock covering `floor(duration_seconds * fps)` frames.
    pub fn offline(duration_seconds: f64, fps: u32) -> Self {
        let fps = fps.max(1);
        let total_frames = (duration_seconds * fps as f64).floor().max(0.0) as u64;
        Self {
            mode: ClockMode::Offline { fps, total_frames },
            time_seconds: 0.0,
            ticks: 0,
            started: None,
        }
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    pub fn time_seconds(&self) -> f64 {
        self.time_seconds
    }

    /// Number of frames an offline clock will produce. Live clocks are
    /// unbounded and report `None`.
    pub fn total_frames(&self) -> Option<u64> {
        match self.mode {
            ClockMode::Live => None,
            ClockMode::Offline { total_frames, .. } => Some(total_frames),
        }
    }

    /// Index of the frame produced by the latest `advance`.
    pub fn frame_index(&self) -> Option<u64> {
        self.ticks.checked_sub(1)
    }

    pub fn is_exhausted(&self) -> bool {
        match self.mode {
            ClockMode::Live => false,
            ClockMode::Offline { total_frames, .. } => self.ticks >= total_frames,
        }
    }

    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
        self.ticks = 0;
        self.started = None;
    }

    /// Moves to the next tick and returns the new time. In offline mode the
    /// first call lands on frame 0 at time zero; calls past the last frame
    /// keep returning the final frame's time.
    pub fn advance(&mut self) -> f64 {
        match self.mode {
            ClockMode::Live => {
                let started = *self.started.get_or_insert_with(Instant::now);
                self.time_seconds = self.time_seconds.max(started.elapsed().as_secs_f64());
                self.ticks += 1;
            }
            ClockMode::Offline { fps, total_frames } => {
                if self.ticks < total_frames {
                    self.time_seconds = self.ticks as f64 / fps as f64;
                    self.ticks += 1;
                }
            }
        }
        self.time_seconds
    }
}
