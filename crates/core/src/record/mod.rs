use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    render::{GradientSpec, Renderer},
    timeline::DEFAULT_FPS,
    CueCaptureError, Result, SketchContext,
};

mod archive;
mod frame;
mod session;

pub use archive::{
    archive_name, encoding_hint, ArchiveBatcher, ArchivePart, ArchiveSink, AuxiliaryFile,
    ZipDirectorySink, HINT_FILENAME,
};
pub use frame::{encode_png, frame_filename, Frame, FrameCapture, FrameEncoder, PngEncoder};
pub use session::{
    CaptureExporter, CaptureOutcome, CaptureReport, CaptureSession, CaptureStatus, RejectReason,
};

pub const DEFAULT_FLUSH_THRESHOLD: usize = 1500;

/// Configuration options for the capture subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Stem for frame and archive file names.
    pub prefix: String,
    pub enabled: bool,
    pub composite_background: bool,
    /// Gradient drawn behind each frame when compositing. Falls back to the
    /// default gradient if compositing is on and this is unset.
    pub background: Option<GradientSpec>,
    pub flush_threshold: usize,
    pub fps: u32,
    pub output_dir: PathBuf,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            prefix: "capture".to_string(),
            enabled: true,
            composite_background: false,
            background: None,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            fps: DEFAULT_FPS,
            output_dir: PathBuf::from("captures"),
        }
    }
}

impl CaptureSettings {
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(CueCaptureError::InvalidInput("capture prefix must not be empty"));
        }
        if self.flush_threshold == 0 {
            return Err(CueCaptureError::InvalidInput("flush threshold must be at least one frame"));
        }
        if self.fps == 0 {
            return Err(CueCaptureError::InvalidInput("capture frame rate must be positive"));
        }
        if let Some(background) = &self.background {
            background.render(1, 1)?;
        }
        Ok(())
    }
}

/// Restarts `sketch`, renders it up to `at_seconds` and writes the last
/// frame to `dir` as `sketch_<UTC timestamp>.<ext>`.
pub async fn save_snapshot<R: Renderer, E: FrameEncoder>(
    sketch: &mut SketchContext<R>,
    at_seconds: f64,
    fps: u32,
    encoder: &E,
    dir: &Path,
) -> Result<PathBuf> {
    if !at_seconds.is_finite() || at_seconds < 0.0 || fps == 0 {
        return Err(CueCaptureError::InvalidInput(
            "snapshot time must be a finite, non-negative number of seconds",
        ));
    }

    let last_frame = (at_seconds * fps as f64).floor() as u64;
    sketch.restart();
    for frame in 0..=last_frame {
        sketch.step(frame as f64 / fps as f64)?;
    }

    let bytes = encoder.encode(sketch.renderer.surface().clone()).await?;
    let stamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S");
    let path = dir.join(format!("sketch_{stamp}.{}", encoder.extension()));

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, bytes).await?;
    tracing::info!(path = %path.display(), frame = last_frame, "saved snapshot");
    Ok(path)
}
