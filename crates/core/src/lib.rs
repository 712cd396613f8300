//! Core library for the cue-driven sketch player and frame exporter.
//!
//! A sketch is a drawing routine plus the animation state it reads. Notes
//! from a score become cues that mutate that state when playback reaches
//! them. The same sketch can run against the wall clock or against a
//! deterministic frame clock that feeds the capture pipeline, which encodes
//! every frame and ships them in numbered zip parts.

pub mod config;
pub mod error;
pub mod mapping;
pub mod record;
pub mod render;
pub mod scene;
pub mod score;
pub mod timeline;

pub use config::{AppConfig, RenderConfig};
pub use error::{CueCaptureError, Result};
pub use mapping::{CueAction, CueHandler, CueSetDescriptor};
pub use record::{
    save_snapshot, ArchivePart, ArchiveSink, CaptureExporter, CaptureOutcome, CaptureReport,
    CaptureSession, CaptureSettings, CaptureStatus, Frame, FrameCapture, FrameEncoder, PngEncoder,
    RejectReason, ZipDirectorySink,
};
pub use render::{build_renderer, GradientSpec, Renderer};
pub use scene::{catalog, find_sketch, AnimationState, SketchContext, SketchDescriptor, SketchKind};
pub use score::{NoteEvent, Score, Track};
pub use timeline::{
    build_cues, dispatch_due, Cue, CueDispatcher, CueSchedule, PlaybackClock, DEFAULT_FPS,
};
