use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    render::{build_renderer, Renderer},
    timeline::{CueDispatcher, CueSchedule},
    AppConfig, CueCaptureError, Result, Score,
};

pub const DEFAULT_COLOR_A: [u8; 4] = [0x0c, 0xcb, 0xcf, 0xaa];
pub const DEFAULT_COLOR_B: [u8; 4] = [0xfe, 0x68, 0xb5, 0xaa];
const DEFAULT_SCALE_MULTIPLIER: f32 = 4.0;

/// Tag that selects a drawing routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SketchKind {
    Circle,
    Strings,
}

#[derive(Debug, Clone, Serialize)]
pub struct SketchDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub kind: SketchKind,
}

const CATALOG: &[SketchDescriptor] = &[
    SketchDescriptor {
        id: "number-1",
        title: "#StringsNo1",
        description: "An exploration into generative animations inspired by strings.",
        kind: SketchKind::Circle,
    },
    SketchDescriptor {
        id: "number-2",
        title: "#StringsNo2",
        description: "An exploration into generative animations inspired by strings.",
        kind: SketchKind::Strings,
    },
];

/// Every sketch the application knows how to render.
pub fn catalog() -> &'static [SketchDescriptor] {
    CATALOG
}

pub fn find_sketch(id: &str) -> Result<&'static SketchDescriptor> {
    CATALOG
        .iter()
        .find(|sketch| sketch.id == id)
        .ok_or_else(|| CueCaptureError::UnknownSketch(id.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Screen,
}

/// Every parameter a sketch reads while drawing. Cue handlers and the render
/// step are the only writers.
#[derive(Debug, Clone)]
pub struct AnimationState {
    pub width: u32,
    pub height: u32,
    pub color_a: [u8; 4],
    pub color_b: [u8; 4],
    pub origin: (f32, f32),
    pub z_offset: f32,
    pub noise_max: f32,
    pub scale_multiplier: f32,
    pub blend: BlendMode,
    /// Set by a cue, consumed by the next render.
    pub fade_pending: bool,
    pub cues_fired: u64,
    seed: u64,
    rng: StdRng,
}

impl AnimationState {
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            color_a: DEFAULT_COLOR_A,
            color_b: DEFAULT_COLOR_B,
            origin: (width as f32 / 2.0, height as f32 / 2.0),
            z_offset: 0.0,
            noise_max: 1.0,
            scale_multiplier: DEFAULT_SCALE_MULTIPLIER,
            blend: BlendMode::Normal,
            fade_pending: false,
            cues_fired: 0,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Random source shared by cue handlers. Seeded, so a replay produces the
    /// same sequence.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Restores the initial parameters, including the RNG stream.
    pub fn reset(&mut self) {
        *self = Self::new(self.width, self.height, self.seed);
    }
}

/// Explicit bundle of everything one running sketch owns. Playback and
/// capture borrow it mutably for the duration of a session.
#[derive(Debug)]
pub struct SketchContext<R> {
    pub state: AnimationState,
    pub renderer: R,
    pub cues: CueDispatcher,
}

impl SketchContext<Box<dyn Renderer>> {
    /// Wires up the configured sketch with cues built from `score`.
    pub fn from_config(config: &AppConfig, score: &Score) -> Result<Self> {
        let sketch = find_sketch(&config.sketch)?;
        let (width, height) = (config.render.width, config.render.height);
        let schedule = CueSchedule::from_score(score, &config.cue_sets)?;
        tracing::info!(sketch = sketch.id, cues = schedule.len(), width, height, "sketch ready");

        Ok(Self::new(
            AnimationState::new(width, height, config.render.seed),
            build_renderer(sketch.kind, width, height)?,
            CueDispatcher::new(schedule),
        ))
    }
}

impl<R: Renderer> SketchContext<R> {
    pub fn new(state: AnimationState, renderer: R, cues: CueDispatcher) -> Self {
        Self {
            state,
            renderer,
            cues,
        }
    }

    /// Fires every cue due at `now`, then renders one frame. Cue effects are
    /// therefore visible in the frame they trigger on.
    pub fn step(&mut self, now: f64) -> Result<usize> {
        let fired = self.cues.dispatch(now, &mut self.state);
        self.renderer.render(&mut self.state)?;
        Ok(fired)
    }

    /// Puts the cue cursor back to the start of the schedule.
    pub fn rewind(&mut self) {
        self.cues.rewind();
    }

    /// Rewinds cues and returns state and surface to their initial values.
    pub fn restart(&mut self) {
        self.rewind();
        self.state.reset();
        self.renderer.reset();
    }
}
