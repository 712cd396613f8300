use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    render::color::hsb_to_rgba,
    scene::{AnimationState, BlendMode},
    timeline::Cue,
};

/// Ticks in one 4/4 bar at the score's 15360 PPQ.
const BAR_TICKS: u64 = 122_880;
const LONG_NOTE_TICKS: u64 = 30_000;
const PALETTE_PITCH_CEILING: u8 = 62;
const PULSE_PITCH_CEILING: u8 = 50;
const PULSE_SCALE_STEP: f32 = 0.2;
const MIN_SCALE_MULTIPLIER: f32 = 0.2;
const SCREEN_BLEND_AFTER_CUE: u32 = 20;

/// Function invoked when a cue fires.
pub type CueHandler = fn(&mut AnimationState, &Cue);

/// Identifies which handler a cue set is bound to. Resolved to a function
/// once, when cues are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueAction {
    /// Re-rolls the stroke palette on long, low notes.
    Palette,
    /// Fades the canvas and tightens the drawing on bass hits.
    Pulse,
}

impl CueAction {
    pub fn handler(self) -> CueHandler {
        match self {
            CueAction::Palette => palette,
            CueAction::Pulse => pulse,
        }
    }
}

/// Describes how the notes of one score track should be routed to a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueSetDescriptor {
    pub track: usize,
    pub action: CueAction,
    #[serde(default)]
    pub polyphonic: bool,
}

impl CueSetDescriptor {
    /// Routing used by the strings sketch.
    pub fn strings_defaults() -> Vec<Self> {
        vec![
            Self {
                track: 7,
                action: CueAction::Palette,
                polyphonic: false,
            },
            Self {
                track: 2,
                action: CueAction::Pulse,
                polyphonic: false,
            },
        ]
    }
}

fn palette(state: &mut AnimationState, cue: &Cue) {
    let note = &cue.payload;
    if note.pitch >= PALETTE_PITCH_CEILING || note.duration_ticks <= LONG_NOTE_TICKS {
        return;
    }

    let hue_a = state.rng().gen_range(0.0..360.0);
    let hue_b = state.rng().gen_range(0.0..360.0);
    state.color_a = hsb_to_rgba(hue_a, 1.0, 1.0, 255);
    state.color_b = hsb_to_rgba(hue_b, 1.0, 1.0, 255);

    if note.tick % BAR_TICKS == 0 {
        let (width, height) = (state.width as f32, state.height as f32);
        let x = inset(state.rng(), width);
        let y = inset(state.rng(), height);
        state.origin = (x, y);
    }
}

fn pulse(state: &mut AnimationState, cue: &Cue) {
    if cue.payload.pitch >= PULSE_PITCH_CEILING {
        return;
    }

    state.fade_pending = true;
    state.scale_multiplier = (state.scale_multiplier - PULSE_SCALE_STEP).max(MIN_SCALE_MULTIPLIER);
    if cue.sequence_number > SCREEN_BLEND_AFTER_CUE {
        state.blend = BlendMode::Screen;
    }
}

/// Random coordinate at least an eighth of `extent` away from either edge.
fn inset<R: Rng>(rng: &mut R, extent: f32) -> f32 {
    let margin = extent / 8.0;
    if extent - margin <= margin {
        return extent / 2.0;
    }
    rng.gen_range(margin..extent - margin)
}
