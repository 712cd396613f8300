//! Cue construction, the playback/capture clock and the dispatcher that ties
//! the two together.

mod clock;
mod dispatch;

pub use clock::{ClockMode, PlaybackClock, DEFAULT_FPS};
pub use dispatch::{dispatch_due, CueDispatcher};

use crate::{
    mapping::{CueAction, CueHandler, CueSetDescriptor},
    NoteEvent, Result, Score,
};

/// A note bound to the handler it should trigger.
#[derive(Debug, Clone, Copy)]
pub struct Cue {
    pub trigger_time: f64,
    pub payload: NoteEvent,
    /// 1-based position within the cue set this cue was built from.
    pub sequence_number: u32,
    pub action: CueAction,
    pub handler: CueHandler,
}

impl Cue {
    pub fn new(payload: NoteEvent, action: CueAction, sequence_number: u32) -> Self {
        Self {
            trigger_time: payload.start_time,
            payload,
            sequence_number,
            action,
            handler: action.handler(),
        }
    }

    pub fn fire(&self, state: &mut crate::AnimationState) {
        (self.handler)(state, self);
    }
}

/// Turns a time-ordered note list into cues. Notes sharing a tick collapse
/// into the first of them unless `polyphonic` is set.
pub fn build_cues(notes: &[NoteEvent], action: CueAction, polyphonic: bool) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut last_tick = None;
    let mut cue_index = 1;

    for note in notes {
        if last_tick != Some(note.tick) || polyphonic {
            cues.push(Cue::new(*note, action, cue_index));
            cue_index += 1;
            last_tick = Some(note.tick);
        }
    }

    cues
}

/// All cue sets of a session merged into one trigger-time ordered list.
#[derive(Debug, Clone, Default)]
pub struct CueSchedule {
    cues: Vec<Cue>,
}

impl CueSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `set` into the schedule. Ties keep insertion order, so earlier
    /// sets fire before later ones at the same instant.
    pub fn add_set(&mut self, set: Vec<Cue>) {
        self.cues.extend(set);
        self.cues
            .sort_by(|a, b| a.trigger_time.total_cmp(&b.trigger_time));
    }

    pub fn from_sets(sets: impl IntoIterator<Item = Vec<Cue>>) -> Self {
        let mut schedule = Self::new();
        for set in sets {
            schedule.add_set(set);
        }
        schedule
    }

    /// Builds one cue set per descriptor from the matching score track.
    pub fn from_score(score: &Score, sets: &[CueSetDescriptor]) -> Result<Self> {
        let mut schedule = Self::new();
        for set in sets {
            let notes = score.track(set.track)?;
            let cues = build_cues(notes, set.action, set.polyphonic);
            tracing::debug!(track = set.track, action = ?set.action, notes = notes.len(), cues = cues.len(), "scheduled cue set");
            schedule.add_set(cues);
        }
        Ok(schedule)
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}
