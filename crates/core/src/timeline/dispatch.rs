use super::{Cue, CueSchedule};
use crate::AnimationState;

/// Fires every cue from `cursor` onwards whose trigger time is at or before
/// `now`, in order, and returns the cursor past the last fired cue.
pub fn dispatch_due(cues: &[Cue], now: f64, cursor: usize, mut fire: impl FnMut(&Cue)) -> usize {
    let mut cursor = cursor;
    while let Some(cue) = cues.get(cursor) {
        if cue.trigger_time > now {
            break;
        }
        fire(cue);
        cursor += 1;
    }
    cursor
}

/// Walks a [`CueSchedule`] forward as the clock advances.
#[derive(Debug, Clone, Default)]
pub struct CueDispatcher {
    schedule: CueSchedule,
    cursor: usize,
}

impl CueDispatcher {
    pub fn new(schedule: CueSchedule) -> Self {
        Self {
            schedule,
            cursor: 0,
        }
    }

    /// Applies every due cue to `state` and returns how many fired.
    pub fn dispatch(&mut self, now: f64, state: &mut AnimationState) -> usize {
        let before = self.cursor;
        self.cursor = dispatch_due(self.schedule.cues(), now, self.cursor, |cue| {
            cue.fire(state);
            state.cues_fired += 1;
        });

        let fired = self.cursor - before;
        if fired > 0 {
            tracing::debug!(now, fired, cursor = self.cursor, "dispatched cues");
        }
        fired
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.schedule.len() - self.cursor
    }

    pub fn schedule(&self) -> &CueSchedule {
        &self.schedule
    }
}
