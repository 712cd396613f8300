use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CueCaptureError, Result};

/// A single note read from a decoded score. Field names follow the JSON
/// emitted by common MIDI-to-JSON tooling (`midi`, `time`, `ticks`,
/// `durationTicks`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    #[serde(rename = "midi")]
    pub pitch: u8,
    /// Start of the note in seconds.
    #[serde(rename = "time")]
    pub start_time: f64,
    #[serde(rename = "durationTicks", default)]
    pub duration_ticks: u64,
    #[serde(rename = "ticks")]
    pub tick: u64,
}

impl NoteEvent {
    pub fn new(pitch: u8, start_time: f64, duration_ticks: u64, tick: u64) -> Self {
        Self {
            pitch,
            start_time,
            duration_ticks,
            tick,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: Vec<NoteEvent>,
}

/// Decoded score: an ordered list of note tracks plus the length of the
/// accompanying audio when the exporter recorded it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Score {
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Score {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let score: Score = serde_json::from_str(json)?;
        Ok(score)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let score = Self::from_json_str(&contents)?;
        tracing::debug!(path = %path.display(), tracks = score.tracks.len(), "loaded score");
        Ok(score)
    }

    /// Notes of the track at `index`.
    pub fn track(&self, index: usize) -> Result<&[NoteEvent]> {
        self.tracks
            .get(index)
            .map(|track| track.notes.as_slice())
            .ok_or(CueCaptureError::MissingTrack(index))
    }

    /// Picks the duration to drive playback with. An explicit override wins
    /// over the value stored in the score.
    pub fn resolve_duration(&self, explicit: Option<f64>) -> Result<f64> {
        let duration = explicit.or(self.duration).ok_or(CueCaptureError::InvalidInput(
            "no audio duration given and the score does not record one",
        ))?;

        if !duration.is_finite() || duration < 0.0 {
            return Err(CueCaptureError::InvalidInput(
                "audio duration must be a finite, non-negative number of seconds",
            ));
        }

        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORE: &str = r#"{
        "header": { "ppq": 15360 },
        "duration": 12.5,
        "tracks": [
            { "name": "strings", "notes": [
                { "midi": 60, "time": 0.0, "ticks": 0, "durationTicks": 30720, "velocity": 0.8 },
                { "midi": 64, "time": 0.5, "ticks": 7680, "durationTicks": 100 }
            ] },
            { "name": "empty" }
        ]
    }"#;

    #[test]
    fn parses_midi_json_layout() {
        let score = Score::from_json_str(SCORE).unwrap();
        assert_eq!(score.tracks.len(), 2);

        let notes = score.track(0).unwrap();
        assert_eq!(notes[1], NoteEvent::new(64, 0.5, 100, 7680));
        assert!(score.track(1).unwrap().is_empty());
    }

    #[test]
    fn missing_track_is_reported() {
        let score = Score::from_json_str(SCORE).unwrap();
        let err = score.track(5).unwrap_err();
        assert!(matches!(err, CueCaptureError::MissingTrack(5)));
    }

    #[test]
    fn explicit_duration_overrides_score() {
        let score = Score::from_json_str(SCORE).unwrap();
        assert_eq!(score.resolve_duration(None).unwrap(), 12.5);
        assert_eq!(score.resolve_duration(Some(3.0)).unwrap(), 3.0);
        assert!(Score::default().resolve_duration(None).is_err());
        assert!(score.resolve_duration(Some(f64::NAN)).is_err());
    }
}
