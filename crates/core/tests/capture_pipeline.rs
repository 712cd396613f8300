use std::{cell::Cell, fs::File, path::Path};

use async_trait::async_trait;
use cue_capture_core::{
    build_cues, build_renderer, record::HINT_FILENAME, AnimationState, CaptureExporter,
    CaptureOutcome, CaptureReport, CaptureSettings, CueAction, CueCaptureError, CueDispatcher,
    CueSchedule, FrameEncoder, NoteEvent, PngEncoder, Renderer, Result, SketchContext, SketchKind,
    ZipDirectorySink,
};
use image::RgbaImage;

/// PNG encoder that refuses the frames listed in `fail_on`.
#[derive(Debug, Default)]
struct FlakyPng {
    calls: Cell<u64>,
    fail_on: Vec<u64>,
}

#[async_trait(?Send)]
impl FrameEncoder for FlakyPng {
    fn extension(&self) -> &str {
        "png"
    }

    async fn encode(&self, image: RgbaImage) -> Result<Vec<u8>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.fail_on.contains(&call) {
            return Err(CueCaptureError::Encoding(format!("frame {call} rejected")));
        }
        PngEncoder.encode(image).await
    }
}

fn sketch(ticks: &[u64]) -> SketchContext<Box<dyn Renderer>> {
    let notes: Vec<NoteEvent> = ticks
        .iter()
        .map(|&tick| NoteEvent::new(40, tick as f64 / 10.0, 10, tick))
        .collect();
    let schedule = CueSchedule::from_sets([build_cues(&notes, CueAction::Pulse, false)]);
    SketchContext::new(
        AnimationState::new(8, 8, 7),
        build_renderer(SketchKind::Strings, 8, 8).unwrap(),
        CueDispatcher::new(schedule),
    )
}

fn settings() -> CaptureSettings {
    CaptureSettings {
        prefix: "StringsNo2".to_string(),
        flush_threshold: 1500,
        fps: 60,
        ..CaptureSettings::default()
    }
}

fn completed(outcome: CaptureOutcome) -> CaptureReport {
    match outcome {
        CaptureOutcome::Completed(report) => report,
        other => panic!("expected completed capture, got {other:?}"),
    }
}

fn entries(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

fn frame_indices(names: &[String]) -> Vec<u64> {
    names
        .iter()
        .filter_map(|name| name.strip_prefix("StringsNo2_")?.strip_suffix(".png"))
        .map(|index| index.parse().unwrap())
        .collect()
}

#[tokio::test]
async fn long_capture_splits_into_two_parts() {
    let dir = tempfile::tempdir().unwrap();
    let mut exporter = CaptureExporter::new(
        settings(),
        FlakyPng::default(),
        ZipDirectorySink::new(dir.path()),
    )
    .unwrap();
    let mut sketch = sketch(&[0, 0, 5, 5, 5, 10, 15, 15, 20, 25]);

    let report = completed(exporter.start_capture(&mut sketch, 26.0).await.unwrap());
    assert_eq!(report.total_frames, 1560);
    assert_eq!(report.parts, 2);
    assert!(report.dropped_frames.is_empty());

    let written = exporter.sink().written();
    assert_eq!(written.len(), 2);
    let stamp = report.timestamp.to_string();
    assert!(written[0].ends_with(format!("StringsNo2_frames_part1_{stamp}.zip")));
    assert!(written[1].ends_with(format!("StringsNo2_frames_part2_{stamp}.zip")));

    let first = entries(&written[0]);
    let second = entries(&written[1]);
    assert_eq!(first.len(), 1501);
    assert!(first.iter().any(|name| name == HINT_FILENAME));
    assert_eq!(second.len(), 60);
    assert!(!second.iter().any(|name| name == HINT_FILENAME));

    let mut indices = frame_indices(&first);
    indices.extend(frame_indices(&second));
    assert_eq!(indices, (0..1560).collect::<Vec<u64>>());

    // six distinct ticks, all inside the first three seconds
    assert_eq!(sketch.state.cues_fired, 6);
    assert!(!dir
        .path()
        .read_dir()
        .unwrap()
        .any(|entry| entry.unwrap().path().extension().is_some_and(|ext| ext == "partial")));
}

#[tokio::test]
async fn unencodable_frame_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = FlakyPng {
        fail_on: vec![42],
        ..FlakyPng::default()
    };
    let settings = CaptureSettings {
        flush_threshold: 50,
        ..settings()
    };
    let mut exporter =
        CaptureExporter::new(settings, encoder, ZipDirectorySink::new(dir.path())).unwrap();
    let mut sketch = sketch(&[]);

    let report = completed(exporter.start_capture(&mut sketch, 2.0).await.unwrap());
    assert_eq!(report.total_frames, 120);
    assert_eq!(report.dropped_frames, vec![42]);
    assert_eq!(report.captured_frames, 119);
    assert_eq!(report.parts, 3);

    let indices: Vec<u64> = exporter
        .sink()
        .written()
        .iter()
        .flat_map(|path| frame_indices(&entries(path)))
        .collect();
    assert_eq!(indices.len(), 119);
    assert!(!indices.contains(&42));
    assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn back_to_back_sessions_use_distinct_archive_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut exporter =
        CaptureExporter::new(settings(), PngEncoder, ZipDirectorySink::new(dir.path())).unwrap();

    let first = completed(exporter.start_capture(&mut sketch(&[]), 0.5).await.unwrap());
    let second = completed(exporter.start_capture(&mut sketch(&[]), 0.5).await.unwrap());

    assert!(second.timestamp > first.timestamp);
    assert_eq!(exporter.sink().written().len(), 2);
    assert_ne!(exporter.sink().written()[0], exporter.sink().written()[1]);
}
