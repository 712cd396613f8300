use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, Subcommand};
use cue_capture_core::{
    catalog, save_snapshot, AppConfig, CaptureExporter, CaptureOutcome, PlaybackClock, PngEncoder,
    Score, SketchContext, ZipDirectorySink,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> cue_capture_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            list_sketches();
            Ok(())
        }
        Commands::Play { source } => run_play(&source).await,
        Commands::Capture { source, output } => run_capture(&source, output).await,
        Commands::Snapshot { source, at, output } => run_snapshot(&source, at, &output).await,
    }
}

fn list_sketches() {
    for sketch in catalog() {
        println!("{:<10} {:<12} {}", sketch.id, sketch.title, sketch.description);
    }
}

async fn run_play(source: &SketchSource) -> cue_capture_core::Result<()> {
    let (config, score) = source.load()?;
    let duration = score.resolve_duration(source.duration)?;
    let mut sketch = SketchContext::from_config(&config, &score)?;
    tracing::info!(sketch = %config.sketch, duration, "starting live playback");

    let mut clock = PlaybackClock::live();
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / config.capture.fps as f64));
    let mut frames = 0u64;

    loop {
        ticker.tick().await;
        let now = clock.advance();
        if now >= duration {
            break;
        }
        let fired = sketch.step(now)?;
        if fired > 0 {
            tracing::debug!(now, fired, "cues fired");
        }
        frames += 1;
    }

    tracing::info!(frames, cues = sketch.state.cues_fired, "playback finished");
    Ok(())
}

async fn run_capture(source: &SketchSource, output: Option<PathBuf>) -> cue_capture_core::Result<()> {
    let (config, score) = source.load()?;
    let duration = score.resolve_duration(source.duration)?;
    let mut sketch = SketchContext::from_config(&config, &score)?;

    let dir = output.unwrap_or_else(|| config.capture.output_dir.clone());
    let mut exporter = CaptureExporter::new(config.capture, PngEncoder, ZipDirectorySink::new(dir))?;

    match exporter.start_capture(&mut sketch, duration).await? {
        CaptureOutcome::Completed(report) => {
            for path in exporter.sink().written() {
                println!("{}", path.display());
            }
            if !report.dropped_frames.is_empty() {
                tracing::warn!(frames = ?report.dropped_frames, "some frames failed to encode");
            }
        }
        CaptureOutcome::Rejected(reason) => {
            tracing::warn!(?reason, "capture did not start");
        }
    }
    Ok(())
}

async fn run_snapshot(source: &SketchSource, at: f64, output: &Path) -> cue_capture_core::Result<()> {
    let (config, score) = source.load()?;
    let mut sketch = SketchContext::from_config(&config, &score)?;
    let path = save_snapshot(&mut sketch, at, config.capture.fps, &PngEncoder, output).await?;
    println!("{}", path.display());
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Cue-driven generative sketches with frame-accurate capture", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the sketches that can be played.
    List,
    /// Run a sketch against the wall clock.
    Play {
        #[command(flatten)]
        source: SketchSource,
    },
    /// Render every frame offline and write them as zip parts.
    Capture {
        #[command(flatten)]
        source: SketchSource,
        /// Directory for the archive parts. Defaults to the configured one.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save a single frame as a PNG.
    Snapshot {
        #[command(flatten)]
        source: SketchSource,
        /// Playback time, in seconds, of the frame to save.
        #[arg(long, default_value_t = 0.0)]
        at: f64,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct SketchSource {
    /// JSON configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Score JSON whose tracks drive the cues.
    #[arg(short, long)]
    score: Option<PathBuf>,
    /// Length of the accompanying audio in seconds. Overrides the score.
    #[arg(short, long)]
    duration: Option<f64>,
}

impl SketchSource {
    fn load(&self) -> cue_capture_core::Result<(AppConfig, Score)> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        let score = match &self.score {
            Some(path) => Score::load(path)?,
            None => {
                if !config.cue_sets.is_empty() {
                    tracing::warn!("no score given, running without cues");
                    config.cue_sets.clear();
                }
                Score::default()
            }
        };

        Ok((config, score))
    }
}
