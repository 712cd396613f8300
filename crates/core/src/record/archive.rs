use std::{
    fs::File,
    io::{Seek, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use super::Frame;
use crate::Result;

pub const HINT_FILENAME: &str = "ffmpeg_command.txt";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Extra text file shipped alongside the frames of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryFile {
    pub name: String,
    pub contents: String,
}

/// A bounded, index-ordered bundle of frames ready to be persisted.
#[derive(Debug)]
pub struct ArchivePart {
    pub part_number: u32,
    pub name: String,
    pub frames: Vec<Frame>,
    pub auxiliary: Vec<AuxiliaryFile>,
}

impl ArchivePart {
    pub fn frame_indices(&self) -> Vec<u64> {
        self.frames.iter().map(|frame| frame.index).collect()
    }

    /// Streams the part as a zip archive into `writer` and hands the writer
    /// back. Frames are stored as-is since they are already compressed; text
    /// entries are deflated.
    pub fn write_zip<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (i, frame) in self.frames.iter().enumerate() {
            zip.start_file(frame.filename.as_str(), stored)?;
            zip.write_all(&frame.bitmap)?;
            if (i + 1) % 100 == 0 {
                tracing::debug!(part = self.part_number, added = i + 1, total = self.frames.len(), "packing frames");
            }
        }

        for file in &self.auxiliary {
            zip.start_file(file.name.as_str(), deflated)?;
            zip.write_all(file.contents.as_bytes())?;
        }

        Ok(zip.finish()?)
    }
}

pub fn archive_name(prefix: &str, part_number: u32, timestamp: i64) -> String {
    format!("{prefix}_frames_part{part_number}_{timestamp}.{ARCHIVE_EXTENSION}")
}

/// Suggested commands for turning the frame sequence into a video.
pub fn encoding_hint(prefix: &str, fps: u32, extension: &str) -> String {
    [
        "# ProRes 422 HQ (10-bit, Resolve-friendly)".to_string(),
        format!(
            "ffmpeg -framerate {fps} -i {prefix}_%05d.{extension} -c:v prores_ks -profile:v 3 -pix_fmt yuv422p10le {prefix}_prores422hq.mov"
        ),
        String::new(),
        "# ProRes 4444 (10-bit + alpha, very large)".to_string(),
        format!(
            "ffmpeg -framerate {fps} -i {prefix}_%05d.{extension} -c:v prores_ks -profile:v 4 -pix_fmt yuva444p10le {prefix}_prores4444.mov"
        ),
    ]
    .join("\n")
}

/// Decides when to flush and turns buffered frames into parts.
#[derive(Debug, Clone)]
pub struct ArchiveBatcher {
    prefix: String,
    fps: u32,
    extension: String,
    threshold: usize,
}

impl ArchiveBatcher {
    pub fn new(prefix: impl Into<String>, fps: u32, extension: impl Into<String>, threshold: usize) -> Self {
        Self {
            prefix: prefix.into(),
            fps,
            extension: extension.into(),
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn should_flush(&self, buffered: usize) -> bool {
        buffered >= self.threshold
    }

    /// Sorts `frames` by index and wraps them into a part. Only the first part
    /// of a session carries the encoding hint.
    pub fn build_part(&self, mut frames: Vec<Frame>, part_number: u32, timestamp: i64) -> ArchivePart {
        frames.sort_by_key(|frame| frame.index);

        let auxiliary = if part_number == 1 {
            vec![AuxiliaryFile {
                name: HINT_FILENAME.to_string(),
                contents: encoding_hint(&self.prefix, self.fps, &self.extension),
            }]
        } else {
            Vec::new()
        };

        ArchivePart {
            part_number,
            name: archive_name(&self.prefix, part_number, timestamp),
            frames,
            auxiliary,
        }
    }
}

/// Receives finished parts. Ownership of the part, and with it the frame
/// bytes, moves into the sink.
#[async_trait(?Send)]
pub trait ArchiveSink {
    async fn persist(&mut self, part: ArchivePart) -> Result<()>;
}

/// Writes each part as a zip file into a directory.
#[derive(Debug, Clone)]
pub struct ZipDirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl ZipDirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archives written so far, in part order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

#[async_trait(?Send)]
impl ArchiveSink for ZipDirectorySink {
    async fn persist(&mut self, part: ArchivePart) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.dir.join(&part.name);
        let partial = self.dir.join(format!("{}.partial", part.name));
        let (part_number, frames) = (part.part_number, part.frames.len());

        tracing::info!(part = part_number, frames, "generating archive part");
        let destination = target.clone();
        let bytes = tokio::task::spawn_blocking(move || -> Result<u64> {
            let file = part.write_zip(File::create(&partial)?)?;
            let bytes = file.metadata()?.len();
            drop(file);
            std::fs::rename(&partial, &destination)?;
            Ok(bytes)
        })
        .await??;

        tracing::info!(part = part_number, path = %target.display(), bytes, "wrote archive part");
        self.written.push(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn frame(index: u64) -> Frame {
        Frame {
            index,
            bitmap: vec![index as u8; 4],
            filename: crate::record::frame_filename("cap", index, "png"),
        }
    }

    #[test]
    fn names_parts_with_session_timestamp() {
        assert_eq!(
            archive_name("StringsNo2", 3, 1_700_000_000_000),
            "StringsNo2_frames_part3_1700000000000.zip"
        );
    }

    #[test]
    fn hint_references_frame_pattern() {
        let hint = encoding_hint("StringsNo2", 60, "png");
        assert!(hint.contains("-framerate 60 -i StringsNo2_%05d.png"));
        assert!(hint.contains("prores422hq.mov"));
        assert!(hint.contains("prores4444.mov"));
    }

    #[test]
    fn build_part_sorts_out_of_order_frames() {
        let batcher = ArchiveBatcher::new("cap", 60, "png", 4);
        let part = batcher.build_part(vec![frame(3), frame(0), frame(2), frame(1)], 1, 99);

        assert_eq!(part.frame_indices(), vec![0, 1, 2, 3]);
        assert_eq!(part.auxiliary.len(), 1);
        assert_eq!(part.auxiliary[0].name, HINT_FILENAME);
        assert_eq!(part.name, "cap_frames_part1_99.zip");

        let later = batcher.build_part(vec![frame(5), frame(4)], 2, 99);
        assert!(later.auxiliary.is_empty());
    }

    #[test]
    fn flushes_at_threshold() {
        let batcher = ArchiveBatcher::new("cap", 60, "png", 3);
        assert!(!batcher.should_flush(2));
        assert!(batcher.should_flush(3));
        assert_eq!(ArchiveBatcher::new("cap", 60, "png", 0).threshold(), 1);
    }

    #[test]
    fn zip_bytes_hold_every_entry() {
        let batcher = ArchiveBatcher::new("cap", 60, "png", 4);
        let part = batcher.build_part(vec![frame(1), frame(0)], 1, 5);
        let cursor = part.write_zip(Cursor::new(Vec::new())).unwrap();

        let mut archive = zip::ZipArchive::new(cursor).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["cap_00000.png", "cap_00001.png", HINT_FILENAME]);
    }

    #[tokio::test]
    async fn directory_sink_writes_final_archive_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ZipDirectorySink::new(dir.path().join("out"));
        let part = ArchiveBatcher::new("cap", 60, "png", 4).build_part(vec![frame(0)], 1, 7);

        sink.persist(part).await.unwrap();

        assert_eq!(sink.written().len(), 1);
        assert!(sink.written()[0].ends_with("cap_frames_part1_7.zip"));
        let leftovers: Vec<_> = std::fs::read_dir(sink.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn directory_sink_archive_reads_back_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ZipDirectorySink::new(dir.path());
        let batcher = ArchiveBatcher::new("cap", 60, "png", 4);

        sink.persist(batcher.build_part(vec![frame(2), frame(1)], 2, 7))
            .await
            .unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&sink.written()[0]).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("cap_00002.png").unwrap();
        let mut contents = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut contents).unwrap();
        assert_eq!(contents, vec![2; 4]);
    }
}
