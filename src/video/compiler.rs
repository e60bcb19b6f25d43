use std::fs;
use std::io::{self, Seek, Write};
use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use thiserror::Error;

use crate::map::{CropError, MapMode};
use crate::store::{FrameEntry, SessionDir};

use super::avi::MjpegWriter;
use super::overlay::{Compositor, LabelError};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

pub const FRAMES_PER_SECOND: u32 = 1;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to list session directory {}: {source}", path.display())]
    EmptySession {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create video {}: {source}", path.display())]
    CreateArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to finalize video {}: {source}", path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single directory entry did not become a video frame.
#[derive(Debug, Error)]
pub enum FrameSkip {
    #[error("not an image")]
    NotAnImage,
    #[error("failed to read file: {0}")]
    Unreadable(#[source] io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("file name is not a HH_MM_SS capture time")]
    Unstamped,
    #[error(transparent)]
    Crop(#[from] CropError),
    #[error(transparent)]
    Label(#[from] LabelError),
    #[error("failed to encode composite: {0}")]
    Encode(#[source] image::ImageError),
    #[error("failed to append frame: {0}")]
    Append(#[source] io::Error),
}

#[derive(Debug)]
pub struct SkippedFrame {
    pub file_name: String,
    pub reason: FrameSkip,
}

#[derive(Debug)]
pub struct CompileReport {
    pub artifact: PathBuf,
    pub frames_written: usize,
    pub skipped: Vec<SkippedFrame>,
}

/// Result of rendering one directory entry.
pub struct FrameOutcome<'a> {
    pub entry: &'a FrameEntry,
    pub result: Result<Vec<u8>, FrameSkip>,
}

/// Session entries in capture order. Entries whose name is not a `FrameStamp` follow
/// in file-name order. Rendering is lazy and can be repeated.
#[derive(Debug, Clone)]
pub struct FramePlan {
    mode: MapMode,
    entries: Vec<FrameEntry>,
}

impl FramePlan {
    pub fn scan(session: &SessionDir, mode: MapMode) -> Result<Self, CompileError> {
        let entries = session
            .list_entries()
            .map_err(|source| CompileError::EmptySession {
                path: session.path().to_path_buf(),
                source,
            })?;
        Ok(Self::from_entries(mode, entries))
    }

    pub fn from_entries(mode: MapMode, mut entries: Vec<FrameEntry>) -> Self {
        // Only valid within one calendar day; the capture loop warns when a session crosses midnight.
        entries.sort_by_cached_key(|entry| {
            let stamp = entry.stamp();
            (stamp.is_none(), stamp, entry.file_name.clone())
        });
        Self { mode, entries }
    }

    /// One JPEG-encoded composite, or the reason it was skipped, per entry.
    pub fn outcomes<'a>(
        &'a self,
        compositor: &'a Compositor,
        jpeg_quality: u8,
    ) -> impl Iterator<Item = FrameOutcome<'a>> + 'a {
        self.entries.iter().map(move |entry| FrameOutcome {
            entry,
            result: render_frame(entry, self.mode, compositor, jpeg_quality),
        })
    }
}

fn render_frame(
    entry: &FrameEntry,
    mode: MapMode,
    compositor: &Compositor,
    jpeg_quality: u8,
) -> Result<Vec<u8>, FrameSkip> {
    if !entry.is_frame_image() {
        return Err(FrameSkip::NotAnImage);
    }
    let data = fs::read(&entry.path).map_err(FrameSkip::Unreadable)?;
    let image = image::load_from_memory(&data).map_err(FrameSkip::Decode)?;
    let stamp = entry.stamp().ok_or(FrameSkip::Unstamped)?;
    let cropped = mode.display_region().crop(&image)?;
    let composite = compositor.compose(&cropped, &stamp.label())?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality)
        .encode_image(&DynamicImage::ImageRgba8(composite).to_rgb8())
        .map_err(FrameSkip::Encode)?;
    Ok(jpeg)
}

/// Appends every renderable entry of `plan` to `writer` and returns the entries that
/// were skipped.
pub fn write_frames<W: Write + Seek>(
    plan: &FramePlan,
    compositor: &Compositor,
    jpeg_quality: u8,
    writer: &mut MjpegWriter<W>,
) -> Vec<SkippedFrame> {
    let mut skipped = Vec::new();

    for outcome in plan.outcomes(compositor, jpeg_quality) {
        let file_name = &outcome.entry.file_name;
        log_info!("adding frame"; file = file_name);

        let appended = outcome
            .result
            .and_then(|jpeg| writer.add_frame(&jpeg).map_err(FrameSkip::Append));
        match appended {
            Ok(()) => {}
            Err(FrameSkip::NotAnImage) => {
                log_info!("skipping file as it's not an image"; filename = file_name);
                skipped.push(SkippedFrame {
                    file_name: file_name.clone(),
                    reason: FrameSkip::NotAnImage,
                });
            }
            Err(reason) => {
                log_error!("skipping frame"; filename = file_name, err = reason);
                skipped.push(SkippedFrame {
                    file_name: file_name.clone(),
                    reason,
                });
            }
        }
    }

    skipped
}

/// Compiles every accepted frame of `session` into `<session>/<name>.avi`.
pub fn compile(
    session: &SessionDir,
    mode: MapMode,
    compositor: &Compositor,
    jpeg_quality: u8,
) -> Result<CompileReport, CompileError> {
    log_info!("converting screenshots to a video"; session = session.name(), mode = mode);

    let plan = FramePlan::scan(session, mode)?;
    let artifact = session.artifact_path();
    let (width, height) = compositor.dimensions();
    log_info!("video format"; width = width, height = height, fps = FRAMES_PER_SECOND);

    let writer = MjpegWriter::create(&artifact, width, height, FRAMES_PER_SECOND).map_err(
        |source| CompileError::CreateArtifact {
            path: artifact.clone(),
            source,
        },
    )?;

    encode_video(&plan, compositor, jpeg_quality, writer, artifact)
}

/// Feeds `plan` into `writer` and finalizes it. `artifact` names the output in the
/// report and in errors.
pub fn encode_video<W: Write + Seek>(
    plan: &FramePlan,
    compositor: &Compositor,
    jpeg_quality: u8,
    mut writer: MjpegWriter<W>,
    artifact: PathBuf,
) -> Result<CompileReport, CompileError> {
    let skipped = write_frames(plan, compositor, jpeg_quality, &mut writer);
    let frames_written = writer.frame_count();

    if let Err(source) = writer.finish() {
        log_error!("failed to finalize video"; path = artifact.display(), err = source);
        return Err(CompileError::Finalize {
            path: artifact,
            source,
        });
    }

    log_info!(
        "video created";
        path = artifact.display(),
        frames = frames_written,
        skipped = skipped.len()
    );
    Ok(CompileReport {
        artifact,
        frames_written,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets;
    use crate::video::avi::tests::{indexed_frames, FlakySink};
    use crate::video::overlay::tests::RecordingPainter;
    use crate::video::overlay::MissingFont;
    use image::GenericImageView;

    fn spawn_frame_jpeg() -> Vec<u8> {
        let reference = image::load_from_memory(assets::SPAWN_REFERENCE).unwrap();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 80)
            .encode_image(&reference.to_rgb8())
            .unwrap();
        jpeg
    }

    fn session_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, SessionDir) {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionDir::create(dir.path(), "match").unwrap();
        for (name, bytes) in files {
            fs::write(session.path().join(name), bytes).unwrap();
        }
        (dir, session)
    }

    fn compositor(painter: &RecordingPainter) -> Compositor {
        Compositor::new(MapMode::Spawn.display_region(), Box::new(painter.clone()), 100.0).unwrap()
    }

    #[test]
    fn compiles_valid_frames_in_timestamp_order() {
        let jpeg = spawn_frame_jpeg();
        let (_dir, session) = session_with(&[
            ("10_00_00.jpg", jpeg.as_slice()),
            ("09_59_59.jpg", jpeg.as_slice()),
            ("notes.txt", b"remember the flank".as_slice()),
            ("corrupt.jpg", b"\xff\xd8 truncated".as_slice()),
        ]);
        let painter = RecordingPainter::default();

        let report = compile(&session, MapMode::Spawn, &compositor(&painter), 85).unwrap();

        assert_eq!(report.frames_written, 2);
        assert_eq!(report.artifact, session.path().join("match.avi"));
        assert_eq!(
            *painter.labels.lock().unwrap(),
            vec!["09:59:59".to_string(), "10:00:00".to_string()]
        );

        let skipped: Vec<(&str, &FrameSkip)> = report
            .skipped
            .iter()
            .map(|s| (s.file_name.as_str(), &s.reason))
            .collect();
        assert_eq!(skipped.len(), 2);
        assert!(matches!(skipped[0], ("corrupt.jpg", FrameSkip::Decode(_))));
        assert!(matches!(skipped[1], ("notes.txt", FrameSkip::NotAnImage)));

        let bytes = fs::read(&report.artifact).unwrap();
        let frames = indexed_frames(&bytes);
        assert_eq!(frames.len(), 2);
        for frame in frames {
            let decoded = image::load_from_memory(&frame).unwrap();
            assert_eq!(decoded.dimensions(), (934, 938));
        }
    }

    #[test]
    fn order_does_not_depend_on_listing_order() {
        let jpeg = spawn_frame_jpeg();
        let names = ["12_00_00.jpg", "09_00_00.jpg", "10_30_00.jpg", "09_59_59.jpg"];
        let files: Vec<(&str, &[u8])> = names.iter().map(|name| (*name, jpeg.as_slice())).collect();
        let (_dir, session) = session_with(&files);
        let entries = session.list_entries().unwrap();
        let mut reversed = entries.clone();
        reversed.reverse();
        let painter = RecordingPainter::default();
        let compositor = compositor(&painter);

        let forward = FramePlan::from_entries(MapMode::Spawn, entries);
        let backward = FramePlan::from_entries(MapMode::Spawn, reversed);
        let order = |plan: &FramePlan| -> Vec<String> {
            plan.outcomes(&compositor, 85)
                .map(|outcome| outcome.entry.file_name.clone())
                .collect()
        };

        assert_eq!(order(&forward), vec!["09_00_00.jpg", "09_59_59.jpg", "10_30_00.jpg", "12_00_00.jpg"]);
        assert_eq!(order(&forward), order(&backward));
        assert_eq!(
            painter.labels.lock().unwrap()[..4],
            ["09:00:00", "09:59:59", "10:30:00", "12:00:00"].map(String::from)
        );
    }

    #[test]
    fn image_without_capture_time_is_skipped() {
        let jpeg = spawn_frame_jpeg();
        let (_dir, session) = session_with(&[("holiday.jpg", jpeg.as_slice()), ("10_00_00.jpg", jpeg.as_slice())]);
        let painter = RecordingPainter::default();

        let report = compile(&session, MapMode::Spawn, &compositor(&painter), 85).unwrap();

        assert_eq!(report.frames_written, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].file_name, "holiday.jpg");
        assert!(matches!(report.skipped[0].reason, FrameSkip::Unstamped));
        assert_eq!(*painter.labels.lock().unwrap(), vec!["10:00:00".to_string()]);
    }

    #[test]
    fn append_failure_skips_only_that_frame() {
        let jpeg = spawn_frame_jpeg();
        let (_dir, session) = session_with(&[("09_59_59.jpg", jpeg.as_slice()), ("10_00_00.jpg", jpeg.as_slice())]);
        let painter = RecordingPainter::default();
        let compositor = compositor(&painter);
        let plan = FramePlan::scan(&session, MapMode::Spawn).unwrap();
        let sink = FlakySink {
            fail_large_write: Some(0),
            ..FlakySink::default()
        };
        let writer = MjpegWriter::new(sink, 934, 938, FRAMES_PER_SECOND).unwrap();

        let report = encode_video(&plan, &compositor, 85, writer, session.artifact_path()).unwrap();

        assert_eq!(report.frames_written, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].file_name, "09_59_59.jpg");
        assert!(matches!(report.skipped[0].reason, FrameSkip::Append(_)));
    }

    #[test]
    fn finalize_failure_is_returned() {
        let jpeg = spawn_frame_jpeg();
        let (_dir, session) = session_with(&[("10_00_00.jpg", jpeg.as_slice())]);
        let painter = RecordingPainter::default();
        let compositor = compositor(&painter);
        let plan = FramePlan::scan(&session, MapMode::Spawn).unwrap();
        let sink = FlakySink {
            fail_absolute_seeks: true,
            ..FlakySink::default()
        };
        let writer = MjpegWriter::new(sink, 934, 938, FRAMES_PER_SECOND).unwrap();

        let err = encode_video(&plan, &compositor, 85, writer, session.artifact_path()).unwrap_err();

        assert!(matches!(err, CompileError::Finalize { ref path, .. } if *path == session.artifact_path()));
    }

    #[test]
    fn outcomes_can_be_replayed() {
        let jpeg = spawn_frame_jpeg();
        let (_dir, session) = session_with(&[("10_00_00.jpg", jpeg.as_slice()), ("notes.txt", b"x".as_slice())]);
        let painter = RecordingPainter::default();
        let compositor = compositor(&painter);
        let plan = FramePlan::scan(&session, MapMode::Spawn).unwrap();

        let first: Vec<bool> = plan.outcomes(&compositor, 85).map(|o| o.result.is_ok()).collect();
        let second: Vec<bool> = plan.outcomes(&compositor, 85).map(|o| o.result.is_ok()).collect();
        assert_eq!(first, vec![true, false]);
        assert_eq!(first, second);
    }

    #[test]
    fn undersized_frame_is_skipped_as_crop_failure() {
        let mut small = Vec::new();
        JpegEncoder::new_with_quality(&mut small, 80)
            .encode_image(&image::RgbImage::new(320, 200))
            .unwrap();
        let (_dir, session) = session_with(&[("11_00_00.jpg", small.as_slice())]);
        let painter = RecordingPainter::default();

        let report = compile(&session, MapMode::Spawn, &compositor(&painter), 85).unwrap();

        assert_eq!(report.frames_written, 0);
        assert!(matches!(report.skipped[0].reason, FrameSkip::Crop(_)));
    }

    #[test]
    fn missing_font_skips_frames_but_still_finalizes() {
        let jpeg = spawn_frame_jpeg();
        let (_dir, session) = session_with(&[("10_00_00.jpg", jpeg.as_slice())]);
        let compositor = Compositor::new(
            MapMode::Spawn.display_region(),
            Box::new(MissingFont {
                reason: "no system font found".to_string(),
            }),
            100.0,
        )
        .unwrap();

        let report = compile(&session, MapMode::Spawn, &compositor, 85).unwrap();

        assert_eq!(report.frames_written, 0);
        assert!(matches!(report.skipped[0].reason, FrameSkip::Label(_)));
        assert!(indexed_frames(&fs::read(&report.artifact).unwrap()).is_empty());
    }

    #[test]
    fn previous_video_is_not_treated_as_a_frame() {
        let jpeg = spawn_frame_jpeg();
        let (_dir, session) = session_with(&[("10_00_00.jpg", jpeg.as_slice())]);
        let painter = RecordingPainter::default();
        let compositor = compositor(&painter);

        compile(&session, MapMode::Spawn, &compositor, 85).unwrap();
        let again = compile(&session, MapMode::Spawn, &compositor, 85).unwrap();

        assert_eq!(again.frames_written, 1);
        assert_eq!(again.skipped.len(), 1);
        assert_eq!(again.skipped[0].file_name, "match.avi");
    }

    #[test]
    fn missing_session_directory_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionDir::new(dir.path(), "never-recorded").unwrap();
        let painter = RecordingPainter::default();

        let err = compile(&session, MapMode::Spawn, &compositor(&painter), 85).unwrap_err();
        assert!(matches!(err, CompileError::EmptySession { .. }));
    }
}
