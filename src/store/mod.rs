//! Session directories and the accepted frames persisted inside them.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use thiserror::Error;

mod stamp;

pub use stamp::FrameStamp;

pub const FRAME_EXTENSION: &str = "jpg";
pub const VIDEO_EXTENSION: &str = "avi";
const PARTIAL_SUFFIX: &str = "part";

/// Directory under the user's home holding one sub-directory per session.
pub fn default_base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine the home directory")?;
    Ok(home.join("coreshots"))
}

pub fn validate_session_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("no name provided for the recording");
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        bail!("recording name {name:?} must not contain path separators");
    }
    Ok(())
}

/// One named recording: `<base>/<name>/` with frames and, later, `<name>.avi`.
#[derive(Debug, Clone)]
pub struct SessionDir {
    name: String,
    root: PathBuf,
}

impl SessionDir {
    pub fn new(base: &Path, name: &str) -> Result<Self> {
        validate_session_name(name)?;
        Ok(Self {
            name: name.to_string(),
            root: base.join(name),
        })
    }

    /// Like `new`, but also creates the directory.
    pub fn create(base: &Path, name: &str) -> Result<Self> {
        let session = Self::new(base, name)?;
        fs::create_dir_all(&session.root).with_context(|| {
            format!("failed to create session directory {}", session.root.display())
        })?;
        Ok(session)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn frame_path(&self, stamp: FrameStamp) -> PathBuf {
        self.root.join(stamp.file_name())
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.root.join(format!("{}.{VIDEO_EXTENSION}", self.name))
    }

    /// Directory entries sorted by file name. Sub-directories are left out.
    pub fn list_entries(&self) -> io::Result<Vec<FrameEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            entries.push(FrameEntry {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
            });
        }
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    pub file_name: String,
    pub path: PathBuf,
}

impl FrameEntry {
    pub fn is_frame_image(&self) -> bool {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(FRAME_EXTENSION))
            && !self.file_name.starts_with('.')
    }

    pub fn stamp(&self) -> Option<FrameStamp> {
        FrameStamp::parse_file_name(&self.file_name)
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("frame {} already exists", path.display())]
    AlreadyExists { path: PathBuf },
    #[error("failed to encode frame {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write frame {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes accepted frames into a session as JPEG files named after their stamp.
#[derive(Debug, Clone)]
pub struct FrameStore {
    session: SessionDir,
    jpeg_quality: u8,
}

impl FrameStore {
    pub fn new(session: SessionDir, jpeg_quality: u8) -> Self {
        Self {
            session,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Encodes into a hidden `.part` file and renames it into place, so a crash never
    /// leaves a truncated `HH_MM_SS.jpg` behind. An existing frame is never replaced.
    pub fn persist(&self, stamp: FrameStamp, frame: &DynamicImage) -> Result<PathBuf, PersistError> {
        let path = self.session.frame_path(stamp);
        if path.exists() {
            return Err(PersistError::AlreadyExists { path });
        }
        let partial = self
            .session
            .path()
            .join(format!(".{}.{PARTIAL_SUFFIX}", stamp.file_name()));

        let io_err = |source| PersistError::Io {
            path: path.clone(),
            source,
        };
        let file = fs::File::create(&partial).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality)
            .encode_image(&frame.to_rgb8())
            .map_err(|source| PersistError::Encode {
                path: path.clone(),
                source,
            })?;
        writer.flush().map_err(io_err)?;
        drop(writer);
        fs::rename(&partial, &path).map_err(io_err)?;
        Ok(path)
    }
}
