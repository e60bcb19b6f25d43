//! Minimal Motion-JPEG AVI (RIFF) writer: one video stream, every frame a key frame.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;
const FRAME_CHUNK: &[u8; 4] = b"00dc";

struct IndexEntry {
    offset: u32,
    size: u32,
}

pub struct MjpegWriter<W: Write + Seek> {
    out: W,
    riff_size_pos: u64,
    total_frames_pos: u64,
    avih_buffer_pos: u64,
    stream_length_pos: u64,
    strh_buffer_pos: u64,
    movi_size_pos: u64,
    index: Vec<IndexEntry>,
    largest_frame: u32,
}

impl MjpegWriter<BufWriter<File>> {
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), width, height, fps)
    }
}

impl<W: Write + Seek> MjpegWriter<W> {
    pub fn new(mut out: W, width: u32, height: u32, fps: u32) -> io::Result<Self> {
        let fps = fps.max(1);
        let start = out.stream_position()?;

        out.write_all(b"RIFF")?;
        let riff_size_pos = start + 4;
        put_u32(&mut out, 0)?;
        out.write_all(b"AVI ")?;

        out.write_all(b"LIST")?;
        put_u32(&mut out, 192)?;
        out.write_all(b"hdrl")?;

        out.write_all(b"avih")?;
        put_u32(&mut out, 56)?;
        put_u32(&mut out, 1_000_000 / fps)?;
        put_u32(&mut out, 0)?; // max bytes per sec
        put_u32(&mut out, 0)?; // padding granularity
        put_u32(&mut out, AVIF_HASINDEX)?;
        let total_frames_pos = out.stream_position()?;
        put_u32(&mut out, 0)?;
        put_u32(&mut out, 0)?; // initial frames
        put_u32(&mut out, 1)?; // streams
        let avih_buffer_pos = out.stream_position()?;
        put_u32(&mut out, 0)?;
        put_u32(&mut out, width)?;
        put_u32(&mut out, height)?;
        out.write_all(&[0; 16])?;

        out.write_all(b"LIST")?;
        put_u32(&mut out, 116)?;
        out.write_all(b"strl")?;

        out.write_all(b"strh")?;
        put_u32(&mut out, 56)?;
        out.write_all(b"vids")?;
        out.write_all(b"MJPG")?;
        put_u32(&mut out, 0)?; // flags
        put_u16(&mut out, 0)?; // priority
        put_u16(&mut out, 0)?; // language
        put_u32(&mut out, 0)?; // initial frames
        put_u32(&mut out, 1)?; // scale
        put_u32(&mut out, fps)?; // rate
        put_u32(&mut out, 0)?; // start
        let stream_length_pos = out.stream_position()?;
        put_u32(&mut out, 0)?;
        let strh_buffer_pos = out.stream_position()?;
        put_u32(&mut out, 0)?;
        put_u32(&mut out, u32::MAX)?; // quality: driver default
        put_u32(&mut out, 0)?; // sample size
        put_u16(&mut out, 0)?;
        put_u16(&mut out, 0)?;
        put_u16(&mut out, clamp_u16(width))?;
        put_u16(&mut out, clamp_u16(height))?;

        out.write_all(b"strf")?;
        put_u32(&mut out, 40)?;
        put_u32(&mut out, 40)?; // header size
        put_u32(&mut out, width)?;
        put_u32(&mut out, height)?;
        put_u16(&mut out, 1)?; // planes
        put_u16(&mut out, 24)?; // bit count
        out.write_all(b"MJPG")?;
        put_u32(&mut out, width.saturating_mul(height).saturating_mul(3))?;
        out.write_all(&[0; 16])?;

        out.write_all(b"LIST")?;
        let movi_size_pos = out.stream_position()?;
        put_u32(&mut out, 0)?;
        out.write_all(b"movi")?;

        Ok(Self {
            out,
            riff_size_pos,
            total_frames_pos,
            avih_buffer_pos,
            stream_length_pos,
            strh_buffer_pos,
            movi_size_pos,
            index: Vec::new(),
            largest_frame: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.index.len()
    }

    /// Appends one JPEG-encoded frame. On failure the stream is rewound to where the
    /// chunk started, so the next frame replaces the partial one.
    pub fn add_frame(&mut self, jpeg: &[u8]) -> io::Result<()> {
        let size = u32::try_from(jpeg.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame exceeds 4 GiB"))?;
        let chunk_pos = self.out.stream_position()?;
        // Index offsets are relative to the `movi` fourcc.
        let offset = u32::try_from(chunk_pos - (self.movi_size_pos + 4))
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "AVI exceeds 4 GiB"))?;

        if let Err(err) = self.write_chunk(jpeg, size) {
            self.out.seek(SeekFrom::Start(chunk_pos))?;
            return Err(err);
        }

        self.index.push(IndexEntry { offset, size });
        self.largest_frame = self.largest_frame.max(size);
        Ok(())
    }

    /// Writes the index, patches the header sizes and counts, and returns the sink.
    pub fn finish(mut self) -> io::Result<W> {
        let idx1_pos = self.out.stream_position()?;
        self.out.write_all(b"idx1")?;
        put_u32(&mut self.out, (self.index.len() * 16) as u32)?;
        for entry in &self.index {
            self.out.write_all(FRAME_CHUNK)?;
            put_u32(&mut self.out, AVIIF_KEYFRAME)?;
            put_u32(&mut self.out, entry.offset)?;
            put_u32(&mut self.out, entry.size)?;
        }
        let end = self.out.stream_position()?;

        let frames = self.index.len() as u32;
        let movi_size = (idx1_pos - (self.movi_size_pos + 4)) as u32;
        let riff_size = (end - (self.riff_size_pos + 4)) as u32;
        let largest_frame = self.largest_frame;
        self.patch(self.riff_size_pos, riff_size)?;
        self.patch(self.movi_size_pos, movi_size)?;
        self.patch(self.total_frames_pos, frames)?;
        self.patch(self.stream_length_pos, frames)?;
        self.patch(self.avih_buffer_pos, largest_frame)?;
        self.patch(self.strh_buffer_pos, largest_frame)?;

        self.out.seek(SeekFrom::Start(end))?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_chunk(&mut self, jpeg: &[u8], size: u32) -> io::Result<()> {
        self.out.write_all(FRAME_CHUNK)?;
        put_u32(&mut self.out, size)?;
        self.out.write_all(jpeg)?;
        if size % 2 == 1 {
            self.out.write_all(&[0])?;
        }
        Ok(())
    }

    fn patch(&mut self, pos: u64, value: u32) -> io::Result<()> {
        self.out.seek(SeekFrom::Start(pos))?;
        put_u32(&mut self.out, value)
    }
}

fn put_u32(out: &mut impl Write, value: u32) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn put_u16(out: &mut impl Write, value: u16) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn clamp_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
