//! RIFF/WAVE container parsing into an immutable [`WaveFileInfo`].
//!
//! Parsing runs in two passes. The first walks the RIFF form once, recording
//! every chunk header and decoding `fmt `, `data` and `smpl` as they appear.
//! The second derives sample counts and the loop byte range from whatever was
//! found, so a `smpl` chunk placed before `data` resolves the same way as one
//! placed after it.
//!
//! Chunks are assumed unpadded: an odd-sized chunk is followed immediately by
//! the next header, with no even-boundary pad byte skipped.

use std::fmt::{self, Display};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::chunk::{
    read_chunk_header, read_tag, ChunkDescriptor, ChunkKind, CHUNK_HEADER_SIZE, DATA, FMT, RIFF,
    WAVE,
};
use crate::error::{Result, WaveError};
use crate::format::{parse_format, PcmFormat};
use crate::sampler::{
    parse_sampler_chunk, resolve_loop_range, LoopByteRange, LoopRecord, SamplerChunk,
    SamplerHeader,
};

/// Bytes consumed by `"RIFF"`, the form size and `"WAVE"`.
pub const RIFF_HEADER_SIZE: u64 = 12;

/// Where the raw PCM payload lives in the original stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataExtent {
    pub start: u64,
    pub size: u32,
    pub end: u64,
}

impl DataExtent {
    pub fn new(start: u64, size: u32) -> Self {
        Self {
            start,
            size,
            end: start + size as u64,
        }
    }
}

/// Everything playback needs to know about a wave file, minus the samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveFileInfo {
    format: PcmFormat,
    data: DataExtent,
    chunks: Vec<ChunkDescriptor>,
    sampler: Option<SamplerHeader>,
    loops: Vec<LoopRecord>,
    loop_range: Option<LoopByteRange>,
    sample_count: u64,
    frame_count: u64,
}

impl WaveFileInfo {
    pub fn format(&self) -> &PcmFormat {
        &self.format
    }

    pub fn data(&self) -> &DataExtent {
        &self.data
    }

    /// Every chunk walked, in stream order
    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn sampler(&self) -> Option<&SamplerHeader> {
        self.sampler.as_ref()
    }

    pub fn loops(&self) -> &[LoopRecord] {
        &self.loops
    }

    /// Byte range of the first loop record, if the file has one.
    pub fn loop_range(&self) -> Option<LoopByteRange> {
        self.loop_range
    }

    pub fn has_loop(&self) -> bool {
        self.loop_range.is_some()
    }

    /// Individual samples across all channels
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Offset at which streaming stops or wraps: the loop end when looping,
    /// the data end otherwise.
    pub fn stream_end(&self) -> u64 {
        self.loop_range.map_or(self.data.end, |range| range.end)
    }

    /// Length of one straight pass through the data chunk.
    pub fn play_time(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count as f64 / self.format.sample_rate as f64)
    }
}

/// `16[bit] 44100[Hz] 2[ch] Loop=false`
impl Display for WaveFileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[bit] {}[Hz] {}[ch] Loop={}",
            self.format.bits_per_sample,
            self.format.sample_rate,
            self.format.channels,
            self.has_loop()
        )
    }
}

/// Opens and parses a wave file. The returned file is positioned at offset 0.
pub fn open_wave_file(path: impl AsRef<Path>) -> Result<(File, WaveFileInfo)> {
    let mut file = File::open(path.as_ref())?;
    let info = parse_wave(&mut BufReader::new(&mut file))?;
    Ok((file, info))
}

/// Parses a complete RIFF/WAVE stream from its first byte.
///
/// Any failure aborts the whole parse; nothing partially collected is
/// returned. On success the stream is rewound to offset 0.
pub fn parse_wave<R: Read + Seek + ?Sized>(reader: &mut R) -> Result<WaveFileInfo> {
    reader.seek(SeekFrom::Start(0))?;
    let form_size = read_riff_header(reader)?;
    let scanned = walk_chunks(reader, form_size)?;
    reader.seek(SeekFrom::Start(0))?;
    scanned.finish()
}

/// Validates the magic and returns the declared form size.
fn read_riff_header<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let header = read_chunk_header(reader)?;
    if header.tag != RIFF {
        return Err(WaveError::NotRiff(header.tag));
    }
    let form_type = read_tag(reader)?;
    if form_type != WAVE {
        return Err(WaveError::NotWave(form_type));
    }
    Ok(header.size)
}

#[derive(Default)]
struct ScannedChunks {
    chunks: Vec<ChunkDescriptor>,
    format: Option<PcmFormat>,
    data: Option<DataExtent>,
    sampler: Option<SamplerChunk>,
}

/// Walks subchunks until the cursor reaches the end of the RIFF form. The
/// form size counts from the byte after the size field, so the form ends at
/// absolute offset `8 + form_size`.
fn walk_chunks<R: Read + Seek + ?Sized>(reader: &mut R, form_size: u32) -> Result<ScannedChunks> {
    let form_end = CHUNK_HEADER_SIZE + form_size as u64;
    let mut cursor = RIFF_HEADER_SIZE;
    let mut scanned = ScannedChunks::default();

    while cursor < form_end {
        let header = read_chunk_header(reader)?;
        cursor += CHUNK_HEADER_SIZE;

        match ChunkKind::classify(&header) {
            ChunkKind::Format => {
                if scanned.format.is_some() {
                    warn!(tag = %header.tag, "duplicate fmt chunk, keeping the last one");
                }
                scanned.format = Some(parse_format(reader, header.size)?);
            }
            ChunkKind::Data => {
                if scanned.data.is_some() {
                    warn!(tag = %header.tag, "duplicate data chunk, keeping the last one");
                }
                scanned.data = Some(DataExtent::new(cursor, header.size));
                reader.seek(SeekFrom::Current(header.size as i64))?;
            }
            ChunkKind::Sampler => {
                if scanned.sampler.is_some() {
                    warn!(tag = %header.tag, "duplicate smpl chunk, keeping the last one");
                }
                scanned.sampler = Some(parse_sampler_chunk(reader, header.size)?);
            }
            ChunkKind::Unknown(unknown) => {
                debug!(tag = %unknown.tag, size = unknown.size, "skipping chunk");
                reader.seek(SeekFrom::Current(unknown.size as i64))?;
            }
        }

        scanned.chunks.push(header);
        cursor += header.size as u64;
    }

    if cursor != form_end {
        return Err(WaveError::FormSizeMismatch {
            declared: form_size as u64,
            scanned: cursor - CHUNK_HEADER_SIZE,
        });
    }

    Ok(scanned)
}

impl ScannedChunks {
    fn finish(self) -> Result<WaveFileInfo> {
        let format = self.format.ok_or(WaveError::MissingChunk(FMT))?;
        let data = self.data.ok_or(WaveError::MissingChunk(DATA))?;

        let bytes_per_sample = format.bytes_per_sample() as u64;
        if format.channels == 0 || bytes_per_sample == 0 {
            return Err(WaveError::InvalidLayout {
                channels: format.channels,
                bits_per_sample: format.bits_per_sample,
            });
        }
        if !format.is_pcm() {
            warn!(
                format_tag = format.format_tag,
                "format tag is not PCM, reading samples as PCM anyway"
            );
        }
        if format.bits_per_sample % 8 != 0 {
            warn!(bits = format.bits_per_sample, "sample width is not a whole number of bytes");
        }

        let sample_count = data.size as u64 / bytes_per_sample;
        let frame_count = sample_count / format.channels as u64;
        if data.size as u64 % format.bytes_per_frame() as u64 != 0 {
            warn!(
                size = data.size,
                frame = format.bytes_per_frame(),
                "data chunk ends in a partial frame"
            );
        }

        let (sampler, loops) = match self.sampler {
            Some(chunk) => (Some(chunk.header), chunk.loops),
            None => (None, Vec::new()),
        };

        let loop_range = resolve_loop_range(&loops, &data, &format);
        if loops.len() > 1 {
            debug!(count = loops.len(), "only the first loop record is used");
        }
        if let Some(range) = loop_range {
            if !range.is_within(&data) {
                warn!(
                    loop_start = range.start,
                    loop_end = range.end,
                    data_start = data.start,
                    data_end = data.end,
                    "loop range falls outside the data chunk"
                );
            }
        }

        debug!(
            chunks = self.chunks.len(),
            data_start = data.start,
            data_size = data.size,
            sample_count,
            frame_count,
            "parsed wave file"
        );

        Ok(WaveFileInfo {
            format,
            data,
            chunks: self.chunks,
            sampler,
            loops,
            loop_range,
            sample_count,
            frame_count,
        })
    }
}
