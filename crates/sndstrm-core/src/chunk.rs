//! RIFF chunk headers and the closed set of chunk kinds the parser dispatches on.

use std::fmt::{self, Display};
use std::io::{self, Read};

use serde::{Serialize, Serializer};

pub const RIFF: ChunkTag = ChunkTag(*b"RIFF");
pub const WAVE: ChunkTag = ChunkTag(*b"WAVE");
pub const FMT: ChunkTag = ChunkTag(*b"fmt ");
pub const DATA: ChunkTag = ChunkTag(*b"data");
pub const SMPL: ChunkTag = ChunkTag(*b"smpl");

/// Bytes taken by a chunk header: four tag bytes plus a little-endian u32 length.
pub const CHUNK_HEADER_SIZE: u64 = 8;

/// Four-byte chunk identifier, kept raw so unknown or malformed tags survive intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    /// ASCII case-insensitive comparison (`FMT ` matches `fmt `).
    pub fn matches(&self, other: ChunkTag) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl From<[u8; 4]> for ChunkTag {
    fn from(tag: [u8; 4]) -> Self {
        ChunkTag(tag)
    }
}

impl From<&[u8; 4]> for ChunkTag {
    fn from(tag: &[u8; 4]) -> Self {
        ChunkTag(*tag)
    }
}

impl Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

impl Serialize for ChunkTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.escape_ascii())
    }
}

/// A `(tag, size)` pair as it appeared in the stream. Every chunk the parser
/// walks over is recorded as one of these, parsed or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkDescriptor {
    pub tag: ChunkTag,
    /// Payload length, excluding the 8 header bytes
    pub size: u32,
}

impl ChunkDescriptor {
    pub fn new(tag: impl Into<ChunkTag>, size: u32) -> Self {
        Self {
            tag: tag.into(),
            size,
        }
    }

    /// Header plus payload
    pub fn span(&self) -> u64 {
        CHUNK_HEADER_SIZE + self.size as u64
    }
}

impl Display for ChunkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.tag, self.size)
    }
}

/// Chunks the parser knows how to interpret. Anything else is `Unknown` and
/// gets skipped byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Format,
    Data,
    Sampler,
    Unknown(ChunkDescriptor),
}

impl ChunkKind {
    pub fn classify(header: &ChunkDescriptor) -> Self {
        let tag = header.tag;
        if tag.matches(FMT) {
            ChunkKind::Format
        } else if tag.matches(DATA) {
            ChunkKind::Data
        } else if tag.matches(SMPL) {
            ChunkKind::Sampler
        } else {
            ChunkKind::Unknown(*header)
        }
    }
}

/// Reads one chunk header, consuming exactly 8 bytes. The tag is not
/// validated here; a short stream surfaces as `UnexpectedEof`.
pub fn read_chunk_header<R: Read + ?Sized>(reader: &mut R) -> io::Result<ChunkDescriptor> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(ChunkDescriptor {
        tag: ChunkTag([buf[0], buf[1], buf[2], buf[3]]),
        size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
    })
}

pub(crate) fn read_tag<R: Read + ?Sized>(reader: &mut R) -> io::Result<ChunkTag> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(ChunkTag(buf))
}

pub(crate) fn read_u16_le<R: Read + ?Sized>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32_le<R: Read + ?Sized>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
