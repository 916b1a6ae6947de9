//! `fmt ` chunk: the PCM format descriptor.

use std::io::Read;

use serde::Serialize;

use crate::chunk::{read_u16_le, read_u32_le, FMT};
use crate::error::{Result, WaveError};

/// Payload size of a plain PCM `fmt ` chunk. Extended layouts are rejected.
pub const FMT_PCM_SIZE: u32 = 16;
pub const WAVE_FORMAT_PCM: u16 = 1;

/// Sample layout of the `data` chunk, as declared by `fmt `.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PcmFormat {
    /// 1 for PCM. Other values are carried through unchecked.
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// Builds a PCM descriptor, deriving block align and byte rate.
    pub fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        let block_align = channels * (bits_per_sample / 8);
        Self {
            format_tag: WAVE_FORMAT_PCM,
            channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate * block_align as u32,
            block_align,
            bits_per_sample,
        }
    }

    pub fn is_pcm(&self) -> bool {
        self.format_tag == WAVE_FORMAT_PCM
    }

    pub fn bytes_per_sample(&self) -> u32 {
        (self.bits_per_sample / 8) as u32
    }

    /// One sample for every channel
    pub fn bytes_per_frame(&self) -> u32 {
        self.channels as u32 * self.bytes_per_sample()
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.bytes_per_frame() as u64
    }

    pub fn to_bytes(&self) -> [u8; FMT_PCM_SIZE as usize] {
        let mut bytes = [0u8; FMT_PCM_SIZE as usize];
        bytes[0..2].copy_from_slice(&self.format_tag.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.channels.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.sample_rate.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.avg_bytes_per_sec.to_le_bytes());
        bytes[12..14].copy_from_slice(&self.block_align.to_le_bytes());
        bytes[14..16].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        bytes
    }
}

/// Reads the six fixed `fmt ` fields. The declared size must be exactly 16;
/// nothing is consumed when it is not.
pub fn parse_format<R: Read + ?Sized>(reader: &mut R, declared_size: u32) -> Result<PcmFormat> {
    if declared_size != FMT_PCM_SIZE {
        return Err(WaveError::SizeMismatch {
            tag: FMT,
            declared: declared_size,
            expected: FMT_PCM_SIZE as u64,
        });
    }

    Ok(PcmFormat {
        format_tag: read_u16_le(reader)?,
        channels: read_u16_le(reader)?,
        sample_rate: read_u32_le(reader)?,
        avg_bytes_per_sec: read_u32_le(reader)?,
        block_align: read_u16_le(reader)?,
        bits_per_sample: read_u16_le(reader)?,
    })
}
