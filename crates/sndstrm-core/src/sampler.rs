//! `smpl` chunk: sampler header, loop records and the derived loop byte range.
//!
//! Only the first loop record is ever turned into a [`LoopByteRange`]; any
//! further records are kept for inspection but never played.

use std::io::Read;

use serde::Serialize;

use crate::chunk::{read_u32_le, SMPL};
use crate::error::{Result, WaveError};
use crate::format::PcmFormat;
use crate::wave::DataExtent;

/// Nine u32 fields precede the loop records.
pub const SMPL_HEADER_SIZE: u32 = 36;
/// Six u32 fields per loop record.
pub const SAMPLE_LOOP_SIZE: u32 = 24;

const MAX_PREALLOCATED_LOOPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SamplerHeader {
    pub manufacturer: u32,
    pub product: u32,
    /// Duration of one sample in nanoseconds
    pub sample_period_ns: u32,
    pub midi_unity_note: u32,
    pub midi_pitch_fraction: u32,
    pub smpte_format: u32,
    pub smpte_offset: u32,
    pub loop_count: u32,
    pub sampler_data_bytes: u32,
}

/// One raw loop entry. Start and end are sample-frame offsets into `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoopRecord {
    pub identifier: u32,
    pub loop_type: u32,
    pub start_sample: u32,
    pub end_sample: u32,
    pub fraction: u32,
    /// 0 means loop forever
    pub play_count: u32,
}

impl LoopRecord {
    pub fn is_infinite(&self) -> bool {
        self.play_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamplerChunk {
    pub header: SamplerHeader,
    pub loops: Vec<LoopRecord>,
}

/// Absolute stream offsets of the active loop: playback wraps from `end`
/// back to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopByteRange {
    pub start: u64,
    pub end: u64,
}

impl LoopByteRange {
    /// Converts a record's sample offsets to byte offsets relative to the
    /// start of the data chunk payload.
    pub fn from_record(record: &LoopRecord, data: &DataExtent, format: &PcmFormat) -> Self {
        let frame = format.bytes_per_frame() as u64;
        Self {
            start: data.start + record.start_sample as u64 * frame,
            end: data.start + record.end_sample as u64 * frame,
        }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `data.start <= start < end <= data.end`
    pub fn is_within(&self, data: &DataExtent) -> bool {
        data.start <= self.start && self.start < self.end && self.end <= data.end
    }
}

/// Selects the first loop record and resolves it against the data extent.
pub fn resolve_loop_range(
    loops: &[LoopRecord],
    data: &DataExtent,
    format: &PcmFormat,
) -> Option<LoopByteRange> {
    loops
        .first()
        .map(|record| LoopByteRange::from_record(record, data, format))
}

/// Reads a `smpl` payload. The declared size must equal `36 + 24 * loops`
/// exactly; the check runs before any loop record is read.
pub fn parse_sampler_chunk<R: Read + ?Sized>(
    reader: &mut R,
    declared_size: u32,
) -> Result<SamplerChunk> {
    if declared_size < SMPL_HEADER_SIZE {
        return Err(WaveError::SizeMismatch {
            tag: SMPL,
            declared: declared_size,
            expected: SMPL_HEADER_SIZE as u64,
        });
    }

    let header = SamplerHeader {
        manufacturer: read_u32_le(reader)?,
        product: read_u32_le(reader)?,
        sample_period_ns: read_u32_le(reader)?,
        midi_unity_note: read_u32_le(reader)?,
        midi_pitch_fraction: read_u32_le(reader)?,
        smpte_format: read_u32_le(reader)?,
        smpte_offset: read_u32_le(reader)?,
        loop_count: read_u32_le(reader)?,
        sampler_data_bytes: read_u32_le(reader)?,
    };

    let expected = SMPL_HEADER_SIZE as u64 + SAMPLE_LOOP_SIZE as u64 * header.loop_count as u64;
    if expected != declared_size as u64 {
        return Err(WaveError::SizeMismatch {
            tag: SMPL,
            declared: declared_size,
            expected,
        });
    }

    // the count comes from the file; let a short stream fail before growing
    let reserve = (header.loop_count as usize).min(MAX_PREALLOCATED_LOOPS);
    let mut loops = Vec::with_capacity(reserve);
    for _ in 0..header.loop_count {
        loops.push(LoopRecord {
            identifier: read_u32_le(reader)?,
            loop_type: read_u32_le(reader)?,
            start_sample: read_u32_le(reader)?,
            end_sample: read_u32_le(reader)?,
            fraction: read_u32_le(reader)?,
            play_count: read_u32_le(reader)?,
        });
    }

    Ok(SamplerChunk { header, loops })
}
