//! In-memory RIFF/WAVE builder for tests.

use crate::format::PcmFormat;
use crate::sampler::LoopRecord;

struct RawChunk {
    tag: [u8; 4],
    declared: u32,
    payload: Vec<u8>,
}

/// Assembles a RIFF/WAVE byte stream chunk by chunk. Declared sizes default to
/// the payload length and the form size to the sum of the chunks, but each can
/// be overridden to craft malformed input. No pad bytes are ever inserted.
pub struct WaveBuilder {
    riff_tag: [u8; 4],
    form_type: [u8; 4],
    form_size: Option<u32>,
    chunks: Vec<RawChunk>,
}

impl Default for WaveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveBuilder {
    pub fn new() -> Self {
        Self {
            riff_tag: *b"RIFF",
            form_type: *b"WAVE",
            form_size: None,
            chunks: Vec::new(),
        }
    }

    pub fn riff_tag(mut self, tag: &[u8; 4]) -> Self {
        self.riff_tag = *tag;
        self
    }

    pub fn form_type(mut self, tag: &[u8; 4]) -> Self {
        self.form_type = *tag;
        self
    }

    pub fn form_size(mut self, size: u32) -> Self {
        self.form_size = Some(size);
        self
    }

    pub fn chunk(self, tag: &[u8; 4], payload: &[u8]) -> Self {
        let declared = payload.len() as u32;
        self.chunk_with_size(tag, declared, payload)
    }

    pub fn chunk_with_size(mut self, tag: &[u8; 4], declared: u32, payload: &[u8]) -> Self {
        self.chunks.push(RawChunk {
            tag: *tag,
            declared,
            payload: payload.to_vec(),
        });
        self
    }

    pub fn fmt(self, format: &PcmFormat) -> Self {
        self.chunk(b"fmt ", &format.to_bytes())
    }

    pub fn data(self, payload: &[u8]) -> Self {
        self.chunk(b"data", payload)
    }

    /// `smpl` chunk with one record per `(start_sample, end_sample)` pair.
    pub fn smpl(self, loops: &[(u32, u32)]) -> Self {
        let records: Vec<LoopRecord> = loops
            .iter()
            .enumerate()
            .map(|(i, &(start_sample, end_sample))| LoopRecord {
                identifier: i as u32,
                start_sample,
                end_sample,
                ..Default::default()
            })
            .collect();
        self.smpl_records(&records)
    }

    pub fn smpl_records(self, loops: &[LoopRecord]) -> Self {
        let mut payload = Vec::with_capacity(36 + 24 * loops.len());
        for field in [0, 0, 0, 60, 0, 0, 0, loops.len() as u32, 0] {
            payload.extend_from_slice(&u32::to_le_bytes(field));
        }
        for record in loops {
            for field in [
                record.identifier,
                record.loop_type,
                record.start_sample,
                record.end_sample,
                record.fraction,
                record.play_count,
            ] {
                payload.extend_from_slice(&field.to_le_bytes());
            }
        }
        self.chunk(b"smpl", &payload)
    }

    pub fn build(&self) -> Vec<u8> {
        let body: usize = self.chunks.iter().map(|c| 8 + c.payload.len()).sum();
        let form_size = self.form_size.unwrap_or(4 + body as u32);

        let mut bytes = Vec::with_capacity(12 + body);
        bytes.extend_from_slice(&self.riff_tag);
        bytes.extend_from_slice(&form_size.to_le_bytes());
        bytes.extend_from_slice(&self.form_type);
        for chunk in &self.chunks {
            bytes.extend_from_slice(&chunk.tag);
            bytes.extend_from_slice(&chunk.declared.to_le_bytes());
            bytes.extend_from_slice(&chunk.payload);
        }
        bytes
    }
}

/// `fmt ` followed by `data`, nothing else.
pub fn pcm_wave(format: &PcmFormat, data: &[u8]) -> Vec<u8> {
    WaveBuilder::new().fmt(format).data(data).build()
}
