//! Little-endian integer PCM to f32 conversion

/// Integer sample layouts the output stream can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecoder {
    /// Unsigned, centred on 128
    U8,
    I16,
    I24,
    I32,
}

impl SampleDecoder {
    pub fn for_bits(bits_per_sample: u16) -> Option<Self> {
        match bits_per_sample {
            8 => Some(Self::U8),
            16 => Some(Self::I16),
            24 => Some(Self::I24),
            32 => Some(Self::I32),
            _ => None,
        }
    }

    /// Bytes per sample
    pub fn width(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I24 => 3,
            Self::I32 => 4,
        }
    }

    /// Decodes one sample. `bytes` must hold at least `width()` bytes.
    pub fn decode(&self, bytes: &[u8]) -> f32 {
        match self {
            Self::U8 => (bytes[0] as f32 - 128.0) / 128.0,
            Self::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32_768.0,
            Self::I24 => {
                // sign-extend through the top byte of an i32
                let val = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
                val as f32 / 8_388_608.0
            }
            Self::I32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
                    / 2_147_483_648.0
            }
        }
    }

    /// Decodes whole samples from `bytes` into `out`, scaled by `gain`.
    /// Returns the number of samples written.
    pub fn decode_into(&self, bytes: &[u8], out: &mut [f32], gain: f32) -> usize {
        let mut written = 0;
        for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(self.width())) {
            *dst = self.decode(src) * gain;
            written += 1;
        }
        written
    }
}
