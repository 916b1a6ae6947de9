//! Error types for sndstrm

use thiserror::Error;

use crate::chunk::ChunkTag;

#[derive(Debug, Error)]
pub enum WaveError {
    #[error("Not a RIFF stream (found {0})")]
    NotRiff(ChunkTag),
    #[error("RIFF form type is {0}, expected \"WAVE\"")]
    NotWave(ChunkTag),
    #[error("{tag} chunk declares {declared} bytes but its layout needs {expected}")]
    SizeMismatch {
        tag: ChunkTag,
        declared: u32,
        expected: u64,
    },
    #[error("RIFF form declares {declared} bytes but its chunks cover {scanned}")]
    FormSizeMismatch { declared: u64, scanned: u64 },
    #[error("Missing {0} chunk")]
    MissingChunk(ChunkTag),
    #[error("Unusable sample layout: {channels} channels at {bits_per_sample} bits")]
    InvalidLayout { channels: u16, bits_per_sample: u16 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WaveError>;
