//! sndstrm-core: RIFF/WAVE parsing for streamed playback

pub mod chunk;
mod error;
pub mod format;
pub mod sampler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod wave;

pub use chunk::{read_chunk_header, ChunkDescriptor, ChunkKind, ChunkTag};
pub use error::{Result, WaveError};
pub use format::{parse_format, PcmFormat};
pub use sampler::{
    parse_sampler_chunk, resolve_loop_range, LoopByteRange, LoopRecord, SamplerChunk,
    SamplerHeader,
};
pub use wave::{open_wave_file, parse_wave, DataExtent, WaveFileInfo};
