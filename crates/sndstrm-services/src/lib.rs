//! sndstrm-services: playback buffer, streaming feeder and audio output

pub mod audio_io;
pub mod feeder;
pub mod pcm;
pub mod playback_buffer;
pub mod player;

pub use audio_io::{AudioOutputError, BufferRenderer, PcmOutputStream};
pub use feeder::{
    cancel_pair, CancelHandle, CancelToken, FeedError, FeedOutcome, FeederHandle,
    StreamingBufferFeeder, DEFAULT_POLL_INTERVAL,
};
pub use pcm::SampleDecoder;
pub use playback_buffer::{ByteSink, PlaybackBuffer, PlaybackBufferError, MAX_BUFFER_SECS};
pub use player::{FeedMonitor, PlaybackOptions, PlaybackStatus, Player, PlayerError};
