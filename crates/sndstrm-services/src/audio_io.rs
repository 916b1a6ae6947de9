//! Audio output sink that drains the playback buffer into a cpal stream

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use sndstrm_core::PcmFormat;
use thiserror::Error;
use tracing::{error, info};

use crate::pcm::SampleDecoder;
use crate::playback_buffer::PlaybackBuffer;

#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("No audio output devices found")]
    NoDevices,
    #[error("Failed to query output configs: {0}")]
    ConfigError(String),
    #[error("Unsupported sample width: {0} bits")]
    UnsupportedBitDepth(u16),
    #[error("Output device cannot play {channels} channels at {sample_rate} Hz")]
    UnsupportedConfig { channels: u16, sample_rate: u32 },
    #[error("Failed to build output stream: {0}")]
    StreamError(String),
}

/// Pulls whole frames from the buffer and renders them as f32. Anything the
/// buffer cannot supply is rendered as silence.
pub struct BufferRenderer {
    buffer: Arc<PlaybackBuffer>,
    decoder: SampleDecoder,
    frame_bytes: usize,
    volume: f32,
    scratch: Vec<u8>,
}

impl BufferRenderer {
    pub fn new(
        buffer: Arc<PlaybackBuffer>,
        format: &PcmFormat,
        volume: f32,
    ) -> Result<Self, AudioOutputError> {
        let decoder = SampleDecoder::for_bits(format.bits_per_sample)
            .ok_or(AudioOutputError::UnsupportedBitDepth(format.bits_per_sample))?;
        Ok(Self {
            buffer,
            decoder,
            frame_bytes: decoder.width() * format.channels.max(1) as usize,
            volume: volume.clamp(0.0, 1.0),
            scratch: Vec::new(),
        })
    }

    /// Fills `out` (interleaved samples) and returns how many came from the
    /// buffer.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        let wanted = out.len() * self.decoder.width();
        self.scratch.resize(wanted, 0);
        let got = self.buffer.read_aligned(&mut self.scratch[..wanted], self.frame_bytes);
        let written = self
            .decoder
            .decode_into(&self.scratch[..got], out, self.volume);
        out[written..].fill(0.0);
        written
    }
}

/// Device stream at the file's native rate and channel count.
pub struct PcmOutputStream {
    stop_flag: Arc<AtomicBool>,
    _stream: cpal::Stream,
}

impl PcmOutputStream {
    pub fn start(
        format: &PcmFormat,
        buffer: Arc<PlaybackBuffer>,
        volume: f32,
    ) -> Result<Self, AudioOutputError> {
        let mut renderer = BufferRenderer::new(buffer, format, volume)?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioOutputError::NoDevices)?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| AudioOutputError::ConfigError(e.to_string()))?
            .any(|range| {
                range.channels() == format.channels
                    && range.sample_format() == SampleFormat::F32
                    && range.min_sample_rate().0 <= format.sample_rate
                    && format.sample_rate <= range.max_sample_rate().0
            });
        if !supported {
            return Err(AudioOutputError::UnsupportedConfig {
                channels: format.channels,
                sample_rate: format.sample_rate,
            });
        }

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if stop_clone.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }
                    renderer.render(data);
                },
                move |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;

        stream.play().map_err(|e| AudioOutputError::StreamError(e.to_string()))?;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            bits = format.bits_per_sample,
            "Started output stream"
        );

        Ok(Self { stop_flag, _stream: stream })
    }

    /// Silences the stream; the device is released on drop.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

impl Drop for PcmOutputStream {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}
