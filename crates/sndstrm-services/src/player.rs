//! Playback session: one wave file, one buffer, one feeder thread, one sink

use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use sndstrm_core::{PcmFormat, WaveFileInfo};
use thiserror::Error;
use tracing::info;

use crate::audio_io::{AudioOutputError, PcmOutputStream};
use crate::feeder::{
    FeedError, FeedOutcome, FeederHandle, StreamingBufferFeeder, DEFAULT_POLL_INTERVAL,
};
use crate::playback_buffer::{ByteSink, PlaybackBuffer};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Output(#[from] AudioOutputError),
    #[error("Failed to spawn feeder thread: {0}")]
    Spawn(std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    pub buffer_secs: f32,
    pub poll_interval: Duration,
    pub volume: f32,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            buffer_secs: 5.0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            volume: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Feeder still running
    Playing,
    /// Feeder reached the end; the sink is playing out what is buffered
    Draining,
    /// Everything delivered has been played
    Done,
    /// Feeder stopped on an error; `stop` returns it
    Failed,
}

/// Tracks a running feeder and the buffer it fills.
pub struct FeedMonitor {
    buffer: Arc<PlaybackBuffer>,
    frame_bytes: usize,
    feeder: FeederHandle,
    result: Option<Result<FeedOutcome, FeedError>>,
}

impl FeedMonitor {
    pub fn new(feeder: FeederHandle, buffer: Arc<PlaybackBuffer>, format: &PcmFormat) -> Self {
        Self {
            buffer,
            frame_bytes: format.bytes_per_frame().max(1) as usize,
            feeder,
            result: None,
        }
    }

    pub fn poll(&mut self) -> PlaybackStatus {
        if self.result.is_none() {
            self.result = self.feeder.try_join();
        }

        match &self.result {
            None => PlaybackStatus::Playing,
            Some(Err(_)) => PlaybackStatus::Failed,
            Some(Ok(_)) if self.is_drained() => PlaybackStatus::Done,
            Some(Ok(_)) => PlaybackStatus::Draining,
        }
    }

    /// Less than one frame left to play.
    pub fn is_drained(&self) -> bool {
        self.buffer.buffered_bytes() < self.frame_bytes
    }

    /// Cancels the feeder if it is still running and returns how it ended.
    pub fn finish(self) -> Result<FeedOutcome, FeedError> {
        match self.result {
            Some(result) => result,
            None => {
                self.feeder.cancel();
                self.feeder.join()
            }
        }
    }
}

pub struct Player {
    monitor: FeedMonitor,
    output: PcmOutputStream,
}

impl Player {
    /// Opens the output device at the file's format and starts feeding it.
    /// `file` is the handle the info was parsed from.
    pub fn start(
        file: File,
        info: &WaveFileInfo,
        options: &PlaybackOptions,
    ) -> Result<Self, PlayerError> {
        let format = *info.format();
        let buffer = Arc::new(PlaybackBuffer::for_duration(&format, options.buffer_secs));
        info!(capacity = buffer.capacity(), "Allocated playback buffer");

        let feeder = StreamingBufferFeeder::new(file, buffer.clone(), info)?
            .with_poll_interval(options.poll_interval);
        let output = PcmOutputStream::start(&format, buffer.clone(), options.volume)?;
        let feeder = FeederHandle::spawn(feeder).map_err(PlayerError::Spawn)?;

        Ok(Self {
            monitor: FeedMonitor::new(feeder, buffer, &format),
            output,
        })
    }

    pub fn poll(&mut self) -> PlaybackStatus {
        self.monitor.poll()
    }

    pub fn is_drained(&self) -> bool {
        self.monitor.is_drained()
    }

    /// Silences output, cancels the feeder if it is still running and waits
    /// for it to exit.
    pub fn stop(self) -> Result<FeedOutcome, PlayerError> {
        self.output.stop();
        let outcome = self.monitor.finish()?;
        info!(delivered = outcome.delivered(), "Playback stopped");
        Ok(outcome)
    }
}
