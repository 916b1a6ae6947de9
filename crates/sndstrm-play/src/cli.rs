use std::path::PathBuf;

use clap::Parser;

use crate::config::PlaybackConfig;

#[derive(Parser, Debug)]
#[command(name = "sndstrm-play")]
#[command(
    about = "Stream a RIFF/WAVE file to the default audio output, honouring its sampler loop",
    long_about = None
)]
pub(crate) struct Args {
    /// Wave file to play. Prompted for on stdin when omitted.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Print format, chunk and loop details without playing
    #[arg(short, long)]
    pub info: bool,

    /// Print the parsed file as JSON (implies --info)
    #[arg(long)]
    pub json: bool,

    /// Playback buffer length in seconds of audio
    #[arg(long, value_name = "SECS")]
    pub buffer_secs: Option<f32>,

    /// Feeder refill interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_ms: Option<u64>,

    /// Output gain, 0.0 to 1.0
    #[arg(long)]
    pub volume: Option<f32>,
}

impl Args {
    pub fn apply_overrides(&self, config: &mut PlaybackConfig) {
        if let Some(secs) = self.buffer_secs {
            config.buffer_secs = secs;
        }
        if let Some(ms) = self.poll_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(volume) = self.volume {
            config.volume = volume;
        }
    }

    pub fn inspect_only(&self) -> bool {
        self.info || self.json
    }
}
