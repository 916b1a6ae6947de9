//! sndstrm-play: stream a looping wave file to the default output device

mod cli;
mod config;
mod report;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use sndstrm_core::open_wave_file;
use sndstrm_services::{PlaybackStatus, Player};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Args;

/// How often the main thread checks on the feeder between key presses.
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("sndstrm_core=info".parse()?)
                .add_directive("sndstrm_services=info".parse()?)
                .add_directive("sndstrm_play=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut playback = config::load_config().playback;
    args.apply_overrides(&mut playback);
    let options = playback.to_options();

    let path = match &args.file {
        Some(path) => path.clone(),
        None => prompt_for_path()?,
    };
    if !path.is_file() {
        bail!("File not found: {}", path.display());
    }

    let (file, wave) = open_wave_file(&path)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if args.inspect_only() {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&wave)?);
        } else {
            report::write_details(&mut io::stdout().lock(), &wave)?;
        }
        return Ok(());
    }

    println!("{wave}");
    info!(path = %path.display(), ?options, "Starting playback");

    let mut player = Player::start(file, &wave, &options)?;
    println!("Press Enter to exit.");
    let enter = spawn_stdin_watch();

    loop {
        match enter.recv_timeout(SUPERVISE_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        match player.poll() {
            PlaybackStatus::Playing | PlaybackStatus::Draining => {}
            PlaybackStatus::Done => {
                info!("Reached end of file");
                break;
            }
            PlaybackStatus::Failed => {
                error!("Feeder stopped with an error");
                break;
            }
        }
    }

    let outcome = player.stop().context("Playback failed")?;
    info!(delivered = outcome.delivered(), "Exiting");
    Ok(())
}

fn prompt_for_path() -> anyhow::Result<PathBuf> {
    println!("input wave file..");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let trimmed = line.trim().trim_matches('"');
    if trimmed.is_empty() {
        bail!("No file given");
    }
    Ok(PathBuf::from(trimmed))
}

/// Fires once when a line (or EOF) arrives on stdin.
fn spawn_stdin_watch() -> Receiver<()> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        let _ = tx.send(());
    });
    rx
}
