use std::path::PathBuf;

use clap::Parser;
use decode_bridge::OutputFormat;
use tokio_util::sync::CancellationToken;

mod annexb;
mod input;
mod player;
mod snapshot;

/// Decodes the video stream of a file or URL frame by frame through a
/// synchronous decode session.
#[derive(Debug, Parser)]
#[command(name = "display-stream", version)]
struct Args {
    /// Input file or URL
    input: String,

    /// Output pixel layout: bgrx, bgra or rgba
    #[arg(long, value_parser = parse_format)]
    format: Option<OutputFormat>,

    /// Decoder override: auto, software or an ffmpeg decoder name
    #[arg(long, env = decode_bridge::config::DECODER_ENV)]
    decoder: Option<String>,

    /// Stop after this many decoded frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Write one decoded frame to this JPEG file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Which decoded frame (1-based) to write with --snapshot
    #[arg(long, default_value_t = 1)]
    snapshot_frame: u64,

    /// Print the playback report as JSON
    #[arg(long)]
    json: bool,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("ffmpeg_next", log::LevelFilter::Warn)
        .filter_module("decode_bridge", log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    decode_bridge::init()?;

    let config = player::PlayConfig {
        input: args.input,
        format: args.format,
        decoder: args.decoder,
        max_frames: args.max_frames,
        snapshot: args.snapshot,
        snapshot_frame: args.snapshot_frame,
    };

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let mut handle = tokio::task::spawn_blocking(move || player::play(&config, cancel_clone));

    let report = tokio::select! {
        res = &mut handle => res??,
        _ = tokio::signal::ctrl_c() => {
            log::info!("ctrl+c received");
            cancel.cancel();
            handle.await??
        },
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
