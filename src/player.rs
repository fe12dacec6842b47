use std::{path::PathBuf, time::Instant};

use decode_bridge::{BridgeConfig, OutputFormat, Session};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{input::VideoInput, snapshot};

#[derive(Debug, Clone)]
pub struct PlayConfig {
    pub input: String,
    pub format: Option<OutputFormat>,
    pub decoder: Option<String>,
    pub max_frames: Option<u64>,
    pub snapshot: Option<PathBuf>,
    pub snapshot_frame: u64,
}

/// Summary of one playback run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Report {
    pub input: String,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub submitted: u64,
    pub decoded: u64,
    pub empty: u64,
    pub key_frames: u64,
    pub elapsed_ms: u64,
    pub cancelled: bool,
    pub snapshot: Option<PathBuf>,
}

/// Feeds every video frame of the input through one decode session, one
/// synchronous exchange per frame.
pub fn play(config: &PlayConfig, cancel: CancellationToken) -> anyhow::Result<Report> {
    let mut input = VideoInput::open(&config.input)?;
    let codec = input.codec();

    let mut bridge_config = BridgeConfig::from_env(codec);
    if let Some(format) = config.format {
        bridge_config = bridge_config.format(format);
    }
    if let Some(decoder) = &config.decoder {
        bridge_config = bridge_config.decoder(decoder.as_str().into());
    }
    let format = bridge_config.output_format();

    let mut session = Session::open(&bridge_config)?;
    let (width, height) = input.dimensions();
    let mut report = Report {
        input: config.input.clone(),
        codec: codec.to_string(),
        width,
        height,
        ..Default::default()
    };

    let start = Instant::now();
    while let Some(frame) = input.read_frame() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        if config.max_frames.is_some_and(|max| report.decoded >= max) {
            break;
        }

        report.submitted += 1;
        if frame.is_key {
            report.key_frames += 1;
        }
        let Some(view) = session.exchange(&frame.data)? else {
            log::trace!("frame {}: no output yet", report.submitted);
            continue;
        };

        report.decoded += 1;
        log::trace!(
            "frame {} (pts {:?}): {}x{} stride {}",
            report.submitted,
            frame.pts,
            view.width(),
            view.height(),
            view.stride()
        );

        if report.decoded == config.snapshot_frame {
            if let Some(path) = &config.snapshot {
                match snapshot::write_jpeg(path, &view, format, 90) {
                    Ok(()) => report.snapshot = Some(path.clone()),
                    Err(e) => log::warn!("snapshot failed: {:#}", e),
                }
            }
        }
    }

    let stats = session.close();
    report.empty = stats.empty;
    report.elapsed_ms = start.elapsed().as_millis() as u64;
    log::info!(
        "played {}: {} frames in, {} decoded, {} without output",
        report.input,
        report.submitted,
        report.decoded,
        report.empty
    );
    Ok(report)
}

#[cfg(test)]
#[path = "player_test.rs"]
mod player_test;
