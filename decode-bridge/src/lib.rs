//! Drives an asynchronous, callback based video decode engine from a
//! synchronous caller: one compressed frame in, at most one decoded frame out,
//! per [`Session::exchange`](session::Session::exchange).

/// Registers FFmpeg components. Call once at startup, before opening
/// sessions; sessions never tear the library down.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod hw;
pub mod pipeline;
pub mod scaler;
pub mod session;

#[cfg(test)]
mod mock;

pub use bytes::Bytes;
pub use config::{BridgeConfig, DecoderSelection, OutputFormat, VideoCodec};
pub use error::BridgeError;
pub use session::{Session, SessionStats};
