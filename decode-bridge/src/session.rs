use bytes::Bytes;

use crate::{
    bridge::HandoffBridge,
    buffer::OutputView,
    config::BridgeConfig,
    decoder::FfmpegPipeline,
    error::BridgeError,
    pipeline::DecodePipeline,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub exchanges: u64,
    pub frames: u64,
    pub empty: u64,
}

/// One decode session per video stream: built on stream start, torn down on
/// stream end. Dropping the session stops the engine and releases the last
/// exposed frame.
pub struct Session<P: DecodePipeline = FfmpegPipeline> {
    bridge: HandoffBridge<P>,
    stats: SessionStats,
}

impl Session<FfmpegPipeline> {
    /// Builds and starts an ffmpeg engine for `config`. Expects
    /// [`crate::init`] to have run.
    pub fn open(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let pipeline = FfmpegPipeline::new(config).map_err(|e| {
            log::warn!("decoder error for {}: {:#}", config.codec(), e);
            BridgeError::construction(e)
        })?;
        Self::with_pipeline(pipeline)
    }
}

impl<P: DecodePipeline> Session<P> {
    pub fn with_pipeline(pipeline: P) -> Result<Self, BridgeError> {
        Ok(Self {
            bridge: HandoffBridge::start(pipeline)?,
            stats: SessionStats::default(),
        })
    }

    /// See [`HandoffBridge::exchange`].
    pub fn exchange(&mut self, frame: &Bytes) -> Result<Option<OutputView<'_>>, BridgeError> {
        let out = self.bridge.exchange(frame)?;
        self.stats.exchanges += 1;
        match out {
            Some(_) => self.stats.frames += 1,
            None => self.stats.empty += 1,
        }
        Ok(out)
    }

    pub fn current(&self) -> Option<OutputView<'_>> {
        self.bridge.current()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn pending_outputs(&self) -> u32 {
        self.bridge.pending_outputs()
    }

    pub fn inputs_in_flight(&self) -> usize {
        self.bridge.inputs_in_flight()
    }

    pub fn close(mut self) -> SessionStats {
        self.bridge.stop();
        log::debug!(
            "decode session closed: {} exchanges, {} frames, {} empty",
            self.stats.exchanges,
            self.stats.frames,
            self.stats.empty
        );
        self.stats
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
