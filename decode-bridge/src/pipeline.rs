//! Seams between the handoff bridge and a decode engine.
//!
//! An engine accepts compressed buffers through `submit`, works on its own
//! thread(s), and reports progress through the two [`PipelineSink`] hooks.
//! The bridge never looks inside the engine.

use std::sync::Arc;

use crate::buffer::InputBuffer;

/// Callback hooks an engine raises from its own thread context.
pub trait PipelineSink: Send + Sync {
    /// The engine consumed the last input and has nothing new to hand out.
    fn on_need_data(&self);

    /// The engine queued one decoded frame, ready for `try_pull`.
    fn on_sample_ready(&self);
}

/// A read-only mapping of a decoded frame's backing memory.
///
/// Dropping the value unmaps it.
pub trait MappedFrame: Send {
    fn data(&self) -> &[u8];
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Bytes per row, including padding.
    fn stride(&self) -> usize;
}

/// An opaque decoded sample owned by the engine until dropped.
pub trait DecodedSample: Send {
    type Mapped: MappedFrame;

    fn map_read(&self) -> anyhow::Result<Self::Mapped>;
}

/// An asynchronous, callback driven decode engine.
pub trait DecodePipeline: Send {
    type Sample: DecodedSample;

    /// Installs the hooks. Called once, before `start`.
    fn register(&mut self, sink: Arc<dyn PipelineSink>);

    fn start(&mut self) -> anyhow::Result<()>;

    /// Hands one compressed buffer to the engine. The engine drops the
    /// buffer once it no longer reads from it.
    fn submit(&mut self, buffer: InputBuffer) -> anyhow::Result<()>;

    /// Takes the oldest decoded sample, if any.
    fn try_pull(&mut self) -> Option<Self::Sample>;

    fn stop(&mut self);
}
