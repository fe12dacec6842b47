use std::fmt;

use bytes::Bytes;

use crate::pipeline::{DecodedSample, MappedFrame};

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A compressed frame handed to a decode engine.
///
/// Holds its own strong reference to the caller's storage, so the caller's
/// `Bytes` stays independently owned and valid whatever the engine does with
/// this one. The storage is never copied and only exposed read-only. The
/// release hook runs exactly once, when the engine drops the buffer.
pub struct InputBuffer {
    data: Bytes,
    release: Option<ReleaseHook>,
}

impl InputBuffer {
    pub fn wrap(frame: &Bytes) -> anyhow::Result<Self> {
        if frame.is_empty() {
            anyhow::bail!("got an empty frame buffer");
        }
        Ok(Self {
            data: frame.clone(),
            release: None,
        })
    }

    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for InputBuffer {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for InputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBuffer")
            .field("len", &self.data.len())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

/// Borrowed, read-only view of the frame currently held by an [`OutputSlot`].
/// Only valid until the next exchange.
#[derive(Debug, Clone, Copy)]
pub struct OutputView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> OutputView<'a> {
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// Holds at most one decoded sample together with its mapped view.
///
/// Both are released together, view first: unmap, then drop the sample.
pub struct OutputSlot<S: DecodedSample> {
    sample: Option<S>,
    mapped: Option<S::Mapped>,
}

impl<S: DecodedSample> OutputSlot<S> {
    pub fn new() -> Self {
        Self {
            sample: None,
            mapped: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample.is_none()
    }

    /// Takes ownership of `sample` and maps it for reading. Whatever the slot
    /// held before is released first. Returns false when the mapping failed;
    /// the sample is kept until the next release either way.
    pub fn expose(&mut self, sample: S) -> bool {
        self.release();
        match sample.map_read() {
            Ok(mapped) => self.mapped = Some(mapped),
            Err(e) => log::debug!("could not map decoded sample: {:#}", e),
        }
        self.sample = Some(sample);
        self.mapped.is_some()
    }

    pub fn view(&self) -> Option<OutputView<'_>> {
        self.mapped.as_ref().map(|m| OutputView {
            data: m.data(),
            width: m.width(),
            height: m.height(),
            stride: m.stride(),
        })
    }

    pub fn release(&mut self) {
        drop(self.mapped.take());
        drop(self.sample.take());
    }
}

impl<S: DecodedSample> Default for OutputSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DecodedSample> Drop for OutputSlot<S> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod buffer_test;
