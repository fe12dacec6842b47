use std::sync::{
    Arc, Condvar, Mutex, MutexGuard,
    atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;

use crate::{
    buffer::{InputBuffer, OutputSlot, OutputView},
    error::BridgeError,
    pipeline::{DecodePipeline, PipelineSink},
};

/// State shared between the caller's thread and the engine's callbacks.
#[derive(Debug)]
struct BridgeState {
    /// Armed while an exchange waits for the engine.
    wait: bool,
    /// Decoded frames the engine queued that nobody consumed yet.
    pending_outputs: u32,
}

/// Mutex + condition variable rendezvous the engine signals into.
pub struct Rendezvous {
    state: Mutex<BridgeState>,
    cond: Condvar,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState {
                wait: true,
                pending_outputs: 0,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The engine is done with the last buffer; `samples` new frames are
    /// available.
    fn signal(&self, samples: u32) {
        let mut state = self.lock();
        state.wait = false;
        state.pending_outputs += samples;
        self.cond.notify_one();
    }

    fn arm(&self) {
        self.lock().wait = true;
    }

    /// Blocks until the engine signals, re-arms for the next round and
    /// consumes at most one pending frame. Returns whether one was consumed.
    fn wait_and_take(&self) -> bool {
        let mut state = self.lock();
        while state.wait {
            state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        state.wait = true;
        if state.pending_outputs > 0 {
            state.pending_outputs -= 1;
            true
        } else {
            false
        }
    }

    pub fn pending_outputs(&self) -> u32 {
        self.lock().pending_outputs
    }
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineSink for Rendezvous {
    fn on_need_data(&self) {
        self.signal(0);
    }

    fn on_sample_ready(&self) {
        self.signal(1);
    }
}

/// Lets a synchronous caller drive an asynchronous decode engine, one
/// compressed frame per [`exchange`](HandoffBridge::exchange).
///
/// Not reentrant: the caller serializes all calls. Drains at most one
/// decoded frame per exchange; a surplus frame is handed out on the next
/// call. An engine that silently drops a buffer without raising either
/// callback blocks `exchange` forever, there is no timeout.
pub struct HandoffBridge<P: DecodePipeline> {
    pipeline: P,
    rendezvous: Arc<Rendezvous>,
    output: OutputSlot<P::Sample>,
    inputs_in_flight: Arc<AtomicUsize>,
    stopped: bool,
}

impl<P: DecodePipeline> HandoffBridge<P> {
    /// Registers the bridge with `pipeline` and starts it.
    pub fn start(mut pipeline: P) -> Result<Self, BridgeError> {
        let rendezvous = Arc::new(Rendezvous::new());
        pipeline.register(rendezvous.clone());
        if let Err(e) = pipeline.start() {
            log::debug!("unable to start the decode pipeline: {:#}", e);
            pipeline.stop();
            return Err(BridgeError::construction(e));
        }

        Ok(Self {
            pipeline,
            rendezvous,
            output: OutputSlot::new(),
            inputs_in_flight: Arc::new(AtomicUsize::new(0)),
            stopped: false,
        })
    }

    /// Submits one compressed frame and waits for the engine to react.
    ///
    /// Returns the decoded frame, if one is available, as a view that stays
    /// valid until the next call. A rejected frame or a failed pull yields
    /// `Ok(None)` without blocking on a signal that would never come.
    pub fn exchange(&mut self, frame: &Bytes) -> Result<Option<OutputView<'_>>, BridgeError> {
        if self.stopped {
            return Err(BridgeError::Stopped);
        }

        // Give the engine its output buffer back before anything else.
        self.output.release();

        // A need-data callback may have fired after the last frame went out;
        // re-arm so this round really waits for the new buffer. Arming must
        // precede the submit since the engine may call back right away.
        self.rendezvous.arm();

        if !self.submit(frame) {
            return Ok(None);
        }

        if !self.rendezvous.wait_and_take() {
            return Ok(None);
        }

        match self.pipeline.try_pull() {
            Some(sample) => {
                if !self.output.expose(sample) {
                    return Ok(None);
                }
            }
            None => {
                log::debug!("could not pull decoded sample");
                return Ok(None);
            }
        }

        Ok(self.output.view())
    }

    fn submit(&mut self, frame: &Bytes) -> bool {
        let buffer = match InputBuffer::wrap(frame) {
            Ok(buffer) => buffer,
            Err(e) => {
                log::debug!("{:#}", e);
                return false;
            }
        };
        let size = buffer.len();

        self.inputs_in_flight.fetch_add(1, Ordering::AcqRel);
        let in_flight = self.inputs_in_flight.clone();
        let buffer = buffer.on_release(move || {
            in_flight.fetch_sub(1, Ordering::AcqRel);
        });

        if let Err(e) = self.pipeline.submit(buffer) {
            log::debug!("unable to push frame of size {}: {:#}", size, e);
            return false;
        }
        true
    }

    /// The frame exposed by the last exchange, if any.
    pub fn current(&self) -> Option<OutputView<'_>> {
        self.output.view()
    }

    pub fn pending_outputs(&self) -> u32 {
        self.rendezvous.pending_outputs()
    }

    /// Input buffers the engine still holds a reference to.
    pub fn inputs_in_flight(&self) -> usize {
        self.inputs_in_flight.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Releases the exposed frame and stops the engine. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.output.release();
        self.pipeline.stop();
    }
}

impl<P: DecodePipeline> Drop for HandoffBridge<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod bridge_test;
