//! Scripted decode engine for tests. Reacts to every submitted buffer from a
//! separate thread, the way a real engine calls back from its worker.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    buffer::InputBuffer,
    pipeline::{DecodePipeline, DecodedSample, MappedFrame, PipelineSink},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Reaction {
    /// Queue `n` frames, then raise `SampleReady` `n` times.
    Samples(u32),
    /// Raise `NeedData` only.
    NeedData,
    /// Refuse the buffer in `submit`.
    Reject,
    /// Raise `SampleReady` without queueing anything.
    Phantom,
    /// Queue one frame that cannot be mapped.
    Unmappable,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Submitted(usize),
    Unmapped(u32),
    Released(u32),
    Started,
    Stopped,
}

pub(crate) type EventLog = Arc<Mutex<Vec<Event>>>;

/// Engine internals the test keeps a handle on.
#[derive(Default)]
pub(crate) struct Probe {
    queue: Mutex<VecDeque<MockSample>>,
    events: EventLog,
    held: Mutex<Vec<InputBuffer>>,
    next_id: Mutex<u32>,
}

impl Probe {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Lets go of every input buffer the engine kept back.
    pub(crate) fn drop_held(&self) {
        self.held.lock().unwrap().clear();
    }

    fn push_event(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn enqueue(&self, mappable: bool) {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        self.queue.lock().unwrap().push_back(MockSample {
            id,
            mappable,
            events: self.events.clone(),
        });
    }
}

pub(crate) struct MockSample {
    id: u32,
    mappable: bool,
    events: EventLog,
}

pub(crate) struct MockMapped {
    id: u32,
    data: Vec<u8>,
    events: EventLog,
}

impl MappedFrame for MockMapped {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn width(&self) -> u32 {
        4
    }

    fn height(&self) -> u32 {
        1
    }

    fn stride(&self) -> usize {
        16
    }
}

impl Drop for MockMapped {
    fn drop(&mut self) {
        self.events.lock().unwrap().push(Event::Unmapped(self.id));
    }
}

impl DecodedSample for MockSample {
    type Mapped = MockMapped;

    fn map_read(&self) -> anyhow::Result<MockMapped> {
        if !self.mappable {
            anyhow::bail!("sample {} is not mappable", self.id);
        }
        Ok(MockMapped {
            id: self.id,
            data: format!("frame-{}", self.id).into_bytes(),
            events: self.events.clone(),
        })
    }
}

impl Drop for MockSample {
    fn drop(&mut self) {
        self.events.lock().unwrap().push(Event::Released(self.id));
    }
}

pub(crate) struct MockPipeline {
    script: VecDeque<Reaction>,
    fallback: Reaction,
    delay: Duration,
    hold_inputs: bool,
    fail_start: bool,
    probe: Arc<Probe>,
    sink: Option<Arc<dyn PipelineSink>>,
    workers: Vec<JoinHandle<()>>,
    submitted: usize,
}

impl MockPipeline {
    pub(crate) fn new(script: impl IntoIterator<Item = Reaction>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: Reaction::Samples(1),
            delay: Duration::from_millis(20),
            hold_inputs: false,
            fail_start: false,
            probe: Arc::new(Probe::default()),
            sink: None,
            workers: Vec::new(),
            submitted: 0,
        }
    }

    /// Reaction once the script runs out.
    pub(crate) fn fallback(mut self, reaction: Reaction) -> Self {
        self.fallback = reaction;
        self
    }

    /// Keep submitted buffers until [`Probe::drop_held`].
    pub(crate) fn hold_inputs(mut self) -> Self {
        self.hold_inputs = true;
        self
    }

    pub(crate) fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub(crate) fn probe(&self) -> Arc<Probe> {
        self.probe.clone()
    }

    fn join_workers(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl DecodePipeline for MockPipeline {
    type Sample = MockSample;

    fn register(&mut self, sink: Arc<dyn PipelineSink>) {
        self.sink = Some(sink);
    }

    fn start(&mut self) -> anyhow::Result<()> {
        if self.fail_start {
            anyhow::bail!("refusing to reach the running state");
        }
        self.probe.push_event(Event::Started);
        Ok(())
    }

    fn submit(&mut self, buffer: InputBuffer) -> anyhow::Result<()> {
        let reaction = self.script.pop_front().unwrap_or(self.fallback);
        self.submitted += 1;
        self.probe.push_event(Event::Submitted(self.submitted));
        if reaction == Reaction::Reject {
            anyhow::bail!("buffer rejected");
        }

        let sink = self
            .sink
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no sink registered"))?;
        let probe = self.probe.clone();
        let delay = self.delay;
        let hold = self.hold_inputs;
        self.workers.push(thread::spawn(move || {
            thread::sleep(delay);
            if hold {
                probe.held.lock().unwrap().push(buffer);
            } else {
                drop(buffer);
            }
            match reaction {
                Reaction::Samples(n) => {
                    for _ in 0..n {
                        probe.enqueue(true);
                    }
                    for _ in 0..n {
                        sink.on_sample_ready();
                    }
                }
                Reaction::Unmappable => {
                    probe.enqueue(false);
                    sink.on_sample_ready();
                }
                Reaction::Phantom => sink.on_sample_ready(),
                Reaction::NeedData | Reaction::Reject => sink.on_need_data(),
            }
        }));
        Ok(())
    }

    fn try_pull(&mut self) -> Option<MockSample> {
        self.probe.queue.lock().unwrap().pop_front()
    }

    fn stop(&mut self) {
        self.join_workers();
        self.probe.queue.lock().unwrap().clear();
        self.probe.push_event(Event::Stopped);
    }
}

impl Drop for MockPipeline {
    fn drop(&mut self) {
        self.join_workers();
    }
}
