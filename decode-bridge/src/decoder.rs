use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, mpsc},
    thread::JoinHandle,
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::{
    buffer::InputBuffer,
    config::BridgeConfig,
    frame::RawVideoFrame,
    hw,
    pipeline::{DecodePipeline, PipelineSink},
    scaler::Scaler,
};

/// An opened ffmpeg video decoder plus the conversion to the output layout.
pub struct Decoder {
    inner: ffmpeg_next::codec::decoder::Video,
    scaler: Scaler,
    name: String,
}

impl Decoder {
    pub fn new(config: &BridgeConfig) -> anyhow::Result<Self> {
        let codec = hw::select_decoder(config)?;
        let name = codec.name().to_string();
        let decoder_ctx = ffmpeg_next::codec::Context::new_with_codec(codec);
        let inner = decoder_ctx
            .decoder()
            .open_as(codec)
            .and_then(|opened| opened.video())
            .map_err(|e| anyhow::anyhow!("open decoder {}: {}", name, e))?;

        log::debug!(
            "decoder pipeline: {} ! {} ! {:?}",
            config.codec(),
            name,
            config.output_format().pixel()
        );

        Ok(Self {
            inner,
            scaler: Scaler::new(config.output_format().pixel()),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feeds one compressed frame. ffmpeg wants padded input, so the data is
    /// copied into a packet and the caller's buffer is free once this returns.
    pub fn send_packet(&mut self, data: &[u8]) -> anyhow::Result<()> {
        let packet = ffmpeg_next::codec::packet::Packet::copy(data);
        self.inner.send_packet(&packet)?;
        Ok(())
    }

    pub fn receive_frame(&mut self) -> anyhow::Result<Option<RawVideoFrame>> {
        let mut frame = ffmpeg_next::frame::Video::empty();
        match self.inner.receive_frame(&mut frame) {
            Ok(()) => Ok(Some(RawVideoFrame::from(self.scaler.run(&frame)?))),
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

unsafe impl Send for Decoder {}

type SampleQueue = Arc<Mutex<VecDeque<RawVideoFrame>>>;

/// Decode engine running an ffmpeg [`Decoder`] on its own worker thread.
///
/// Per submitted buffer the worker raises `SampleReady` once for every frame
/// it queued, or `NeedData` when the buffer produced nothing (including when
/// the decoder rejected it).
pub struct FfmpegPipeline {
    decoder: Option<Decoder>,
    cancel: CancellationToken,
    input_tx: Option<mpsc::Sender<InputBuffer>>,
    worker: Option<JoinHandle<()>>,
    samples: SampleQueue,
    sink: Option<Arc<dyn PipelineSink>>,
}

impl FfmpegPipeline {
    pub fn new(config: &BridgeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            decoder: Some(Decoder::new(config)?),
            cancel: CancellationToken::new(),
            input_tx: None,
            worker: None,
            samples: Arc::new(Mutex::new(VecDeque::new())),
            sink: None,
        })
    }

    fn decode_loop(
        mut decoder: Decoder,
        cancel: CancellationToken,
        input_rx: mpsc::Receiver<InputBuffer>,
        samples: SampleQueue,
        sink: Arc<dyn PipelineSink>,
    ) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let buffer = match input_rx.recv_timeout(Duration::from_millis(10)) {
                Ok(buffer) => buffer,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            };

            let sent = decoder.send_packet(buffer.data());
            drop(buffer);
            if let Err(e) = sent {
                log::debug!("{}: send packet error: {:#}", decoder.name(), e);
                sink.on_need_data();
                continue;
            }

            let mut produced = 0;
            loop {
                match decoder.receive_frame() {
                    Ok(Some(frame)) => {
                        samples
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .push_back(frame);
                        produced += 1;
                        sink.on_sample_ready();
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::debug!("{}: receive frame error: {:#}", decoder.name(), e);
                        break;
                    }
                }
            }
            if produced == 0 {
                sink.on_need_data();
            }
        }
        log::debug!("{}: decode worker finished", decoder.name());
    }
}

impl DecodePipeline for FfmpegPipeline {
    type Sample = RawVideoFrame;

    fn register(&mut self, sink: Arc<dyn PipelineSink>) {
        self.sink = Some(sink);
    }

    fn start(&mut self) -> anyhow::Result<()> {
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no callbacks registered"))?;
        let decoder = self
            .decoder
            .take()
            .ok_or_else(|| anyhow::anyhow!("pipeline already started"))?;

        let (input_tx, input_rx) = mpsc::channel();
        let cancel = self.cancel.clone();
        let samples = self.samples.clone();
        let worker = std::thread::Builder::new()
            .name(format!("decode-{}", decoder.name()))
            .spawn(move || Self::decode_loop(decoder, cancel, input_rx, samples, sink))
            .map_err(|e| anyhow::anyhow!("unable to start decode worker: {}", e))?;

        self.input_tx = Some(input_tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn submit(&mut self, buffer: InputBuffer) -> anyhow::Result<()> {
        let tx = self
            .input_tx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("pipeline is not running"))?;
        tx.send(buffer)
            .map_err(|_| anyhow::anyhow!("decode worker is gone"))
    }

    fn try_pull(&mut self) -> Option<RawVideoFrame> {
        self.samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        self.input_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("decode worker panicked");
            }
        }
        self.samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Drop for FfmpegPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "decoder_test.rs"]
mod decoder_test;
