use std::sync::Arc;

use crate::pipeline::{DecodedSample, MappedFrame};

/// Decoded frames are never written to once queued.
struct SharedFrame(ffmpeg_next::frame::Video);

unsafe impl Send for SharedFrame {}
unsafe impl Sync for SharedFrame {}

impl std::ops::Deref for SharedFrame {
    type Target = ffmpeg_next::frame::Video;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A converted frame queued by the ffmpeg engine.
pub struct RawVideoFrame {
    frame: Arc<SharedFrame>,
}

impl RawVideoFrame {
    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn format(&self) -> ffmpeg_next::format::Pixel {
        self.frame.format()
    }

    pub fn pts(&self) -> Option<i64> {
        self.frame.pts()
    }
}

impl From<ffmpeg_next::frame::Video> for RawVideoFrame {
    fn from(frame: ffmpeg_next::frame::Video) -> Self {
        Self {
            frame: Arc::new(SharedFrame(frame)),
        }
    }
}

/// Read view of a [`RawVideoFrame`]'s first plane. Holds its own reference
/// to the frame, so it stays readable until unmapped even if the sample is
/// dropped first.
pub struct MappedVideoFrame {
    frame: Arc<SharedFrame>,
}

impl MappedFrame for MappedVideoFrame {
    fn data(&self) -> &[u8] {
        self.frame.data(0)
    }

    fn width(&self) -> u32 {
        self.frame.width()
    }

    fn height(&self) -> u32 {
        self.frame.height()
    }

    fn stride(&self) -> usize {
        self.frame.stride(0)
    }
}

impl DecodedSample for RawVideoFrame {
    type Mapped = MappedVideoFrame;

    fn map_read(&self) -> anyhow::Result<MappedVideoFrame> {
        if self.frame.planes() == 0 {
            anyhow::bail!("decoded frame has no data planes");
        }
        Ok(MappedVideoFrame {
            frame: self.frame.clone(),
        })
    }
}
