use ffmpeg_next::{
    format::Pixel,
    frame::Video,
    software::scaling::{Context, Flags},
};

/// Converts decoded frames to one packed output layout. The swscale context
/// is rebuilt whenever the source size or format changes mid-stream.
pub struct Scaler {
    context: Option<Context>,
    source: (Pixel, u32, u32),
    target: Pixel,
}

impl Scaler {
    pub fn new(target: Pixel) -> Self {
        Self {
            context: None,
            source: (Pixel::None, 0, 0),
            target,
        }
    }

    pub fn run(&mut self, frame: &Video) -> anyhow::Result<Video> {
        let source = (frame.format(), frame.width(), frame.height());
        if source.1 == 0 || source.2 == 0 || source.0 == Pixel::None {
            anyhow::bail!("invalid decoded frame {:?} {}x{}", source.0, source.1, source.2);
        }

        let context = match self.context.take() {
            Some(context) if self.source == source => context,
            _ => {
                log::debug!(
                    "scaler: {:?} {}x{} -> {:?}",
                    source.0,
                    source.1,
                    source.2,
                    self.target
                );
                Context::get(
                    source.0,
                    source.1,
                    source.2,
                    self.target,
                    source.1,
                    source.2,
                    Flags::BILINEAR,
                )?
            }
        };
        self.source = source;
        let context = self.context.insert(context);

        let mut converted = Video::empty();
        context.run(frame, &mut converted)?;
        converted.set_pts(frame.pts());
        Ok(converted)
    }
}

unsafe impl Send for Scaler {}
