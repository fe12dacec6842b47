use std::{fmt, str::FromStr};

use ffmpeg_next::format::Pixel;

/// Overrides decoder selection: `auto` prefers hardware decoders, any other
/// value names an ffmpeg decoder to use as is.
pub const DECODER_ENV: &str = "DECODE_BRIDGE_DECODER";
/// Overrides the output pixel layout (`bgrx`, `bgra`, `rgba`).
pub const FORMAT_ENV: &str = "DECODE_BRIDGE_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    Mjpeg,
    Vp8,
    H264,
}

impl VideoCodec {
    /// Name of ffmpeg's software decoder for the codec.
    pub fn decoder_name(&self) -> &'static str {
        match self {
            VideoCodec::Mjpeg => "mjpeg",
            VideoCodec::Vp8 => "vp8",
            VideoCodec::H264 => "h264",
        }
    }

    pub fn codec_id(&self) -> ffmpeg_next::codec::Id {
        match self {
            VideoCodec::Mjpeg => ffmpeg_next::codec::Id::MJPEG,
            VideoCodec::Vp8 => ffmpeg_next::codec::Id::VP8,
            VideoCodec::H264 => ffmpeg_next::codec::Id::H264,
        }
    }

    pub fn from_codec_id(id: ffmpeg_next::codec::Id) -> Option<Self> {
        match id {
            ffmpeg_next::codec::Id::MJPEG => Some(VideoCodec::Mjpeg),
            ffmpeg_next::codec::Id::VP8 => Some(VideoCodec::Vp8),
            ffmpeg_next::codec::Id::H264 => Some(VideoCodec::H264),
            _ => None,
        }
    }
}

impl FromStr for VideoCodec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mjpeg" | "jpeg" => Ok(VideoCodec::Mjpeg),
            "vp8" => Ok(VideoCodec::Vp8),
            "h264" | "avc" => Ok(VideoCodec::H264),
            other => Err(anyhow::anyhow!("unknown codec type {}", other)),
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.decoder_name())
    }
}

/// Packed 32-bit layouts decoded frames are converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Bgrx,
    Bgra,
    Rgba,
}

impl OutputFormat {
    pub fn pixel(&self) -> Pixel {
        match self {
            OutputFormat::Bgrx => Pixel::BGRZ,
            OutputFormat::Bgra => Pixel::BGRA,
            OutputFormat::Rgba => Pixel::RGBA,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        4
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bgrx" | "bgr0" => Ok(OutputFormat::Bgrx),
            "bgra" => Ok(OutputFormat::Bgra),
            "rgba" => Ok(OutputFormat::Rgba),
            other => Err(anyhow::anyhow!("unsupported output format {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DecoderSelection {
    /// The codec's software decoder.
    #[default]
    Software,
    /// Hardware decoder when one is available, software otherwise.
    Auto,
    /// A specific ffmpeg decoder.
    Named(String),
}

impl From<&str> for DecoderSelection {
    fn from(value: &str) -> Self {
        match value {
            "" | "software" => DecoderSelection::Software,
            "auto" => DecoderSelection::Auto,
            name => DecoderSelection::Named(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    codec: VideoCodec,
    format: OutputFormat,
    decoder: DecoderSelection,
}

impl BridgeConfig {
    pub fn new(codec: VideoCodec) -> Self {
        Self {
            codec,
            format: OutputFormat::default(),
            decoder: DecoderSelection::default(),
        }
    }

    /// Defaults for `codec`, then [`DECODER_ENV`] and [`FORMAT_ENV`] on top.
    pub fn from_env(codec: VideoCodec) -> Self {
        let mut config = Self::new(codec);
        if let Ok(decoder) = std::env::var(DECODER_ENV) {
            config.decoder = DecoderSelection::from(decoder.trim());
        }
        if let Ok(format) = std::env::var(FORMAT_ENV) {
            match format.parse() {
                Ok(format) => config.format = format,
                Err(e) => log::warn!("ignoring {}: {:#}", FORMAT_ENV, e),
            }
        }
        config
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn decoder(mut self, decoder: DecoderSelection) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    pub fn output_format(&self) -> OutputFormat {
        self.format
    }

    pub fn decoder_selection(&self) -> &DecoderSelection {
        &self.decoder
    }
}
