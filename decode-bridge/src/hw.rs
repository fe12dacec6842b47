//! Decoder discovery.
//!
//! Resolves the ffmpeg decoder for a session: a named override, a hardware
//! decoder (CUDA/QSV/V4L2M2M) when asked for one, or the software decoder.

use crate::config::{BridgeConfig, DecoderSelection, VideoCodec};

/// Try to find a hardware-accelerated decoder for the given codec.
/// Returns the first available hardware decoder, or None if none is found.
pub fn find_hw_decoder(codec: VideoCodec) -> Option<ffmpeg_next::Codec> {
    let hw_names: &[&str] = match codec {
        VideoCodec::H264 => &["h264_cuvid", "h264_qsv", "h264_v4l2m2m"],
        VideoCodec::Vp8 => &["vp8_cuvid", "vp8_qsv", "vp8_v4l2m2m"],
        VideoCodec::Mjpeg => &["mjpeg_cuvid", "mjpeg_qsv"],
    };

    for name in hw_names {
        if let Some(codec) = ffmpeg_next::decoder::find_by_name(name) {
            log::info!("found hardware decoder: {}", name);
            return Some(codec);
        }
    }
    None
}

pub fn find_sw_decoder(codec: VideoCodec) -> anyhow::Result<ffmpeg_next::Codec> {
    ffmpeg_next::decoder::find_by_name(codec.decoder_name())
        .or_else(|| ffmpeg_next::decoder::find(codec.codec_id()))
        .ok_or_else(|| anyhow::anyhow!("no software decoder for {}", codec))
}

/// Picks the decoder `config` asks for.
pub fn select_decoder(config: &BridgeConfig) -> anyhow::Result<ffmpeg_next::Codec> {
    match config.decoder_selection() {
        DecoderSelection::Software => find_sw_decoder(config.codec()),
        DecoderSelection::Auto => match find_hw_decoder(config.codec()) {
            Some(codec) => Ok(codec),
            None => {
                log::debug!("no hardware decoder for {}, using software", config.codec());
                find_sw_decoder(config.codec())
            }
        },
        DecoderSelection::Named(name) => {
            let codec = ffmpeg_next::decoder::find_by_name(name)
                .ok_or_else(|| anyhow::anyhow!("decoder {} not found", name))?;
            if !codec.is_decoder() || codec.medium() != ffmpeg_next::media::Type::Video {
                anyhow::bail!("{} is not a video decoder", name);
            }
            Ok(codec)
        }
    }
}
