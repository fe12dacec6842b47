use std::path::Path;

use bytes::Bytes;
use decode_bridge::VideoCodec;
use ffmpeg_next::codec::Parameters;

use crate::annexb::AvccToAnnexB;

/// One compressed video frame, as the transport layer hands it over.
#[derive(Debug, Clone)]
pub struct CompressedFrame {
    pub data: Bytes,
    pub pts: Option<i64>,
    pub is_key: bool,
}

/// Demuxes the first video stream of a file or URL into compressed frames.
pub struct VideoInput {
    inner: ffmpeg_next::format::context::Input,
    stream_index: usize,
    codec: VideoCodec,
    width: u32,
    height: u32,
    annexb: Option<AvccToAnnexB>,
}

/// Reads extradata from codec parameters via the raw AVCodecParameters pointer.
/// Returns None if extradata is null or empty.
fn get_extradata(codec_params: &Parameters) -> Option<&[u8]> {
    unsafe {
        let p = codec_params.as_ptr();
        let extradata_ptr = (*p).extradata;
        if extradata_ptr.is_null() {
            return None;
        }
        let size = (*p).extradata_size;
        if size <= 0 {
            return None;
        }
        Some(std::slice::from_raw_parts(extradata_ptr, size as usize))
    }
}

fn dimensions(codec_params: &Parameters) -> (u32, u32) {
    unsafe {
        let p = codec_params.as_ptr();
        ((*p).width.max(0) as u32, (*p).height.max(0) as u32)
    }
}

impl VideoInput {
    pub fn open(url: &str) -> anyhow::Result<Self> {
        let input = ffmpeg_next::format::input(Path::new(url))
            .map_err(|e| anyhow::anyhow!("open input {}: {}", url, e))?;

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("no video stream in {}", url))?;
        let parameters = stream.parameters();
        let codec = VideoCodec::from_codec_id(parameters.id()).ok_or_else(|| {
            anyhow::anyhow!("unsupported video codec {:?} in {}", parameters.id(), url)
        })?;

        let annexb = match (codec, get_extradata(&parameters)) {
            (VideoCodec::H264, Some(extradata)) => AvccToAnnexB::from_extradata(extradata)?,
            _ => None,
        };
        let (width, height) = dimensions(&parameters);
        let stream_index = stream.index();
        log::info!(
            "input {}: stream {} {} {}x{}{}",
            url,
            stream_index,
            codec,
            width,
            height,
            if annexb.is_some() { " (avcc)" } else { "" }
        );

        Ok(Self {
            inner: input,
            stream_index,
            codec,
            width,
            height,
            annexb,
        })
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Next frame of the selected stream, None at end of input.
    pub fn read_frame(&mut self) -> Option<CompressedFrame> {
        for (stream, packet) in self.inner.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            let Some(data) = packet.data() else {
                continue;
            };
            let data = match &self.annexb {
                Some(filter) => filter.filter(data, packet.is_key()),
                None => Bytes::copy_from_slice(data),
            };
            return Some(CompressedFrame {
                data,
                pts: packet.pts(),
                is_key: packet.is_key(),
            });
        }
        None
    }
}
