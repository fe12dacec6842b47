//! AVCC (length-prefixed, as stored in MP4/MKV) to Annex B (start codes)
//! conversion for H.264, so every frame handed to a decode session is self
//! contained.

use bytes::{Bytes, BytesMut};

/// Annex B start code (4-byte)
const START_CODE: &[u8] = &[0x00, 0x00, 0x00, 0x01];

/// Check if packet data is in Annex B format by looking at the start codes.
pub fn is_annexb_packet(data: &[u8]) -> bool {
    data.starts_with(&[0x00, 0x00, 0x00, 0x01]) || data.starts_with(&[0x00, 0x00, 0x01])
}

/// Converts `len_size`-byte length prefixed NAL units to Annex B.
/// Stops at the first truncated unit.
pub fn convert_avcc_to_annexb(avcc: &[u8], len_size: usize) -> Bytes {
    let mut out = BytesMut::with_capacity(avcc.len() + 16);
    let mut i = 0;
    while i + len_size <= avcc.len() {
        let len = avcc[i..i + len_size]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        i += len_size;
        if len == 0 || i + len > avcc.len() {
            break;
        }
        out.extend_from_slice(START_CODE);
        out.extend_from_slice(&avcc[i..i + len]);
        i += len;
    }
    out.freeze()
}

/// Rewrites H.264 access units from an MP4 style stream. Parameter sets from
/// the `avcC` record are put in front of every key frame since the decoder
/// is opened without extradata.
pub struct AvccToAnnexB {
    len_size: usize,
    parameter_sets: Bytes,
}

impl AvccToAnnexB {
    /// Returns None when `extradata` is not an `avcC` record (the stream is
    /// already Annex B).
    pub fn from_extradata(extradata: &[u8]) -> anyhow::Result<Option<Self>> {
        if extradata.is_empty() || is_annexb_packet(extradata) {
            return Ok(None);
        }
        // AVCC typically has configurationVersion = 1 as first byte
        if extradata[0] != 0x01 || extradata.len() < 7 {
            anyhow::bail!("unrecognized h264 extradata ({} bytes)", extradata.len());
        }

        let len_size = (extradata[4] & 0x03) as usize + 1;
        let mut out = BytesMut::new();
        let mut pos = 5;
        let sps_count = (extradata[pos] & 0x1f) as usize;
        pos += 1;
        pos = copy_parameter_sets(extradata, pos, sps_count, &mut out)?;
        let pps_count = *extradata
            .get(pos)
            .ok_or_else(|| anyhow::anyhow!("avcC truncated before pps count"))?
            as usize;
        copy_parameter_sets(extradata, pos + 1, pps_count, &mut out)?;

        Ok(Some(Self {
            len_size,
            parameter_sets: out.freeze(),
        }))
    }

    pub fn filter(&self, data: &[u8], is_key: bool) -> Bytes {
        if is_annexb_packet(data) {
            return Bytes::copy_from_slice(data);
        }
        let converted = convert_avcc_to_annexb(data, self.len_size);
        if !is_key || self.parameter_sets.is_empty() {
            return converted;
        }
        let mut out = BytesMut::with_capacity(self.parameter_sets.len() + converted.len());
        out.extend_from_slice(&self.parameter_sets);
        out.extend_from_slice(&converted);
        out.freeze()
    }
}

fn copy_parameter_sets(
    extradata: &[u8],
    mut pos: usize,
    count: usize,
    out: &mut BytesMut,
) -> anyhow::Result<usize> {
    for _ in 0..count {
        if pos + 2 > extradata.len() {
            anyhow::bail!("avcC truncated at offset {}", pos);
        }
        let len = u16::from_be_bytes([extradata[pos], extradata[pos + 1]]) as usize;
        pos += 2;
        if pos + len > extradata.len() {
            anyhow::bail!("avcC parameter set overruns record");
        }
        out.extend_from_slice(START_CODE);
        out.extend_from_slice(&extradata[pos..pos + len]);
        pos += len;
    }
    Ok(pos)
}
