use std::path::Path;

use decode_bridge::{OutputFormat, buffer::OutputView};
use jpeg_encoder::{ColorType, Encoder};

/// Copies the visible part of every row, dropping stride padding.
pub fn pack_rows(
    data: &[u8],
    width: usize,
    height: usize,
    stride: usize,
    bytes_per_pixel: usize,
) -> anyhow::Result<Vec<u8>> {
    let row_len = width * bytes_per_pixel;
    if stride < row_len || stride == 0 {
        anyhow::bail!("stride {} shorter than row of {} bytes", stride, row_len);
    }
    if height > 0 && data.len() < stride * (height - 1) + row_len {
        anyhow::bail!("frame data too short for {}x{}", width, height);
    }

    let mut packed = Vec::with_capacity(row_len * height);
    for row in data.chunks(stride).take(height) {
        packed.extend_from_slice(&row[..row_len]);
    }
    Ok(packed)
}

/// Writes a decoded frame as JPEG.
pub fn write_jpeg(
    path: &Path,
    view: &OutputView<'_>,
    format: OutputFormat,
    quality: u8,
) -> anyhow::Result<()> {
    let width = u16::try_from(view.width())?;
    let height = u16::try_from(view.height())?;
    let color = match format {
        // The x byte sits where alpha would; the encoder ignores alpha.
        OutputFormat::Bgrx | OutputFormat::Bgra => ColorType::Bgra,
        OutputFormat::Rgba => ColorType::Rgba,
    };
    let pixels = pack_rows(
        view.data(),
        view.width() as usize,
        view.height() as usize,
        view.stride(),
        format.bytes_per_pixel(),
    )?;
    let encoder = Encoder::new_file(path, quality)?;
    encoder.encode(&pixels, width, height, color)?;
    log::info!("snapshot written to {}", path.display());
    Ok(())
}
