use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb};

use crate::camera::error::{CameraError, Result};
use crate::camera::types::NegotiatedFormat;

/// Convert an NV21 frame (Y plane, then interleaved V/U at quarter
/// resolution) to packed RGB24, writing into `rgb`.
///
/// `rgb` is resized to `width * height * 3` and reused across calls.
pub fn convert_nv21_to_rgb(
    nv21: &[u8],
    width: usize,
    height: usize,
    rgb: &mut Vec<u8>,
) -> Result<()> {
    let chroma_stride = width.div_ceil(2) * 2;
    let expected = width * height + chroma_stride * height.div_ceil(2);
    if width == 0 || height == 0 {
        return Err(CameraError::Encode("frame has zero size".to_string()));
    }
    if nv21.len() < expected {
        return Err(CameraError::Encode(format!(
            "NV21 buffer is {} bytes, {width}x{height} needs {expected}",
            nv21.len()
        )));
    }

    let (y_plane, vu_plane) = nv21.split_at(width * height);
    rgb.resize(width * height * 3, 0);

    for row in 0..height {
        for col in 0..width {
            let y = y_plane[row * width + col] as i32;
            let vu_index = (row / 2) * chroma_stride + (col / 2) * 2;
            let v = vu_plane[vu_index] as i32 - 128;
            let u = vu_plane[vu_index + 1] as i32 - 128;

            let base = (row * width + col) * 3;
            rgb[base] = ((y * 256 + 359 * v) >> 8).clamp(0, 255) as u8;
            rgb[base + 1] = ((y * 256 - 88 * u - 183 * v) >> 8).clamp(0, 255) as u8;
            rgb[base + 2] = ((y * 256 + 454 * u) >> 8).clamp(0, 255) as u8;
        }
    }

    Ok(())
}

/// Compress raw RGB pixel data to JPEG at the given quality (1-100).
pub fn compress_jpeg(data: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let img: ImageBuffer<Rgb<u8>, _> = ImageBuffer::from_raw(width, height, data)
        .ok_or_else(|| CameraError::Encode("invalid buffer dimensions".to_string()))?;

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    img.write_with_encoder(encoder)
        .map_err(|e| CameraError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(buf)
}

/// Base64 with the standard alphabet and no line wrapping.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Turns NV21 frames of one negotiated format into base64 JPEG payloads.
///
/// Holds the RGB scratch buffer so steady-state encoding does not allocate
/// for colour conversion.
pub struct FrameEncoder {
    format: NegotiatedFormat,
    quality: u8,
    scratch: Vec<u8>,
}

impl FrameEncoder {
    pub fn new(format: NegotiatedFormat, quality: u8) -> Self {
        let scratch = Vec::with_capacity(format.width as usize * format.height as usize * 3);
        Self {
            format,
            quality,
            scratch,
        }
    }

    /// Encode one frame covering the full negotiated region.
    pub fn encode(&mut self, nv21: &[u8]) -> Result<String> {
        let NegotiatedFormat { width, height, .. } = self.format;
        convert_nv21_to_rgb(nv21, width as usize, height as usize, &mut self.scratch)?;
        let jpeg = compress_jpeg(&self.scratch, width, height, self.quality)?;
        Ok(encode_base64(&jpeg))
    }
}
