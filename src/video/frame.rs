//! Conversions between the codec's packed BGR24 frames and RGB images.

use image::RgbImage;

use crate::error::{Error, Result};

/// Bytes in one packed 3-channel frame.
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Packed BGR24 samples (the decoder's native order) to an RGB image.
pub fn bgr_to_rgb(mut bgr: Vec<u8>, width: u32, height: u32) -> Result<RgbImage> {
    if bgr.len() != frame_len(width, height) {
        return Err(Error::ShapeMismatch {
            expected: format!("{} bytes for {}x{} BGR24", frame_len(width, height), width, height),
            actual: format!("{} bytes", bgr.len()),
        });
    }
    for pixel in bgr.chunks_exact_mut(3) {
        pixel.swap(0, 2);
    }
    RgbImage::from_raw(width, height, bgr).ok_or_else(|| Error::ShapeMismatch {
        expected: format!("{}x{} frame", width, height),
        actual: "unusable buffer".into(),
    })
}

/// RGB image to packed BGR24 samples for the encoder.
pub fn rgb_to_bgr(frame: RgbImage) -> Vec<u8> {
    let mut samples = frame.into_raw();
    for pixel in samples.chunks_exact_mut(3) {
        pixel.swap(0, 2);
    }
    samples
}
