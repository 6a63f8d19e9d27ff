//! Per-frame dehazing: tensor conversion around the FFA-Net forward pass.

use candle_core::{DType, Device, Module, Tensor};
use image::RgbImage;
use std::path::Path;

use crate::config::DeviceChoice;
use crate::constants::{HAZE_MEAN, HAZE_STD};
use crate::error::{Error, Result};
use crate::net::{self, FfaConfig, FfaNet};

/// Per-channel affine normalization applied to unit-range RGB input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            mean: HAZE_MEAN,
            std: HAZE_STD,
        }
    }
}

impl Normalization {
    fn channel_tensors(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let mean = Tensor::from_slice(&self.mean[..], (3, 1, 1), device)?;
        let std = Tensor::from_slice(&self.std[..], (3, 1, 1), device)?;
        Ok((mean, std))
    }

    /// `(x - mean) / std` per channel on a `(3, h, w)` or `(b, 3, h, w)` tensor.
    pub fn normalize(&self, xs: &Tensor) -> Result<Tensor> {
        let (mean, std) = self.channel_tensors(xs.device())?;
        Ok(xs.broadcast_sub(&mean)?.broadcast_div(&std)?)
    }

    /// Inverse of [`Normalization::normalize`].
    pub fn denormalize(&self, xs: &Tensor) -> Result<Tensor> {
        let (mean, std) = self.channel_tensors(xs.device())?;
        Ok(xs.broadcast_mul(&std)?.broadcast_add(&mean)?)
    }
}

/// RGB frame to a normalized `(1, 3, h, w)` f32 tensor.
pub fn frame_to_tensor(frame: &RgbImage, norm: &Normalization, device: &Device) -> Result<Tensor> {
    let (w, h) = frame.dimensions();
    let unit = (Tensor::from_slice(frame.as_raw().as_slice(), (h as usize, w as usize, 3), device)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        * (1. / 255.))?;
    Ok(norm.normalize(&unit)?.unsqueeze(0)?)
}

/// Unit-range `(1, 3, h, w)` or `(3, h, w)` tensor back to an 8-bit RGB frame.
/// Values outside `[0, 1]` are clamped.
pub fn tensor_to_frame(xs: &Tensor) -> Result<RgbImage> {
    let xs = match xs.rank() {
        4 => xs.squeeze(0)?,
        _ => xs.clone(),
    };
    let (channels, h, w) = xs.dims3()?;
    if channels != 3 {
        return Err(Error::ShapeMismatch {
            expected: "3 channels".into(),
            actual: format!("{:?}", xs.dims()),
        });
    }

    let samples = (xs.to_device(&Device::Cpu)?.clamp(0f32, 1f32)? * 255.)?
        .round()?
        .to_dtype(DType::U8)?
        .permute((1, 2, 0))?
        .flatten_all()?
        .to_vec1::<u8>()?;

    RgbImage::from_raw(w as u32, h as u32, samples).ok_or_else(|| Error::ShapeMismatch {
        expected: format!("{}x{}x3 samples", w, h),
        actual: "short buffer".into(),
    })
}

/// Loaded network plus the preprocessing it was trained with.
/// Shared read-only across requests.
pub struct Dehazer {
    net: FfaNet,
    norm: Normalization,
    device: Device,
}

impl Dehazer {
    pub fn new(net: FfaNet, norm: Normalization, device: Device) -> Self {
        Self { net, norm, device }
    }

    /// Open the configured device and load the checkpoint onto it.
    pub fn load(checkpoint: &Path, device: DeviceChoice) -> Result<Self> {
        let device = device.resolve()?;
        let net = net::checkpoint::load(checkpoint, FfaConfig::default(), &device)?;
        Ok(Self::new(net, Normalization::default(), device))
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Dehaze one frame. Blocks for the whole forward pass.
    pub fn dehaze(&self, frame: &RgbImage) -> Result<RgbImage> {
        let input = frame_to_tensor(frame, &self.norm, &self.device)?;
        let output = self.net.forward(&input)?;

        let expected = input.dims();
        if output.dims() != expected {
            return Err(Error::ShapeMismatch {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", output.dims()),
            });
        }

        tensor_to_frame(&output)
    }
}
