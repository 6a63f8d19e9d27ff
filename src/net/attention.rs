use candle_core::{Module, Result, Tensor};
use candle_nn::{Conv2d, VarBuilder};

use super::pointwise_conv;

/// Global spatial mean, keeping a `(b, c, 1, 1)` shape.
pub(crate) fn global_avg_pool(xs: &Tensor) -> Result<Tensor> {
    xs.mean_keepdim(3)?.mean_keepdim(2)
}

/// Channel attention: pooled per-channel statistics gate each channel.
#[derive(Debug, Clone)]
pub struct CaLayer {
    reduce: Conv2d,
    expand: Conv2d,
}

impl CaLayer {
    pub fn new(channels: usize, reduction: usize, vb: VarBuilder) -> Result<Self> {
        let hidden = channels / reduction;
        let vb = vb.pp("ca");
        Ok(Self {
            reduce: pointwise_conv(channels, hidden, vb.pp(0))?,
            expand: pointwise_conv(hidden, channels, vb.pp(2))?,
        })
    }
}

impl Module for CaLayer {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let gate = global_avg_pool(xs)?
            .apply(&self.reduce)?
            .relu()?
            .apply(&self.expand)?;
        let gate = candle_nn::ops::sigmoid(&gate)?;
        xs.broadcast_mul(&gate)
    }
}

/// Pixel attention: a single-channel gate per spatial location.
#[derive(Debug, Clone)]
pub struct PaLayer {
    reduce: Conv2d,
    project: Conv2d,
}

impl PaLayer {
    pub fn new(channels: usize, reduction: usize, vb: VarBuilder) -> Result<Self> {
        let hidden = channels / reduction;
        let vb = vb.pp("pa");
        Ok(Self {
            reduce: pointwise_conv(channels, hidden, vb.pp(0))?,
            project: pointwise_conv(hidden, 1, vb.pp(2))?,
        })
    }
}

impl Module for PaLayer {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let gate = xs.apply(&self.reduce)?.relu()?.apply(&self.project)?;
        let gate = candle_nn::ops::sigmoid(&gate)?;
        xs.broadcast_mul(&gate)
    }
}
