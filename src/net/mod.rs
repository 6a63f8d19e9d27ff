//! FFA-Net: feature fusion attention network for single image dehazing.
//!
//! Parameter names follow the PyTorch module tree of the published model so
//! the reference checkpoint loads without renaming.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, VarBuilder};

mod attention;
pub mod checkpoint;

pub use attention::{CaLayer, PaLayer};
use attention::global_avg_pool;

/// Architecture hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FfaConfig {
    pub groups: usize,
    pub blocks: usize,
    pub dim: usize,
    pub kernel_size: usize,
    /// Channel bottleneck divisor inside each block's attention gates
    pub block_reduction: usize,
    /// Channel bottleneck divisor of the group fusion gate
    pub fusion_reduction: usize,
}

impl Default for FfaConfig {
    fn default() -> Self {
        Self {
            groups: 3,
            blocks: 12,
            dim: 64,
            kernel_size: 3,
            block_reduction: 8,
            fusion_reduction: 16,
        }
    }
}

/// Convolution with bias and `kernel_size / 2` padding, so H and W never shrink.
pub(crate) fn same_conv(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    vb: VarBuilder,
) -> Result<Conv2d> {
    let cfg = Conv2dConfig {
        padding: kernel_size / 2,
        ..Default::default()
    };
    candle_nn::conv2d(in_channels, out_channels, kernel_size, cfg, vb)
}

pub(crate) fn pointwise_conv(
    in_channels: usize,
    out_channels: usize,
    vb: VarBuilder,
) -> Result<Conv2d> {
    same_conv(in_channels, out_channels, 1, vb)
}

/// conv → relu → +x → conv → CA → PA → +x
#[derive(Debug, Clone)]
pub struct Block {
    conv1: Conv2d,
    conv2: Conv2d,
    calayer: CaLayer,
    palayer: PaLayer,
}

impl Block {
    pub fn new(cfg: &FfaConfig, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            conv1: same_conv(cfg.dim, cfg.dim, cfg.kernel_size, vb.pp("conv1"))?,
            conv2: same_conv(cfg.dim, cfg.dim, cfg.kernel_size, vb.pp("conv2"))?,
            calayer: CaLayer::new(cfg.dim, cfg.block_reduction, vb.pp("calayer"))?,
            palayer: PaLayer::new(cfg.dim, cfg.block_reduction, vb.pp("palayer"))?,
        })
    }
}

impl Module for Block {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let res = (xs.apply(&self.conv1)?.relu()? + xs)?;
        let res = res
            .apply(&self.conv2)?
            .apply(&self.calayer)?
            .apply(&self.palayer)?;
        res + xs
    }
}

/// A run of blocks closed by a plain conv, with an outer residual.
#[derive(Debug, Clone)]
pub struct Group {
    blocks: Vec<Block>,
    tail: Conv2d,
}

impl Group {
    pub fn new(cfg: &FfaConfig, vb: VarBuilder) -> Result<Self> {
        // `gp` is an nn.Sequential: blocks at 0..n, the closing conv at n
        let vb = vb.pp("gp");
        let blocks = (0..cfg.blocks)
            .map(|i| Block::new(cfg, vb.pp(i)))
            .collect::<Result<Vec<_>>>()?;
        let tail = same_conv(cfg.dim, cfg.dim, cfg.kernel_size, vb.pp(cfg.blocks))?;
        Ok(Self { blocks, tail })
    }
}

impl Module for Group {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut res = xs.clone();
        for block in &self.blocks {
            res = res.apply(block)?;
        }
        res.apply(&self.tail)? + xs
    }
}

/// Learned per-group channel weights over the concatenated group outputs.
#[derive(Debug, Clone)]
struct FusionGate {
    reduce: Conv2d,
    expand: Conv2d,
}

impl FusionGate {
    fn new(cfg: &FfaConfig, vb: VarBuilder) -> Result<Self> {
        let wide = cfg.dim * cfg.groups;
        let hidden = cfg.dim / cfg.fusion_reduction;
        // index 0 of the torch Sequential is the pooling layer
        Ok(Self {
            reduce: pointwise_conv(wide, hidden, vb.pp(1))?,
            expand: pointwise_conv(hidden, wide, vb.pp(3))?,
        })
    }
}

impl Module for FusionGate {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let w = global_avg_pool(xs)?
            .apply(&self.reduce)?
            .relu()?
            .apply(&self.expand)?;
        candle_nn::ops::sigmoid(&w)
    }
}

/// The full dehazing network. Input and output are `(b, 3, h, w)`.
#[derive(Debug, Clone)]
pub struct FfaNet {
    cfg: FfaConfig,
    pre: Conv2d,
    groups: Vec<Group>,
    fusion: FusionGate,
    palayer: PaLayer,
    post: [Conv2d; 2],
}

impl FfaNet {
    pub fn new(cfg: FfaConfig, vb: VarBuilder) -> Result<Self> {
        if cfg.groups != 3 {
            candle_core::bail!("FFA-Net is defined for 3 groups, got {}", cfg.groups)
        }

        let pre = same_conv(3, cfg.dim, cfg.kernel_size, vb.pp("pre").pp(0))?;
        let groups = (1..=cfg.groups)
            .map(|i| Group::new(&cfg, vb.pp(format!("g{}", i))))
            .collect::<Result<Vec<_>>>()?;
        let fusion = FusionGate::new(&cfg, vb.pp("ca"))?;
        let palayer = PaLayer::new(cfg.dim, cfg.block_reduction, vb.pp("palayer"))?;
        let vb_post = vb.pp("post");
        let post = [
            same_conv(cfg.dim, cfg.dim, cfg.kernel_size, vb_post.pp(0))?,
            same_conv(cfg.dim, 3, cfg.kernel_size, vb_post.pp(1))?,
        ];

        Ok(Self {
            cfg,
            pre,
            groups,
            fusion,
            palayer,
            post,
        })
    }
}

impl Module for FfaNet {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.apply(&self.pre)?;
        let mut outputs = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            x = x.apply(group)?;
            outputs.push(x.clone());
        }

        // (b, groups * dim, 1, 1), laid out group-major like torch's view(-1, gps, dim)
        let weights = Tensor::cat(&outputs, 1)?.apply(&self.fusion)?;
        let weights = weights.chunk(self.cfg.groups, 1)?;

        let mut fused = outputs[0].broadcast_mul(&weights[0])?;
        for (out, w) in outputs.iter().zip(weights.iter()).skip(1) {
            fused = (fused + out.broadcast_mul(w)?)?;
        }

        let x = fused
            .apply(&self.palayer)?
            .apply(&self.post[0])?
            .apply(&self.post[1])?;
        x + input
    }
}
