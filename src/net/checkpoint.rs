//! Loading pretrained FFA-Net parameters.
//!
//! The reference weights ship as a PyTorch pickle holding `{"model": state_dict}`
//! saved from an `nn.DataParallel` wrapper, so every name carries a `module.`
//! prefix. A safetensors export of the same state dict is accepted too.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::{FfaConfig, FfaNet};
use crate::constants::{CHECKPOINT_STATE_KEY, DATA_PARALLEL_PREFIX};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Pickle,
    Safetensors,
}

fn detect_format(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pk" | "pth" | "pt" => Some(Format::Pickle),
        "safetensors" => Some(Format::Safetensors),
        _ => None,
    }
}

/// Strip the `nn.DataParallel` prefix from every parameter name.
pub fn strip_data_parallel_prefix<I>(tensors: I) -> HashMap<String, Tensor>
where
    I: IntoIterator<Item = (String, Tensor)>,
{
    tensors
        .into_iter()
        .map(|(name, tensor)| match name.strip_prefix(DATA_PARALLEL_PREFIX) {
            Some(stripped) => (stripped.to_string(), tensor),
            None => (name, tensor),
        })
        .collect()
}

/// Read raw named tensors from a checkpoint file, on the CPU.
pub fn read_tensors(path: &Path) -> Result<HashMap<String, Tensor>> {
    let format = detect_format(path).ok_or_else(|| Error::CheckpointFormat(path.to_path_buf()))?;
    let checkpoint_err = |source| Error::Checkpoint {
        path: path.to_path_buf(),
        source,
    };

    let tensors = match format {
        Format::Pickle => {
            candle_core::pickle::read_all_with_key(path, Some(CHECKPOINT_STATE_KEY))
                .map_err(checkpoint_err)?
        }
        Format::Safetensors => candle_core::safetensors::load(path, &Device::Cpu)
            .map_err(checkpoint_err)?
            .into_iter()
            .collect(),
    };

    debug!(count = tensors.len(), ?format, "read checkpoint tensors");
    Ok(strip_data_parallel_prefix(tensors))
}

/// Build the network from a checkpoint. Missing parameters and shape
/// mismatches fail here, before any request is served.
pub fn load(path: &Path, cfg: FfaConfig, device: &Device) -> Result<FfaNet> {
    let tensors = read_tensors(path)?;
    let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
    let net = FfaNet::new(cfg, vb).map_err(|source| Error::Checkpoint {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), ?device, "loaded FFA-Net checkpoint");
    Ok(net)
}
