//! Process configuration, read once from the environment at startup.

use candle_core::Device;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_CHECKPOINT_PATH, DEFAULT_FFMPEG_THREADS, DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_PORT,
    DEFAULT_VIDEO_CODEC, DEFAULT_VIDEO_QUALITY,
};
use crate::error::{Error, Result};

/// Where the network runs. Passed explicitly into the dehazer so tests can
/// pin execution to the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceChoice {
    /// First CUDA device, then Metal, then CPU
    #[default]
    Auto,
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl DeviceChoice {
    pub fn resolve(self) -> Result<Device> {
        let device = match self {
            DeviceChoice::Auto => {
                if candle_core::utils::cuda_is_available() {
                    Device::new_cuda(0)
                } else if candle_core::utils::metal_is_available() {
                    Device::new_metal(0)
                } else {
                    Ok(Device::Cpu)
                }
            }
            DeviceChoice::Cpu => Ok(Device::Cpu),
            DeviceChoice::Cuda(ordinal) => Device::new_cuda(ordinal),
            DeviceChoice::Metal(ordinal) => Device::new_metal(ordinal),
        };

        device.map_err(|source| Error::Device {
            name: self.to_string(),
            source,
        })
    }
}

impl fmt::Display for DeviceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceChoice::Auto => write!(f, "auto"),
            DeviceChoice::Cpu => write!(f, "cpu"),
            DeviceChoice::Cuda(n) => write!(f, "cuda:{}", n),
            DeviceChoice::Metal(n) => write!(f, "metal:{}", n),
        }
    }
}

impl FromStr for DeviceChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let (kind, ordinal) = match s.split_once(':') {
            Some((kind, n)) => {
                let n = n.parse::<usize>().map_err(|_| Error::Config {
                    name: "DEVICE".into(),
                    reason: format!("invalid device ordinal in {:?}", s),
                })?;
                (kind, Some(n))
            }
            None => (s.as_str(), None),
        };

        match (kind, ordinal) {
            ("auto", None) => Ok(DeviceChoice::Auto),
            ("cpu", None) => Ok(DeviceChoice::Cpu),
            ("cuda" | "gpu", n) => Ok(DeviceChoice::Cuda(n.unwrap_or(0))),
            ("metal", n) => Ok(DeviceChoice::Metal(n.unwrap_or(0))),
            _ => Err(Error::Config {
                name: "DEVICE".into(),
                reason: format!("expected auto, cpu, cuda[:N] or metal[:N], got {:?}", s),
            }),
        }
    }
}

/// Encoder settings for the output container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub codec: String,
    pub quality: u8,
    pub threads: usize,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            quality: DEFAULT_VIDEO_QUALITY,
            threads: DEFAULT_FFMPEG_THREADS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub checkpoint_path: PathBuf,
    pub device: DeviceChoice,
    pub port: u16,
    pub max_upload_size: usize,
    pub encoder: EncoderSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or empty keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let checkpoint_path = var("CHECKPOINT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_PATH));

        let device = match var("DEVICE") {
            Some(v) => v.parse()?,
            None => DeviceChoice::Auto,
        };

        let port = parse_or("PORT", var("PORT"), DEFAULT_PORT)?;
        let max_upload_size = parse_positive(
            "MAX_UPLOAD_SIZE",
            var("MAX_UPLOAD_SIZE"),
            DEFAULT_MAX_UPLOAD_SIZE,
        )?;
        let threads = parse_positive(
            "FFMPEG_THREADS",
            var("FFMPEG_THREADS"),
            DEFAULT_FFMPEG_THREADS,
        )?;
        let quality = parse_or("VIDEO_QUALITY", var("VIDEO_QUALITY"), DEFAULT_VIDEO_QUALITY)?;
        let codec = var("VIDEO_CODEC").unwrap_or_else(|| DEFAULT_VIDEO_CODEC.to_string());

        Ok(Self {
            checkpoint_path,
            device,
            port,
            max_upload_size,
            encoder: EncoderSettings {
                codec,
                quality,
                threads,
            },
        })
    }
}

fn parse_or<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| Error::Config {
            name: name.to_string(),
            reason: format!("cannot parse {:?}", v),
        }),
        None => Ok(default),
    }
}

fn parse_positive(name: &str, value: Option<String>, default: usize) -> Result<usize> {
    let parsed = parse_or(name, value, default)?;
    if parsed == 0 {
        return Err(Error::Config {
            name: name.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(parsed)
}
