//! # ffa-serve
//!
//! Video dehazing over HTTP with FFA-Net. An uploaded video is decoded frame
//! by frame, each frame is passed through the pretrained network, and the
//! dehazed frames are re-encoded into an MP4 returned to the caller.

pub mod config;
pub mod constants;
pub mod dehaze;
pub mod error;
pub mod net;
pub mod pipeline;
pub mod routes;
pub mod services;
pub mod video;

pub use error::{Error, Result};

use pipeline::FramePipeline;

/// Shared by every request; read-only after startup.
pub struct AppState {
    pub pipeline: FramePipeline,
}

impl AppState {
    pub fn new(pipeline: FramePipeline) -> Self {
        Self { pipeline }
    }
}
