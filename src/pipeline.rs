//! Uploaded video bytes in, dehazed MP4 bytes out.
//!
//! Frames go through strictly one at a time in decode order: decode, dehaze
//! on the blocking pool, encode. Any failure aborts the whole video; the
//! scratch directory and ffmpeg children are released on every exit path.

use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EncoderSettings;
use crate::dehaze::Dehazer;
use crate::error::{Error, Result};
use crate::video::{self, FrameDecoder, FrameEncoder, Scratch};

pub struct FramePipeline {
    dehazer: Arc<Dehazer>,
    encoder: EncoderSettings,
}

impl FramePipeline {
    pub fn new(dehazer: Arc<Dehazer>, encoder: EncoderSettings) -> Self {
        Self { dehazer, encoder }
    }

    pub async fn process_video(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.is_empty() {
            return Err(Error::Decode("empty upload".into()));
        }

        let started = Instant::now();
        let scratch = Scratch::new()?;
        let input_path = scratch.write_input(input).await?;
        let info = video::probe(&input_path).await?;
        let total = info
            .frame_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());

        info!(
            width = info.width,
            height = info.height,
            rotation = info.rotation,
            fps = %info.frame_rate,
            frames = %total,
            "processing video"
        );

        let mut decoder = FrameDecoder::spawn(&input_path, &info, self.encoder.threads)?;
        let mut encoder = FrameEncoder::spawn(&scratch.output_path(), &info, &self.encoder)?;

        let mut frame_count = 0u64;
        while let Some(frame) = decoder.next_frame().await? {
            frame_count += 1;
            debug!("processing frame {}/{}", frame_count, total);

            let dehazed = self.dehaze_frame(frame).await?;
            encoder.write_frame(dehazed).await?;
        }
        decoder.finish().await?;

        if frame_count == 0 {
            encoder.abort().await;
            return Err(Error::Decode("video contains no frames".into()));
        }

        encoder.finish().await?;
        let output = scratch.read_output().await?;
        if output.is_empty() {
            warn!("encoder produced an empty file");
            return Err(Error::Encode("encoder produced no output".into()));
        }

        info!(
            frames = frame_count,
            bytes = output.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "video processed"
        );
        Ok(output)
    }

    async fn dehaze_frame(&self, frame: RgbImage) -> Result<RgbImage> {
        let dehazer = Arc::clone(&self.dehazer);
        tokio::task::spawn_blocking(move || dehazer.dehaze(&frame)).await?
    }
}
