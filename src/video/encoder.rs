//! MP4 encoding through an ffmpeg child reading raw BGR24 from a pipe.

use image::RgbImage;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use super::collect_stderr;
use super::frame::rgb_to_bgr;
use super::probe::VideoInfo;
use crate::config::EncoderSettings;
use crate::error::{Error, Result};

pub struct FrameEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: JoinHandle<String>,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl FrameEncoder {
    pub fn spawn(output: &Path, info: &VideoInfo, settings: &EncoderSettings) -> Result<Self> {
        let size = format!("{}x{}", info.width, info.height);
        let rate = info.frame_rate.to_string();

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-threads", &settings.threads.to_string()])
            .args(["-f", "rawvideo", "-pix_fmt", "bgr24"])
            .args(["-s", &size, "-r", &rate])
            .args(["-i", "-"])
            .args(["-an", "-c:v", &settings.codec])
            .args(["-q:v", &settings.quality.to_string()])
            .args(["-pix_fmt", "yuv420p", "-movflags", "+faststart"])
            .arg("-y")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Tool {
                tool: "ffmpeg",
                source,
            })?;

        let stdin = child.stdin.take();
        let stderr = collect_stderr(child.stderr.take());

        Ok(Self {
            child,
            stdin,
            stderr,
            width: info.width,
            height: info.height,
            frames_written: 0,
        })
    }

    pub async fn write_frame(&mut self, frame: RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(Error::ShapeMismatch {
                expected: format!("{}x{}", self.width, self.height),
                actual: format!("{}x{}", frame.width(), frame.height()),
            });
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Encode("encoder input already closed".into()))?;
        stdin
            .write_all(&rgb_to_bgr(frame))
            .await
            .map_err(|e| Error::Encode(format!("encoder rejected frame: {}", e)))?;

        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Close the input and wait for the container to be finalized.
    pub async fn finish(mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| Error::Encode(format!("failed to close encoder input: {}", e)))?;
        }

        let status = self.child.wait().await?;
        let stderr = self.stderr.await.unwrap_or_default();
        if !status.success() {
            return Err(Error::Encode(stderr.trim().to_string()));
        }
        Ok(())
    }

    /// Stop the encoder without finalizing; the partial output is discarded.
    pub async fn abort(mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill().await;
    }
}
