//! Frame-by-frame decoding through an ffmpeg child writing raw BGR24 to a pipe.

use image::RgbImage;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::frame::{bgr_to_rgb, frame_len};
use super::probe::VideoInfo;
use super::collect_stderr;
use crate::error::{Error, Result};

pub struct FrameDecoder {
    child: Child,
    stdout: ChildStdout,
    stderr: JoinHandle<String>,
    width: u32,
    height: u32,
}

impl FrameDecoder {
    pub fn spawn(input: &Path, info: &VideoInfo, threads: usize) -> Result<Self> {
        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(["-threads", &threads.to_string()])
            // autorotate stays on: frames arrive upright, at the size the probe reports
            .arg("-i")
            .arg(input)
            .args(["-map", "0:v:0", "-an", "-sn"])
            // one output frame per decoded frame: no duplication or dropping
            .args(["-vsync", "passthrough"])
            .args(["-f", "rawvideo", "-pix_fmt", "bgr24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Tool {
                tool: "ffmpeg",
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Decode("decoder stdout unavailable".into()))?;
        let stderr = collect_stderr(child.stderr.take());

        Ok(Self {
            child,
            stdout,
            stderr,
            width: info.width,
            height: info.height,
        })
    }

    /// Next frame in decode order, or `None` at end of stream.
    pub async fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let len = frame_len(self.width, self.height);
        match read_frame(&mut self.stdout, len).await? {
            Some(bgr) => bgr_to_rgb(bgr, self.width, self.height).map(Some),
            None => Ok(None),
        }
    }

    /// Wait for ffmpeg to exit; a failed exit means the stream was corrupt.
    pub async fn finish(self) -> Result<()> {
        let Self {
            mut child,
            stdout,
            stderr,
            ..
        } = self;
        drop(stdout);

        let status = child.wait().await?;
        let stderr = stderr.await.unwrap_or_default();
        if !status.success() {
            return Err(Error::Decode(stderr.trim().to_string()));
        }
        Ok(())
    }
}

/// Read exactly one frame of `len` bytes. Clean EOF before the first byte
/// ends the stream; EOF inside a frame is a truncated stream.
pub(crate) async fn read_frame<R>(reader: &mut R, len: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::Decode(format!(
                "truncated frame: got {} of {} bytes",
                filled, len
            )));
        }
        filled += n;
    }
    Ok(Some(buf))
}
