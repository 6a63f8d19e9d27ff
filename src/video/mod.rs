//! Video container I/O. Demuxing and codecs are delegated to the `ffmpeg`
//! and `ffprobe` executables, which must be on `PATH`.

use tokio::io::AsyncReadExt;
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;

pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod probe;
pub mod scratch;

pub use decoder::FrameDecoder;
pub use encoder::FrameEncoder;
pub use probe::{FrameRate, VideoInfo, probe};
pub use scratch::Scratch;

/// Drain a child's stderr in the background so it never blocks on a full pipe.
pub(crate) fn collect_stderr(stderr: Option<ChildStderr>) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut buf).await;
        }
        buf
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::process::Command;

    /// Encode a synthetic test pattern clip.
    pub(crate) fn make_clip(path: &Path, width: u32, height: u32, rate: u32, frames: u32) {
        let source = format!("testsrc=size={}x{}:rate={}", width, height, rate);
        let status = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "lavfi", "-i", &source])
            .args(["-frames:v", &frames.to_string()])
            .args(["-c:v", "mpeg4", "-pix_fmt", "yuv420p", "-f", "mp4"])
            .arg(path)
            .status()
            .expect("run ffmpeg");
        assert!(status.success(), "failed to build test clip");
    }

    /// Encode a test pattern clip, then retag it with a quarter-turn display
    /// rotation without touching the stored frames.
    pub(crate) fn make_rotated_clip(
        path: &Path,
        width: u32,
        height: u32,
        rate: u32,
        frames: u32,
    ) {
        let plain = path.with_extension("plain.mp4");
        make_clip(&plain, width, height, rate, frames);

        let retag = |rotation_args: &[&str], input_first: bool| {
            let mut cmd = Command::new("ffmpeg");
            cmd.args(["-hide_banner", "-loglevel", "error", "-y"]);
            if !input_first {
                cmd.args(rotation_args);
            }
            cmd.arg("-i").arg(&plain).args(["-c", "copy"]);
            if input_first {
                cmd.args(rotation_args);
            }
            cmd.args(["-f", "mp4"]).arg(path).status().expect("run ffmpeg")
        };

        // -display_rotation on newer ffmpeg, the rotate tag on older builds
        let tagged = retag(&["-display_rotation", "90"], false).success()
            || retag(&["-metadata:s:v:0", "rotate=90"], true).success();
        assert!(tagged, "failed to build rotated test clip");
    }

    /// Exact decoded frame count, as opposed to the container's estimate.
    pub(crate) fn count_frames(path: &Path) -> u64 {
        let output = Command::new("ffprobe")
            .args(["-v", "error", "-select_streams", "v:0", "-count_frames"])
            .args(["-show_entries", "stream=nb_read_frames"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path)
            .output()
            .expect("run ffprobe");
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .expect("frame count")
    }
}
