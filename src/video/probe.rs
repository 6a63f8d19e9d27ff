//! Stream metadata via ffprobe.

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::constants::MAX_FRAME_PIXELS;
use crate::error::{Error, Result};

/// Exact rational frame rate, e.g. `30000/1001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    /// Parse ffprobe's `num/den` form. `0/0` and other degenerate rates yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let (num, den) = match s.trim().split_once('/') {
            Some((n, d)) => (n.parse().ok()?, d.parse().ok()?),
            None => (s.trim().parse().ok()?, 1),
        };
        (num > 0 && den > 0).then_some(Self { num, den })
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Stream properties as the decoder delivers them. `width` and `height` are
/// the upright, displayed size: ffmpeg applies the display rotation while
/// decoding, so a quarter-turn swaps the stored dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Clockwise display rotation in degrees, one of 0, 90, 180 or 270
    pub rotation: u32,
    pub frame_rate: FrameRate,
    /// Container-reported count; an estimate, absent for some formats
    pub frame_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// The display matrix wins over the legacy `rotate` tag. The matrix
    /// angle is counter-clockwise, the tag clockwise.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .map(|r| -r.round() as i64)
            .or_else(|| self.tags.rotate.as_deref()?.trim().parse().ok())
            .unwrap_or(0);
        match degrees.rem_euclid(360) {
            r @ (90 | 180 | 270) => r as u32,
            _ => 0,
        }
    }
}

/// Interpret ffprobe's JSON for the first video stream.
pub fn parse_probe_json(json: &[u8]) -> Result<VideoInfo> {
    let output: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| Error::Decode(format!("unreadable stream metadata: {}", e)))?;

    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| Error::Decode("no video stream".into()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(Error::Decode("video stream has no dimensions".into())),
    };
    if u64::from(width) * u64::from(height) > MAX_FRAME_PIXELS {
        return Err(Error::Decode(format!(
            "frame size {}x{} exceeds the supported maximum",
            width, height
        )));
    }

    let rotation = stream.rotation();
    let (width, height) = match rotation {
        90 | 270 => (height, width),
        _ => (width, height),
    };

    let frame_rate = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| FrameRate::parse(rate))
        .ok_or_else(|| Error::Decode("video stream has no usable frame rate".into()))?;

    let frame_count = stream.nb_frames.and_then(|n| n.parse().ok());

    Ok(VideoInfo {
        width,
        height,
        rotation,
        frame_rate,
        frame_count,
    })
}

/// Probe the first video stream of a file.
pub async fn probe(path: &Path) -> Result<VideoInfo> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(["-select_streams", "v:0"])
        .args([
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames\
             :stream_tags=rotate:stream_side_data=rotation",
        ])
        .args(["-of", "json"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| Error::Tool {
            tool: "ffprobe",
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Decode(stderr.trim().to_string()));
    }

    parse_probe_json(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_parsing() {
        assert_eq!(FrameRate::parse("30/1"), Some(FrameRate { num: 30, den: 1 }));
        assert_eq!(
            FrameRate::parse("30000/1001"),
            Some(FrameRate { num: 30000, den: 1001 })
        );
        assert_eq!(FrameRate::parse("25"), Some(FrameRate { num: 25, den: 1 }));
        assert_eq!(FrameRate::parse("0/0"), None);
        assert_eq!(FrameRate::parse("abc"), None);
        assert_eq!(FrameRate { num: 24000, den: 1001 }.to_string(), "24000/1001");
    }

    #[test]
    fn parses_stream_entry() {
        let json = br#"{"programs": [], "streams": [{"width": 640, "height": 360,
            "r_frame_rate": "30000/1001", "avg_frame_rate": "30000/1001", "nb_frames": "120"}]}"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!(info.width, 640);
        assert_eq!(info.height, 360);
        assert_eq!(info.frame_rate, FrameRate { num: 30000, den: 1001 });
        assert_eq!(info.frame_count, Some(120));
    }

    #[test]
    fn falls_back_to_average_rate() {
        let json = br#"{"streams": [{"width": 2, "height": 2,
            "r_frame_rate": "0/0", "avg_frame_rate": "15/1"}]}"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!(info.frame_rate, FrameRate { num: 15, den: 1 });
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn no_stream_is_a_decode_error() {
        let err = parse_probe_json(br#"{"programs": [], "streams": []}"#).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        let err = parse_probe_json(br#"{}"#).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let json = br#"{"streams": [{"width": 1920, "height": 1080, "r_frame_rate": "30/1",
            "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}]}"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!((info.width, info.height, info.rotation), (1080, 1920, 90));

        let json = br#"{"streams": [{"width": 1920, "height": 1080, "r_frame_rate": "30/1",
            "tags": {"rotate": "270"}}]}"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!((info.width, info.height, info.rotation), (1080, 1920, 270));
    }

    #[test]
    fn half_turn_keeps_dimensions() {
        let json = br#"{"streams": [{"width": 640, "height": 360, "r_frame_rate": "25/1",
            "side_data_list": [{"rotation": 180}], "tags": {"rotate": "90"}}]}"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!((info.width, info.height, info.rotation), (640, 360, 180));
    }

    #[test]
    fn unrotated_stream_reports_zero() {
        let json = br#"{"streams": [{"width": 640, "height": 360, "r_frame_rate": "25/1",
            "tags": {}}]}"#;
        assert_eq!(parse_probe_json(json).unwrap().rotation, 0);
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let json = br#"{"streams": [{"width": 65535, "height": 65535, "r_frame_rate": "25/1"}]}"#;
        let err = parse_probe_json(json).unwrap_err();
        assert!(matches!(err, Error::Decode(ref msg) if msg.contains("65535x65535")));
    }

    #[test]
    fn missing_dimensions_is_a_decode_error() {
        let json = br#"{"streams": [{"r_frame_rate": "25/1"}]}"#;
        assert!(matches!(parse_probe_json(json), Err(Error::Decode(_))));
    }
}
