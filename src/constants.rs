//! Application constants

/// Per-channel RGB mean of the RESIDE ITS training set, in unit range.
/// The reference checkpoint was trained on inputs normalized with these.
pub const HAZE_MEAN: [f32; 3] = [0.64, 0.6, 0.58];

/// Per-channel RGB standard deviation of the RESIDE ITS training set.
pub const HAZE_STD: [f32; 3] = [0.14, 0.15, 0.152];

/// Key the reference PyTorch checkpoint stores its state dict under
pub const CHECKPOINT_STATE_KEY: &str = "model";

/// Prefix `nn.DataParallel` prepends to every parameter name
pub const DATA_PARALLEL_PREFIX: &str = "module.";

/// Default checkpoint location, relative to the working directory
pub const DEFAULT_CHECKPOINT_PATH: &str = "net/trained_models/its_train.pk";

pub const DEFAULT_PORT: u16 = 8000;

/// Largest frame accepted from an upload (8K UHD), bounding the per-frame
/// decode buffer
pub const MAX_FRAME_PIXELS: u64 = 7680 * 4320;

/// Maximum upload size for videos (512 MB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 512 * 1024 * 1024;

pub const DEFAULT_FFMPEG_THREADS: usize = 1;

/// `mpeg4` is what the `mp4v` FourCC maps to
pub const DEFAULT_VIDEO_CODEC: &str = "mpeg4";

pub const DEFAULT_VIDEO_QUALITY: u8 = 2;

/// Multipart field the upload is expected in
pub const UPLOAD_FIELD: &str = "video";

/// Filename offered to the client for the processed video
pub const OUTPUT_FILENAME: &str = "dehazed_video.mp4";
