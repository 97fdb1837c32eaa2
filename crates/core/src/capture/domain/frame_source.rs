use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("cannot open {source_name}: {reason}")]
    Open { source_name: String, reason: String },
    #[error("frame read failed: {0}")]
    Read(String),
    #[error("unsupported source: {0}")]
    Unsupported(String),
}

/// Selects which video source a session opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VideoSource {
    /// Live capture device by platform index (0 = default camera).
    Device(u32),
    /// Stored video or still image.
    File(PathBuf),
}

impl FromStr for VideoSource {
    type Err = std::convert::Infallible;

    /// Bare non-negative integers select a device; anything else is a path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<u32>() {
            Ok(index) => VideoSource::Device(index),
            Err(_) => VideoSource::File(PathBuf::from(s)),
        })
    }
}

impl std::fmt::Display for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoSource::Device(index) => write!(f, "device {index}"),
            VideoSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An exclusively-owned open source.
///
/// Sessions never call `release` directly; they wrap the handle in a
/// [`CaptureGuard`](super::capture_guard::CaptureGuard).
pub trait CaptureHandle: Send {
    /// Blocks until the next frame is decoded. `Ok(None)` means the source
    /// is open but has no frame to give.
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Frees the underlying device or file.
    fn release(&mut self);
}

/// Opens capture handles. Shared across sessions; each `open` yields an
/// independent handle.
pub trait FrameSource: Send + Sync {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}
