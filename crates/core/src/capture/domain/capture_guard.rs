use crate::capture::domain::frame_source::{CaptureError, CaptureHandle};
use crate::shared::frame::Frame;

/// Scoped ownership of a [`CaptureHandle`].
///
/// The handle is released exactly once: on explicit [`release`](Self::release)
/// or on drop, including drops during panic unwinding.
pub struct CaptureGuard {
    handle: Option<Box<dyn CaptureHandle>>,
}

impl CaptureGuard {
    pub fn new(handle: Box<dyn CaptureHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.handle.as_mut() {
            Some(handle) => handle.read_frame(),
            None => Err(CaptureError::Read("capture already released".into())),
        }
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Idempotent; later calls and the eventual drop are no-ops.
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
            log::debug!("Capture handle released");
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.release();
    }
}
