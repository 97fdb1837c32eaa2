use crate::capture::domain::frame_source::{CaptureError, CaptureHandle, FrameSource, VideoSource};
use crate::shared::frame::{Frame, PixelLayout};

/// Opens still images as single-frame sources using the `image` crate.
///
/// Needs no native libraries, which makes it the default for offline and
/// batch analysis of stored frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageFrameSource;

impl ImageFrameSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for ImageFrameSource {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let VideoSource::File(path) = source else {
            return Err(CaptureError::Unsupported(format!(
                "{source} (image source only opens files)"
            )));
        };

        let img = image::open(path).map_err(|e| CaptureError::Open {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        log::debug!("Opened image {} ({width}x{height})", path.display());

        Ok(Box::new(ImageCapture {
            frame: Some(Frame::new(rgb.into_raw(), width, height, PixelLayout::Rgb, 0)),
        }))
    }
}

/// Yields the decoded image once, then reports no further frames.
struct ImageCapture {
    frame: Option<Frame>,
}

impl CaptureHandle for ImageCapture {
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        Ok(self.frame.take())
    }

    fn release(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_png(dir: &std::path::Path, w: u32, h: u32) -> PathBuf {
        let path = dir.join("frame.png");
        let img = image::RgbImage::from_fn(w, h, |x, _| image::Rgb([x as u8, 0, 255]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_open_yields_single_rgb_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 8, 4);

        let mut handle = ImageFrameSource::new()
            .open(&VideoSource::File(path))
            .unwrap();
        let frame = handle.read_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 4));
        assert_eq!(frame.layout(), PixelLayout::Rgb);
        assert_eq!(&frame.data()[3..6], &[1, 0, 255]);
        assert!(handle.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let result = ImageFrameSource::new().open(&VideoSource::File("/nonexistent/x.png".into()));
        assert!(matches!(result, Err(CaptureError::Open { .. })));
    }

    #[test]
    fn test_device_is_unsupported() {
        let result = ImageFrameSource::new().open(&VideoSource::Device(0));
        assert!(matches!(result, Err(CaptureError::Unsupported(_))));
    }

    #[test]
    fn test_release_drops_pending_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 2, 2);
        let mut handle = ImageFrameSource::new()
            .open(&VideoSource::File(path))
            .unwrap();
        handle.release();
        assert!(handle.read_frame().unwrap().is_none());
    }
}
