/// Channel order of a frame's interleaved pixel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    Rgb,
    Bgr,
}

impl PixelLayout {
    pub fn channels(self) -> u8 {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Rgb | PixelLayout::Bgr => 3,
        }
    }
}

/// A single captured image: contiguous 8-bit pixels in row-major order.
///
/// Frames are read-only once constructed. Format conversion happens at I/O
/// boundaries; the only in-domain conversion is [`Frame::to_grayscale`].
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    layout: PixelLayout,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, layout: PixelLayout, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (layout.channels() as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            layout,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.layout.channels()
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_grayscale(&self) -> bool {
        self.layout == PixelLayout::Gray
    }

    /// Single-channel copy using BT.601 luma weights, rounded to nearest.
    ///
    /// Grayscale frames are returned as a plain clone.
    pub fn to_grayscale(&self) -> Frame {
        let (r_idx, b_idx) = match self.layout {
            PixelLayout::Gray => return self.clone(),
            PixelLayout::Rgb => (0, 2),
            PixelLayout::Bgr => (2, 0),
        };
        let gray = self
            .data
            .chunks_exact(3)
            .map(|px| {
                let luma = 0.299 * px[r_idx] as f32 + 0.587 * px[1] as f32 + 0.114 * px[b_idx] as f32;
                luma.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Frame::new(gray, self.width, self.height, PixelLayout::Gray, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, PixelLayout::Rgb, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
        assert!(!frame.is_grayscale());
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, PixelLayout::Rgb, 0);
    }

    #[test]
    fn test_grayscale_of_gray_is_identity() {
        let frame = Frame::new(vec![1, 2, 3, 4], 2, 2, PixelLayout::Gray, 3);
        assert_eq!(frame.to_grayscale(), frame);
    }

    #[test]
    fn test_grayscale_uses_luma_weights() {
        // pure red, green, blue, white
        let data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
        let gray = Frame::new(data, 4, 1, PixelLayout::Rgb, 0).to_grayscale();
        assert_eq!(gray.layout(), PixelLayout::Gray);
        assert_eq!(gray.data(), &[76, 150, 29, 255]);
    }

    #[test]
    fn test_grayscale_bgr_swaps_red_and_blue() {
        let rgb = Frame::new(vec![10, 20, 200], 1, 1, PixelLayout::Rgb, 0);
        let bgr = Frame::new(vec![200, 20, 10], 1, 1, PixelLayout::Bgr, 0);
        assert_eq!(rgb.to_grayscale().data(), bgr.to_grayscale().data());
    }
}
