//! Raw camera frames.

/// Pixel layout of a frame's raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel.
    Gray8,
    /// Three bytes per pixel, interleaved R, G, B.
    Rgb8,
}

impl PixelFormat {
    /// Bytes used by a single pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// One image read from one camera.
///
/// The device index travels with the pixels so a failed upload can name
/// the camera that produced it.
#[derive(Clone)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    device: usize,
    // Counted per device from 1.
    sequence: u64,
}

impl Frame {
    /// Frame from device 0; use [`Frame::with_device`] to tag it.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            device: 0,
            sequence,
        }
    }

    /// Shorthand for an interleaved [`PixelFormat::Rgb8`] frame.
    pub fn rgb(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self::new(pixels, width, height, PixelFormat::Rgb8, sequence)
    }

    /// Stamps the session index of the producing camera.
    pub fn with_device(self, device: usize) -> Self {
        Self { device, ..self }
    }

    /// Raw pixel bytes in [`Frame::format`] layout.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout of the buffer.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Session index of the producing camera.
    #[inline]
    pub fn device(&self) -> usize {
        self.device
    }

    /// Per-device frame counter.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Buffer length implied by the dimensions and pixel format.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// A frame with a zero dimension or no pixel data at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    /// Non-empty and the buffer length agrees with [`Frame::expected_len`].
    pub fn is_valid(&self) -> bool {
        !self.is_empty() && self.pixels.len() == self.expected_len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame(device {} #{}, {}x{} {:?}, {} bytes)",
            self.device,
            self.sequence,
            self.width,
            self.height,
            self.format,
            self.pixels.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_frame_tagged_with_device() {
        let frame = Frame::rgb(vec![7u8; 320 * 240 * 3], 320, 240, 5).with_device(2);

        assert_eq!(frame.expected_len(), 320 * 240 * 3);
        assert_eq!((frame.device(), frame.sequence()), (2, 5));
        assert_eq!(frame.format(), PixelFormat::Rgb8);
        assert!(frame.is_valid());
        assert_eq!(
            format!("{:?}", frame),
            "Frame(device 2 #5, 320x240 Rgb8, 230400 bytes)"
        );
    }

    #[test]
    fn test_short_buffer_is_invalid_but_not_empty() {
        let frame = Frame::rgb(vec![0u8; 100], 320, 240, 1);

        assert!(!frame.is_empty());
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_zero_dimensions_are_empty() {
        let frame = Frame::new(vec![1, 2, 3], 0, 1, PixelFormat::Gray8, 1);
        assert!(frame.is_empty());
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_grayscale_size() {
        let frame = Frame::new(vec![0u8; 16], 4, 4, PixelFormat::Gray8, 1);
        assert!(frame.is_valid());
    }
}
