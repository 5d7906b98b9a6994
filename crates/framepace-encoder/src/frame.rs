//! Raw image frames.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit red, green, blue, alpha.
    Rgba,

    /// 8-bit blue, green, red, alpha.
    Bgra,

    /// 8-bit red, green, blue.
    Rgb,

    /// 8-bit luminance.
    Gray,
}

impl PixelFormat {
    /// Bytes used by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba | Self::Bgra => 4,
            Self::Rgb => 3,
            Self::Gray => 1,
        }
    }

    /// Name of the format in ffmpeg's `-pix_fmt` vocabulary.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Rgb => "rgb24",
            Self::Gray => "gray",
        }
    }

    /// Bytes used by a tightly packed `width` x `height` image.
    pub fn frame_len(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// An immutable image buffer.
///
/// Cloning a frame shares the pixel storage; the storage is released when
/// the last clone is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Pixel data, row-major, no padding.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Layout of `data`.
    pub format: PixelFormat,
}

impl Frame {
    /// Create a frame by copying `pixels`.
    pub fn new(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Self {
        Self::from_bytes(Bytes::copy_from_slice(pixels), width, height, format)
    }

    /// Create a frame that adopts an existing buffer.
    pub fn from_bytes(data: Bytes, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// A frame with no pixel storage.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new(), 0, 0, PixelFormat::Rgba)
    }

    /// Whether the frame holds any pixel data.
    pub fn is_allocated(&self) -> bool {
        !self.data.is_empty()
    }

    /// Total length of the pixel buffer.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Buffer length implied by the dimensions and format.
    pub fn expected_len(&self) -> usize {
        self.format.frame_len(self.width, self.height)
    }

    /// Whether the buffer is exactly `width * height` pixels of `format`.
    pub fn matches_layout(&self, width: u32, height: u32, format: PixelFormat) -> bool {
        self.width == width
            && self.height == height
            && self.format == format
            && self.byte_len() == self.expected_len()
    }

    /// Raw pixel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(PixelFormat::Rgba.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Bgra.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgb.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Gray.bytes_per_pixel(), 1);
    }

    #[test]
    fn test_frame_layout() {
        let frame = Frame::new(&[7u8; 2 * 3 * 4], 2, 3, PixelFormat::Rgba);
        assert!(frame.is_allocated());
        assert_eq!(frame.byte_len(), 24);
        assert_eq!(frame.expected_len(), 24);
        assert!(frame.matches_layout(2, 3, PixelFormat::Rgba));
        assert!(!frame.matches_layout(3, 2, PixelFormat::Rgba));
        assert!(!frame.matches_layout(2, 3, PixelFormat::Rgb));
    }

    #[test]
    fn test_empty_frame_is_not_allocated() {
        assert!(!Frame::empty().is_allocated());
        assert!(!Frame::new(&[], 640, 480, PixelFormat::Rgba).is_allocated());
    }

    #[test]
    fn test_clone_shares_storage() {
        let frame = Frame::new(&[1, 2, 3, 4], 1, 1, PixelFormat::Rgba);
        let copy = frame.clone();
        assert_eq!(frame.as_bytes().as_ptr(), copy.as_bytes().as_ptr());
        assert_eq!(frame, copy);
    }
}
