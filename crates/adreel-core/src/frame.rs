//! Frame buffer type for decoded video frames in CPU memory.
//!
//! Every frame in the pipeline is packed RGBA8 with no row padding, which is
//! what FFmpeg's `rawvideo`/`rgba` muxer produces and consumes.

use crate::error::{AdReelError, Result};

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A packed RGBA8 video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data, `width * height * 4` bytes
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a transparent black frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; frame_size(width, height)],
        }
    }

    /// Wrap raw RGBA bytes, checking the length matches the dimensions.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = frame_size(width, height);
        if data.len() != expected {
            return Err(AdReelError::InvalidParameter(format!(
                "RGBA buffer is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame filled with a single colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(frame_size(width, height));
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];
        let mut frame = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let bar = (x as usize * 8) / width.max(1) as usize;
                frame.put_pixel(x, y, BARS[bar.min(7)]);
            }
        }
        frame
    }

    /// True when the frame has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Same dimensions as `other`.
    pub fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Byte offset of pixel `(x, y)`.
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    /// Read one pixel. Out-of-range coordinates return transparent black.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 0];
        }
        let i = self.offset(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Write one pixel; out-of-range coordinates are ignored.
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    /// Check the buffer is non-empty and its length matches its dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(AdReelError::Decoder("frame has zero dimensions".into()));
        }
        if self.data.len() != frame_size(self.width, self.height) {
            return Err(AdReelError::Decoder(format!(
                "frame buffer holds {} bytes, expected {}",
                self.data.len(),
                frame_size(self.width, self.height)
            )));
        }
        Ok(())
    }

    /// Mean luma in `[0, 255]` (Rec.601 weights).
    pub fn mean_luma(&self) -> f32 {
        let pixels = self.data.len() / BYTES_PER_PIXEL;
        if pixels == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| luma(px[0], px[1], px[2]) as f64)
            .sum();
        (sum / pixels as f64) as f32
    }
}

/// Total bytes for an RGBA8 frame.
#[inline]
pub fn frame_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Rec.601 luma of an RGB triple.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}
