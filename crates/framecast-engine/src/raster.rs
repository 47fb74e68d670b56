//! Input raster handed to the senders by the frame producer.
//!
//! The producer owns the raster; senders only borrow it for the duration of one
//! `send_image` call and never keep a reference to its pixel buffer.

use crate::error::EngineError;

/// Channel layout of a raster's pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelMode {
    /// 8-bit luminance.
    L,
    /// 8-bit luminance + alpha.
    La,
    Rgb,
    Rgba,
}

impl PixelMode {
    pub fn channels(self) -> usize {
        match self {
            PixelMode::L => 1,
            PixelMode::La => 2,
            PixelMode::Rgb => 3,
            PixelMode::Rgba => 4,
        }
    }
}

/// A tightly packed 8-bit raster, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    mode: PixelMode,
    data: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, mode: PixelMode, data: Vec<u8>) -> Result<Self, EngineError> {
        let expected = (width as usize) * (height as usize) * mode.channels();
        if data.len() != expected {
            return Err(EngineError::InvalidRaster {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, mode, data })
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, EngineError> {
        Self::new(width, height, PixelMode::Rgba, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mode(&self) -> PixelMode {
        self.mode
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}
