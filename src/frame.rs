//! Visual payloads produced by the backend.
//!
//! A frame is either an encoded still image shipped as base64 text (rendered
//! through an `<img>` data URI) or a raw RGBA buffer blitted onto a canvas.
//! Frames are immutable once received; cloning only bumps a reference count.

use std::fmt;
use std::rc::Rc;

use crate::config::BYTES_PER_PIXEL;

/// One unit of visual output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Encoded(EncodedImage),
    Raw(RawFrame),
}

impl Frame {
    /// Shorthand for a base64 encoded image frame.
    pub fn encoded(format: &str, payload: impl Into<Rc<str>>) -> Self {
        Frame::Encoded(EncodedImage::new(format, payload))
    }

    pub fn as_encoded(&self) -> Option<&EncodedImage> {
        match self {
            Frame::Encoded(img) => Some(img),
            Frame::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&RawFrame> {
        match self {
            Frame::Raw(raw) => Some(raw),
            Frame::Encoded(_) => None,
        }
    }
}

/// A base64 payload together with the image format it encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    format: Rc<str>,
    payload: Rc<str>,
}

impl EncodedImage {
    pub fn new(format: &str, payload: impl Into<Rc<str>>) -> Self {
        Self {
            format: Rc::from(format),
            payload: payload.into(),
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// `data:image/<format>;base64,<payload>`, ready for an `<img src>`.
    pub fn data_uri(&self) -> String {
        format!("data:image/{};base64,{}", self.format, self.payload)
    }
}

/// Fixed-size RGBA pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    pixels: Rc<[u8]>,
}

impl RawFrame {
    /// Wraps `pixels`, rejecting buffers that are not exactly `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        let expected = expected_len(width, height);
        if pixels.len() != expected {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

// Pixel dumps are large; keep Debug output readable.
impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

fn expected_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::SizeMismatch {
                width,
                height,
                expected,
                actual,
            } => write!(
                f,
                "raw frame for {}x{} surface must be {} bytes, got {}",
                width, height, expected, actual
            ),
        }
    }
}

impl std::error::Error for FrameError {}
