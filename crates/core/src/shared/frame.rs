use std::sync::Arc;

use ndarray::ArrayView3;
use thiserror::Error;

/// Pixel buffer length disagrees with the declared dimensions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{width}x{height}x{channels} frame needs {expected} bytes, got {actual}")]
pub struct FrameLayoutError {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub expected: usize,
    pub actual: usize,
}

/// A single decoded image or video frame: contiguous RGB bytes in row-major order.
///
/// Frames are immutable once produced. `index` is the position in the
/// original input list (images) or the decoded-frame counter (video), and
/// `source` names the file the frame came from, when there is one.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    source: Option<Arc<str>>,
}

impl Frame {
    /// Wraps a buffer without checking its length; decoders size it from the
    /// dimensions. Caller-supplied buffers go through [`Frame::try_new`].
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            channels,
            index,
            source: None,
        }
    }

    /// Like [`Frame::new`], rejecting a buffer of the wrong length.
    pub fn try_new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Result<Self, FrameLayoutError> {
        check_layout(data.len(), width, height, channels)?;
        Ok(Self::new(data, width, height, channels, index))
    }

    /// Verifies the buffer covers `width * height * channels` bytes.
    pub fn check_layout(&self) -> Result<(), FrameLayoutError> {
        check_layout(self.data.len(), self.width, self.height, self.channels)
    }

    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    /// Returns a copy tagged with a new index, sharing the pixel buffer.
    pub fn with_index(&self, index: usize) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }

    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
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
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// `(height, width)`, the pair batches must agree on.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels into an `image` buffer for crate-level image ops.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        if self.channels != 3 {
            return None;
        }
        image::RgbImage::from_raw(self.width, self.height, self.data.to_vec())
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

fn check_layout(actual: usize, width: u32, height: u32, channels: u8) -> Result<(), FrameLayoutError> {
    let expected = (width as usize) * (height as usize) * (channels as usize);
    if actual != expected {
        return Err(FrameLayoutError {
            width,
            height,
            channels,
            expected,
            actual,
        });
    }
    Ok(())
}
