use image::RgbImage;
use std::fmt;

/// Dimensions of a rendered frame, in the order the pixel buffer is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameShape {
    pub height: u32,
    pub width: u32,
    pub channels: u8,
}

impl FrameShape {
    pub fn new(height: u32, width: u32, channels: u8) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Number of samples a buffer of this shape holds.
    pub fn len(&self) -> usize {
        self.height as usize * self.width as usize * self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.height, self.width, self.channels)
    }
}

/// A rendered image: height × width × channel samples, row-major, interleaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    shape: FrameShape,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(shape: FrameShape, data: Vec<u8>) -> Result<Self, FrameError> {
        if shape.is_empty() {
            return Err(FrameError::EmptyDimension(shape));
        }
        if data.len() != shape.len() {
            return Err(FrameError::LengthMismatch {
                shape,
                expected: shape.len(),
                got: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// A frame filled with a single value.
    pub fn filled(shape: FrameShape, value: u8) -> Result<Self, FrameError> {
        Self::new(shape, vec![value; shape.len()])
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn height(&self) -> u32 {
        self.shape.height
    }

    pub fn width(&self) -> u32 {
        self.shape.width
    }

    pub fn channels(&self) -> u8 {
        self.shape.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns `None` unless the frame has exactly three channels.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.shape.channels != 3 {
            return None;
        }
        RgbImage::from_raw(self.shape.width, self.shape.height, self.data.clone())
    }
}

impl TryFrom<RgbImage> for Frame {
    type Error = FrameError;

    fn try_from(img: RgbImage) -> Result<Self, FrameError> {
        let shape = FrameShape::new(img.height(), img.width(), 3);
        Self::new(shape, img.into_raw())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame shape {0} has a zero dimension")]
    EmptyDimension(FrameShape),
    #[error("frame of shape {shape} needs {expected} samples, got {got}")]
    LengthMismatch {
        shape: FrameShape,
        expected: usize,
        got: usize,
    },
}
