//! Scan tensor shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape metadata for a batched single-channel scan tensor `(B, C, H, W)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanShape {
    /// Batch size.
    pub batch: usize,
    /// Number of channels.
    pub channels: usize,
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
}

impl ScanShape {
    /// Create a new shape.
    pub fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// Shape of a single grayscale scan of the given square size.
    pub fn single_gray(size: usize) -> Self {
        Self::new(1, 1, size, size)
    }

    /// Shape as a dims array, matching `Tensor::dims`.
    pub fn dims(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Check that actual tensor dims match this shape.
    pub fn validate(&self, dims: [usize; 4]) -> Result<()> {
        if dims != self.dims() {
            return Err(CoreError::InvalidShape {
                expected: format!("{:?}", self.dims()),
                got: format!("{:?}", dims),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for ScanShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.batch, self.channels, self.height, self.width
        )
    }
}
