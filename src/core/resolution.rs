use image::ImageReader;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read dimensions of {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Valid,
    TooSmall,
}

/// `width * height >= min_pixels` is valid; the boundary is inclusive.
pub fn classify(width: u32, height: u32, min_pixels: u64) -> Resolution {
    let pixels = u64::from(width) * u64::from(height);
    if pixels >= min_pixels {
        Resolution::Valid
    } else {
        Resolution::TooSmall
    }
}

/// Reads the pixel dimensions of an image without decoding the pixel data.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32), DecodeError> {
    let image_err = |source| DecodeError::Image {
        path: path.display().to_string(),
        source,
    };

    ImageReader::open(path)
        .map_err(|source| DecodeError::Io {
            path: path.display().to_string(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| DecodeError::Io {
            path: path.display().to_string(),
            source,
        })?
        .into_dimensions()
        .map_err(image_err)
}

pub struct ResolutionFilter {
    min_pixels: u64,
}

impl ResolutionFilter {
    pub fn new(min_pixels: u64) -> Self {
        Self { min_pixels }
    }

    pub fn inspect(&self, path: &Path) -> Result<Resolution, DecodeError> {
        let (width, height) = read_dimensions(path)?;
        Ok(classify(width, height, self.min_pixels))
    }
}
