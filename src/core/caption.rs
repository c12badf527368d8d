use crate::core::resolution::DecodeError;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("Failed to prepare image for captioning: {0}")]
    Encode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Captioner {program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Captioner returned an empty caption")]
    Empty,
}

/// Produces a short English caption for a decoded image.
pub trait Captioner {
    fn caption(&self, image: &DynamicImage) -> Result<String, CaptionError>;
}

impl<F> Captioner for F
where
    F: Fn(&DynamicImage) -> Result<String, CaptionError>,
{
    fn caption(&self, image: &DynamicImage) -> Result<String, CaptionError> {
        self(image)
    }
}

/// Open and fully decode an image, converted to RGB.
pub fn load_rgb(path: &Path) -> Result<DynamicImage, DecodeError> {
    let image = ImageReader::open(path)
        .map_err(|source| DecodeError::Io {
            path: path.display().to_string(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| DecodeError::Io {
            path: path.display().to_string(),
            source,
        })?
        .decode()
        .map_err(|source| DecodeError::Image {
            path: path.display().to_string(),
            source,
        })?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Runs an external captioning program once per image.
///
/// The image is written to a temporary JPEG whose path is appended as the
/// last argument; the trimmed stdout is the caption.
pub struct CommandCaptioner {
    program: PathBuf,
    args: Vec<String>,
    max_dimension: u32,
}

impl CommandCaptioner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            max_dimension: 768,
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    fn downscale<'a>(&self, image: &'a DynamicImage) -> Cow<'a, DynamicImage> {
        let (w, h) = image.dimensions();
        if w.max(h) <= self.max_dimension {
            Cow::Borrowed(image)
        } else {
            Cow::Owned(image.resize(self.max_dimension, self.max_dimension, FilterType::CatmullRom))
        }
    }
}

impl Captioner for CommandCaptioner {
    fn caption(&self, image: &DynamicImage) -> Result<String, CaptionError> {
        let scaled = self.downscale(image);
        let tmp = tempfile::Builder::new()
            .prefix("stockmeta-")
            .suffix(".jpg")
            .tempfile()?;
        DynamicImage::ImageRgb8(scaled.to_rgb8()).save_with_format(tmp.path(), ImageFormat::Jpeg)?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(tmp.path())
            .output()?;

        if !output.status.success() {
            return Err(CaptionError::Failed {
                program: self.program.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let caption = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if caption.is_empty() {
            return Err(CaptionError::Empty);
        }
        Ok(caption)
    }
}
