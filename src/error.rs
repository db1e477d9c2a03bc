//! Error type shared by the editor core, I/O and the CLI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    /// The declared or sniffed type is not an accepted raster format.
    #[error("unsupported file type '{0}' (expected JPG, PNG, GIF, WebP or BMP)")]
    UnsupportedMime(String),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("image data is empty")]
    EmptyInput,

    #[error("image dimensions {width}x{height} exceed the {max}px limit")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("another edit is still running")]
    Busy,

    #[error("background edit panicked: {0}")]
    JobPanicked(String),

    #[error("unknown filter preset '{0}'")]
    UnknownPreset(String),

    #[error("invalid colour '{0}' (expected #rgb, #rrggbb or #rrggbbaa)")]
    InvalidColor(String),

    #[error("unknown interpolation '{0}' (expected nearest, bilinear, bicubic or lanczos3)")]
    UnknownInterpolation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for EditorError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => EditorError::Io(io),
            image::ImageError::Encoding(enc) => EditorError::Encode(enc.to_string()),
            other => EditorError::Decode(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
