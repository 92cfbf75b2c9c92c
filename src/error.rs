use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of [`crate::CoverageEstimator::compute_coverage`]
#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("Failed to read image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write mask {}: {source}", path.display())]
    MaskWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl CoverageError {
    pub(crate) fn mask_write(path: impl Into<PathBuf>, source: impl Into<MaskWriteSource>) -> Self {
        Self::MaskWrite {
            path: path.into(),
            source: source.into().0,
        }
    }
}

/// Normalizes io and codec failures while writing a mask into one `ImageError`
pub(crate) struct MaskWriteSource(image::ImageError);

impl From<image::ImageError> for MaskWriteSource {
    fn from(err: image::ImageError) -> Self {
        Self(err)
    }
}

impl From<std::io::Error> for MaskWriteSource {
    fn from(err: std::io::Error) -> Self {
        Self(image::ImageError::IoError(err))
    }
}

/// A model candidate that exists but could not be turned into a classifier
#[derive(Error, Debug)]
#[error("Failed to load model from {}", path.display())]
pub struct ModelLoadError {
    pub path: PathBuf,
    #[source]
    pub source: anyhow::Error,
}

/// The loaded model could not produce a usable mask for one request
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Inference failed: {0:#}")]
    Inference(#[from] anyhow::Error),

    #[error("Unsupported model output: {0}")]
    UnsupportedOutput(String),

    #[error("Expected {expected} predictions, model returned {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Model session lock poisoned")]
    SessionPoisoned,
}

pub type Result<T> = std::result::Result<T, CoverageError>;
