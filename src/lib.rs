//! Vegetation coverage estimation for photographs.
//!
//! Every pixel is classified as vegetation or not, either by a trained ONNX pixel classifier
//! or, when none is available or it fails, by a green-dominance heuristic. The result is the
//! vegetation ratio plus a 0/255 mask image.

pub mod classify;
pub mod coverage;
pub mod error;
pub mod model;
pub mod output;

pub use classify::{Strategy, VegetationMask};
pub use coverage::{load_image, Coverage, CoverageEstimator, CoverageResult};
pub use error::{CoverageError, ModelLoadError, PredictError};
pub use model::{ModelProvider, ModelSource};
