mod features;
mod heuristic;
mod model;
pub mod types;

pub use features::{extract_features, FeatureMatrix, EPSILON, FEATURE_COUNT};
pub use heuristic::{classify_heuristic, is_vegetation, GREEN_FLOOR};
pub use model::{classify_with_model, predictions_to_mask, SCORE_THRESHOLD, VEGETATION_LABEL};
pub use types::{PixelClassifier, Predictions, VegetationMask};

use crate::error::PredictError;
use image::RgbImage;
use std::sync::Arc;

/// How a single image gets classified
#[derive(Clone)]
pub enum Strategy {
    /// Trained model over per-pixel features
    Model(Arc<dyn PixelClassifier>),
    /// Green-dominance rule, needs neither features nor a model
    Heuristic,
}

impl Strategy {
    pub fn classify(&self, image: &RgbImage) -> Result<VegetationMask, PredictError> {
        match self {
            Strategy::Model(model) => {
                let (width, height) = image.dimensions();
                let features = extract_features(image);
                classify_with_model(model.as_ref(), &features, (height as usize, width as usize))
            }
            Strategy::Heuristic => Ok(classify_heuristic(image)),
        }
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Model(model) => write!(f, "Model({})", model.name()),
            Strategy::Heuristic => write!(f, "Heuristic"),
        }
    }
}
