use super::features::FeatureMatrix;
use crate::error::PredictError;
use ndarray::Array2;

/// Boolean grid with the same (height, width) as the source image; true = vegetation
pub type VegetationMask = Array2<bool>;

/// Raw per-row output of a pixel classifier
#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    /// Numeric outputs (probabilities, regression values or integer class ids)
    Scores(Vec<f32>),
    /// Categorical outputs, e.g. "veg" / "non_veg"
    Labels(Vec<String>),
}

impl Predictions {
    pub fn len(&self) -> usize {
        match self {
            Predictions::Scores(scores) => scores.len(),
            Predictions::Labels(labels) => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trait for trained pixel classifiers
/// Allows swapping the ONNX runtime for other backends or test doubles
pub trait PixelClassifier: Send + Sync {
    /// Predict one value per feature row
    ///
    /// # Arguments
    /// * `features` - Feature table with shape [pixels, FEATURE_COUNT]
    ///
    /// # Returns
    /// * One prediction per row, in row order
    fn predict(&self, features: &FeatureMatrix) -> Result<Predictions, PredictError>;

    /// Short human readable description used in logs
    fn name(&self) -> &str {
        "pixel-classifier"
    }
}
