use super::features::FeatureMatrix;
use super::types::{PixelClassifier, Predictions, VegetationMask};
use crate::error::PredictError;

/// Class label the trained model emits for vegetation pixels
pub const VEGETATION_LABEL: &str = "veg";

/// Scores strictly above this are vegetation
pub const SCORE_THRESHOLD: f32 = 0.5;

/// Run `model` over `features` and fold its output into a mask of `shape` (height, width)
pub fn classify_with_model(
    model: &dyn PixelClassifier,
    features: &FeatureMatrix,
    shape: (usize, usize),
) -> Result<VegetationMask, PredictError> {
    let _span = tracing::debug_span!("classify_with_model", model = model.name()).entered();

    let predictions = model.predict(features)?;
    predictions_to_mask(predictions, shape)
}

/// Normalize numeric or categorical predictions into a boolean mask
pub fn predictions_to_mask(
    predictions: Predictions,
    shape: (usize, usize),
) -> Result<VegetationMask, PredictError> {
    let expected = shape.0 * shape.1;
    let actual = predictions.len();
    if actual != expected {
        return Err(PredictError::ShapeMismatch { expected, actual });
    }

    let flat: Vec<bool> = match predictions {
        Predictions::Scores(scores) => scores.into_iter().map(|s| s > SCORE_THRESHOLD).collect(),
        Predictions::Labels(labels) => labels.iter().map(|l| l == VEGETATION_LABEL).collect(),
    };

    VegetationMask::from_shape_vec(shape, flat)
        .map_err(|_| PredictError::ShapeMismatch { expected, actual })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FEATURE_COUNT;
    use ndarray::Array2;

    struct FixedModel(Predictions);

    impl PixelClassifier for FixedModel {
        fn predict(&self, _features: &FeatureMatrix) -> Result<Predictions, PredictError> {
            Ok(self.0.clone())
        }
    }

    fn features(rows: usize) -> FeatureMatrix {
        Array2::zeros((rows, FEATURE_COUNT))
    }

    #[test]
    fn test_scores_threshold_is_strict() {
        let model = FixedModel(Predictions::Scores(vec![0.9, 0.5, 0.51, 0.0]));
        let mask = classify_with_model(&model, &features(4), (2, 2)).unwrap();

        assert_eq!(mask.iter().copied().collect::<Vec<_>>(), vec![true, false, true, false]);
    }

    #[test]
    fn test_labels_match_vegetation_literal() {
        let labels = ["veg", "non_veg", "VEG", "veg"].map(String::from).to_vec();
        let model = FixedModel(Predictions::Labels(labels));
        let mask = classify_with_model(&model, &features(4), (1, 4)).unwrap();

        assert_eq!(mask.iter().copied().collect::<Vec<_>>(), vec![true, false, false, true]);
    }

    #[test]
    fn test_mask_is_reshaped_row_major() {
        let model = FixedModel(Predictions::Scores(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]));
        let mask = classify_with_model(&model, &features(6), (2, 3)).unwrap();

        assert_eq!(mask.dim(), (2, 3));
        assert!(mask[[0, 0]]);
        assert!(mask[[1, 2]]);
        assert!(!mask[[1, 0]]);
    }

    #[test]
    fn test_wrong_prediction_count_is_an_error() {
        let model = FixedModel(Predictions::Scores(vec![1.0; 3]));
        let err = classify_with_model(&model, &features(4), (2, 2)).unwrap_err();

        assert!(matches!(err, PredictError::ShapeMismatch { expected: 4, actual: 3 }));
    }
}
