use super::pool::Pool;
use crate::classify::{FeatureMatrix, PixelClassifier, Predictions, FEATURE_COUNT};
use crate::error::PredictError;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DynValue, Tensor};
use std::path::Path;

/// Pixel classifier exported to ONNX (e.g. a scikit-learn RandomForest via skl2onnx)
///
/// Expects a single float input of shape [N, 9]. The first output holds one prediction per
/// row: a label tensor for classifiers or a value tensor for regressors.
///
/// Running a session needs exclusive access, so several sessions over the same graph are
/// kept and each request borrows a free one.
pub struct OnnxClassifier {
    sessions: Pool<Session>,
    name: String,
}

impl OnnxClassifier {
    /// Load a classifier from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `sessions` - Number of sessions serving concurrent requests (at least one)
    /// * `intra_threads` - Per-session parallelism hint; ignored if the runtime rejects it
    pub fn load<P: AsRef<Path>>(model_path: P, sessions: usize, intra_threads: usize) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading pixel classifier from {}", path.display());

        let sessions = (0..sessions.max(1))
            .map(|_| {
                session_builder(intra_threads)?
                    .commit_from_file(path)
                    .with_context(|| format!("Failed to load model from {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        let count = sessions.len();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::info!(
            "Pixel classifier {} loaded: {} sessions, {} intra-op threads each",
            name,
            count,
            intra_threads
        );

        Ok(Self {
            sessions: Pool::new(sessions),
            name,
        })
    }
}

/// Session builder with the thread hint applied when the runtime accepts it
fn session_builder(intra_threads: usize) -> Result<ort::session::builder::SessionBuilder> {
    let builder = Session::builder()
        .context("Failed to create session builder")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?;

    match builder.with_intra_threads(intra_threads) {
        Ok(builder) => Ok(builder),
        Err(err) => {
            tracing::warn!("Ignoring thread hint {}: {}", intra_threads, err);
            Ok(Session::builder()
                .context("Failed to create session builder")?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .context("Failed to set optimization level")?)
        }
    }
}

impl PixelClassifier for OnnxClassifier {
    fn predict(&self, features: &FeatureMatrix) -> Result<Predictions, PredictError> {
        let _span = tracing::debug_span!("onnx_predict", rows = features.nrows()).entered();

        if features.ncols() != FEATURE_COUNT {
            return Err(PredictError::ShapeMismatch {
                expected: FEATURE_COUNT,
                actual: features.ncols(),
            });
        }

        let shape = [features.nrows(), FEATURE_COUNT];
        let data: Vec<f32> = features.iter().copied().collect();
        let input = Tensor::from_array((shape.as_slice(), data.into_boxed_slice()))
            .context("Failed to build input tensor")?;

        let mut session = self.sessions.acquire().ok_or(PredictError::SessionPoisoned)?;
        let outputs = session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;

        if outputs.len() == 0 {
            return Err(PredictError::UnsupportedOutput("model produced no outputs".to_string()));
        }
        extract_predictions(&outputs[0])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Read the first output as numbers if possible, otherwise as strings
fn extract_predictions(value: &DynValue) -> Result<Predictions, PredictError> {
    if let Ok((_, data)) = value.try_extract_tensor::<f32>() {
        return Ok(Predictions::Scores(data.to_vec()));
    }
    if let Ok((_, data)) = value.try_extract_tensor::<f64>() {
        return Ok(Predictions::Scores(data.iter().map(|&v| v as f32).collect()));
    }
    if let Ok((_, data)) = value.try_extract_tensor::<i64>() {
        return Ok(Predictions::Scores(data.iter().map(|&v| v as f32).collect()));
    }
    if let Ok((_, data)) = value.try_extract_tensor::<i32>() {
        return Ok(Predictions::Scores(data.iter().map(|&v| v as f32).collect()));
    }
    if let Ok((_, labels)) = value.try_extract_strings() {
        return Ok(Predictions::Labels(labels));
    }

    Err(PredictError::UnsupportedOutput(format!("{:?}", value.dtype())))
}
