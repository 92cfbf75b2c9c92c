mod onnx;
mod pool;
mod provider;

pub use onnx::OnnxClassifier;
pub use pool::Pool;
pub use provider::{default_candidates, ModelProvider, ModelSource, DEFAULT_MODEL_FILE};
