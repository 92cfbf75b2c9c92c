use super::onnx::OnnxClassifier;
use crate::classify::PixelClassifier;
use crate::error::ModelLoadError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// File name looked up next to the executable and in the working directory
pub const DEFAULT_MODEL_FILE: &str = "random_forest_model.onnx";

/// Upper bound on sessions kept per loaded model
const MAX_SESSIONS: usize = 4;

/// Anything that can hand out the shared pixel classifier, if one is available
pub trait ModelSource: Send + Sync {
    fn model(&self) -> Option<Arc<dyn PixelClassifier>>;
}

/// Outcome of the one-time model lookup
enum ModelState {
    Loaded {
        model: Arc<dyn PixelClassifier>,
        path: PathBuf,
    },
    Unavailable,
}

type Loader = dyn Fn(&Path) -> Result<Arc<dyn PixelClassifier>, ModelLoadError> + Send + Sync;

/// Lazily resolves the pixel classifier from an ordered list of candidate files
///
/// Resolution runs once, on first use. Concurrent first callers wait for the same attempt and
/// all observe its outcome; later calls only read the cached state.
pub struct ModelProvider {
    candidates: Vec<PathBuf>,
    loader: Box<Loader>,
    state: OnceLock<ModelState>,
}

impl ModelProvider {
    /// Provider over the configured path followed by the conventional locations
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self::with_candidates(default_candidates(configured))
    }

    /// Provider that loads ONNX classifiers from `candidates`, in order
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self::with_loader(candidates, load_onnx)
    }

    /// Provider with a custom loader for each existing candidate
    pub fn with_loader<F>(candidates: Vec<PathBuf>, loader: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<dyn PixelClassifier>, ModelLoadError> + Send + Sync + 'static,
    {
        Self {
            candidates,
            loader: Box::new(loader),
            state: OnceLock::new(),
        }
    }

    /// Provider that never yields a model
    pub fn disabled() -> Self {
        Self::with_candidates(Vec::new())
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Path the cached model was loaded from, resolving it first if needed
    pub fn source_path(&self) -> Option<&Path> {
        match self.state() {
            ModelState::Loaded { path, .. } => Some(path.as_path()),
            ModelState::Unavailable => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state.get().is_some()
    }

    fn state(&self) -> &ModelState {
        self.state.get_or_init(|| self.resolve())
    }

    fn resolve(&self) -> ModelState {
        let _span = tracing::debug_span!("resolve_model").entered();

        for path in &self.candidates {
            if !path.is_file() {
                tracing::debug!("Model candidate {} not found", path.display());
                continue;
            }

            match (self.loader)(path) {
                Ok(model) => {
                    tracing::info!("Using pixel classifier from {}", path.display());
                    return ModelState::Loaded {
                        model,
                        path: path.clone(),
                    };
                }
                Err(err) => {
                    tracing::warn!("{:#}", anyhow::Error::new(err));
                }
            }
        }

        tracing::warn!("No usable pixel classifier found, falling back to green-dominance heuristic");
        ModelState::Unavailable
    }
}

impl ModelSource for ModelProvider {
    fn model(&self) -> Option<Arc<dyn PixelClassifier>> {
        match self.state() {
            ModelState::Loaded { model, .. } => Some(Arc::clone(model)),
            ModelState::Unavailable => None,
        }
    }
}

impl std::fmt::Debug for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.get() {
            None => "unresolved",
            Some(ModelState::Loaded { .. }) => "loaded",
            Some(ModelState::Unavailable) => "unavailable",
        };
        f.debug_struct("ModelProvider")
            .field("candidates", &self.candidates)
            .field("state", &state)
            .finish()
    }
}

/// Candidate order: configured path, next to the executable, working directory
pub fn default_candidates(configured: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = configured.into_iter().collect();

    if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        candidates.push(dir.join(DEFAULT_MODEL_FILE));
    }
    candidates.push(PathBuf::from(DEFAULT_MODEL_FILE));

    candidates
}

fn load_onnx(path: &Path) -> Result<Arc<dyn PixelClassifier>, ModelLoadError> {
    let (sessions, intra_threads) = session_layout(
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    );

    OnnxClassifier::load(path, sessions, intra_threads)
        .map(|model| Arc::new(model) as Arc<dyn PixelClassifier>)
        .map_err(|source| ModelLoadError {
            path: path.to_path_buf(),
            source,
        })
}

/// Split the available cores into concurrent sessions and threads per session
fn session_layout(cores: usize) -> (usize, usize) {
    let sessions = cores.clamp(1, MAX_SESSIONS);
    (sessions, (cores / sessions).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{FeatureMatrix, Predictions};
    use crate::error::PredictError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct ConstantModel(f32);

    impl PixelClassifier for ConstantModel {
        fn predict(&self, features: &FeatureMatrix) -> Result<Predictions, PredictError> {
            Ok(Predictions::Scores(vec![self.0; features.nrows()]))
        }
    }

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"model").unwrap();
        path
    }

    fn counting_loader(
        calls: Arc<AtomicUsize>,
        fail_on: Option<PathBuf>,
    ) -> impl Fn(&Path) -> Result<Arc<dyn PixelClassifier>, ModelLoadError> + Send + Sync + 'static {
        move |path: &Path| {
            calls.fetch_add(1, Ordering::SeqCst);
            if fail_on.as_deref() == Some(path) {
                return Err(ModelLoadError {
                    path: path.to_path_buf(),
                    source: anyhow::anyhow!("corrupt model"),
                });
            }
            Ok(Arc::new(ConstantModel(1.0)) as Arc<dyn PixelClassifier>)
        }
    }

    #[test]
    fn test_missing_candidates_are_skipped() {
        let dir = TempDir::new().unwrap();
        let present = touch(&dir, "model.onnx");
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ModelProvider::with_loader(
            vec![dir.path().join("absent.onnx"), present.clone()],
            counting_loader(calls.clone(), None),
        );

        assert!(provider.model().is_some());
        assert_eq!(provider.source_path(), Some(present.as_path()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_error_moves_to_next_candidate() {
        let dir = TempDir::new().unwrap();
        let broken = touch(&dir, "broken.onnx");
        let good = touch(&dir, "good.onnx");
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ModelProvider::with_loader(
            vec![broken.clone(), good.clone()],
            counting_loader(calls.clone(), Some(broken)),
        );

        assert!(provider.model().is_some());
        assert_eq!(provider.source_path(), Some(good.as_path()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unavailable_is_memoized() {
        let dir = TempDir::new().unwrap();
        let broken = touch(&dir, "broken.onnx");
        let calls = Arc::new(AtomicUsize::new(0));
        let provider =
            ModelProvider::with_loader(vec![broken.clone()], counting_loader(calls.clone(), Some(broken)));

        assert!(!provider.is_resolved());
        assert!(provider.model().is_none());
        assert!(provider.model().is_none());
        assert!(provider.is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loaded_model_is_shared() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "model.onnx");
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ModelProvider::with_loader(vec![path], counting_loader(calls.clone(), None));

        let first = provider.model().unwrap();
        let second = provider.model().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "model.onnx");
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ModelProvider::with_loader(vec![path], counting_loader(calls.clone(), None));

        let models: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| provider.model())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = models[0].as_ref().unwrap();
        assert!(models.iter().all(|m| Arc::ptr_eq(first, m.as_ref().unwrap())));
    }

    #[test]
    fn test_disabled_provider_has_no_model() {
        let provider = ModelProvider::disabled();
        assert!(provider.candidates().is_empty());
        assert!(provider.model().is_none());
        assert!(provider.source_path().is_none());
    }

    #[test]
    fn test_default_candidates_start_with_configured_path() {
        let candidates = default_candidates(Some(PathBuf::from("/opt/models/rf.onnx")));

        assert_eq!(candidates.first(), Some(&PathBuf::from("/opt/models/rf.onnx")));
        assert_eq!(candidates.last(), Some(&PathBuf::from(DEFAULT_MODEL_FILE)));
        assert!(candidates.len() >= 2);
    }

    #[test]
    fn test_session_layout_spreads_cores() {
        assert_eq!(session_layout(1), (1, 1));
        assert_eq!(session_layout(3), (3, 1));
        assert_eq!(session_layout(8), (4, 2));
        assert_eq!(session_layout(0), (1, 1));
    }

    #[test]
    fn test_onnx_loader_rejects_garbage_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.onnx");
        std::fs::write(&path, b"not an onnx graph").unwrap();

        let err = load_onnx(&path).err().expect("garbage must not load");
        assert_eq!(err.path, path);
    }
}
