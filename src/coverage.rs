use crate::classify::{classify_heuristic, Strategy, VegetationMask};
use crate::error::{CoverageError, Result};
use crate::model::{ModelProvider, ModelSource};
use crate::output::{render_mask, render_overlay};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result handed back to the caller of [`CoverageEstimator::compute_coverage`]
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageResult {
    /// Fraction of vegetation pixels, in [0, 1]
    pub ratio: f64,
    /// Where the 0/255 mask was written
    pub mask_path: PathBuf,
}

/// In-memory classification of one image
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub mask: VegetationMask,
    pub ratio: f64,
}

/// Vegetation coverage estimator
///
/// Holds the model source shared by every request. Cheap to share across threads; each call
/// works on its own image and mask.
#[derive(Clone)]
pub struct CoverageEstimator {
    models: Arc<dyn ModelSource>,
}

impl CoverageEstimator {
    pub fn new(models: Arc<dyn ModelSource>) -> Self {
        Self { models }
    }

    /// Estimator backed by a [`ModelProvider`] over the default candidate locations
    pub fn with_model_path(configured: Option<PathBuf>) -> Self {
        Self::new(Arc::new(ModelProvider::new(configured)))
    }

    /// Estimator that always uses the green-dominance heuristic
    pub fn heuristic_only() -> Self {
        Self::new(Arc::new(ModelProvider::disabled()))
    }

    /// Preferred strategy for the next image
    pub fn strategy(&self) -> Strategy {
        match self.models.model() {
            Some(model) => Strategy::Model(model),
            None => Strategy::Heuristic,
        }
    }

    /// Classify `image`, falling back to the heuristic if the model fails on it
    pub fn estimate(&self, image: &RgbImage) -> Coverage {
        let _span = tracing::debug_span!("estimate", width = image.width(), height = image.height())
            .entered();

        let strategy = self.strategy();
        let mask = match strategy.classify(image) {
            Ok(mask) => mask,
            Err(err) => {
                tracing::warn!("{:?} failed, using heuristic for this image: {}", strategy, err);
                classify_heuristic(image)
            }
        };

        let ratio = coverage_ratio(&mask);
        Coverage { mask, ratio }
    }

    /// Classify the image at `input` and write its mask to `output`
    ///
    /// # Errors
    /// * [`CoverageError::ImageRead`] if `input` cannot be decoded; nothing is written
    /// * [`CoverageError::MaskWrite`] if the mask cannot be written to `output`
    pub fn compute_coverage<P, Q>(&self, input: P, output: Q) -> Result<CoverageResult>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        self.compute_coverage_with_overlay(input, output, None::<&Path>)
    }

    /// Like [`compute_coverage`](Self::compute_coverage), also writing the green/yellow
    /// visualization to `overlay` when given
    ///
    /// The overlay is written before the mask, so a published mask always has its overlay.
    pub fn compute_coverage_with_overlay<P, Q, O>(
        &self,
        input: P,
        output: Q,
        overlay: Option<O>,
    ) -> Result<CoverageResult>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        O: AsRef<Path>,
    {
        let input = input.as_ref();
        let output = output.as_ref();
        let _span = tracing::info_span!("compute_coverage", input = %input.display()).entered();

        let image = load_image(input)?;
        let Coverage { mask, ratio } = self.estimate(&image);
        if let Some(overlay) = overlay {
            let overlay_path = render_overlay(&mask, overlay)?;
            tracing::info!("Overlay written to {}", overlay_path.display());
        }
        let mask_path = render_mask(&mask, output)?;

        tracing::info!("Coverage {:.4} written to {}", ratio, mask_path.display());
        Ok(CoverageResult { ratio, mask_path })
    }
}

impl std::fmt::Debug for CoverageEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageEstimator").finish_non_exhaustive()
    }
}

/// Decode the image at `path` into 8-bit RGB, detecting the format from its contents
///
/// The EXIF orientation, when present, is applied so the pixels are upright as displayed.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let _span = tracing::debug_span!("load_image", path = %path.display()).entered();

    let read_error = |source: ImageError| CoverageError::ImageRead {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = ImageReader::open(path)
        .map_err(|err| read_error(ImageError::IoError(err)))?
        .with_guessed_format()
        .map_err(|err| read_error(ImageError::IoError(err)))?
        .into_decoder()
        .map_err(read_error)?;

    let orientation = decoder.orientation().unwrap_or_else(|err| {
        tracing::debug!("Ignoring unreadable orientation: {}", err);
        Orientation::NoTransforms
    });
    let mut image = DynamicImage::from_decoder(decoder).map_err(read_error)?;
    if orientation != Orientation::NoTransforms {
        tracing::debug!("Applying {:?}", orientation);
        image.apply_orientation(orientation);
    }

    Ok(image.to_rgb8())
}

/// Fraction of true cells; an empty mask has no coverage
pub fn coverage_ratio(mask: &VegetationMask) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    let vegetation = mask.iter().filter(|&&v| v).count();
    vegetation as f64 / mask.len() as f64
}
