use image::RgbImage;
use ndarray::Array2;

/// Number of per-pixel features fed to the classifier
pub const FEATURE_COUNT: usize = 9;

/// Substituted for zero channels and sums before dividing
pub const EPSILON: f32 = 1e-10;

/// Per-pixel feature table with shape [height * width, FEATURE_COUNT]
///
/// Columns: R, G, B, rr, rg, rb, G/R, G/B, B/R. Rows follow the image in row-major order.
pub type FeatureMatrix = Array2<f32>;

/// Build the feature table for every pixel of `image`
///
/// Steps:
/// 1. Convert channels to float, replacing exact zeros with [`EPSILON`]
/// 2. Normalized chromaticity: 3 * channel / (R + G + B)
/// 3. Pairwise ratios G/R, G/B, B/R
pub fn extract_features(image: &RgbImage) -> FeatureMatrix {
    let _span = tracing::debug_span!("extract_features").entered();

    let (width, height) = image.dimensions();
    let mut features = Array2::<f32>::zeros((width as usize * height as usize, FEATURE_COUNT));

    for (mut row, pixel) in features.rows_mut().into_iter().zip(image.pixels()) {
        let [r, g, b] = pixel.0.map(guard);
        let sum = guard_sum(r + g + b);

        row[0] = r;
        row[1] = g;
        row[2] = b;
        row[3] = 3.0 * r / sum;
        row[4] = 3.0 * g / sum;
        row[5] = 3.0 * b / sum;
        row[6] = g / r;
        row[7] = g / b;
        row[8] = b / r;
    }

    features
}

fn guard(channel: u8) -> f32 {
    if channel == 0 {
        EPSILON
    } else {
        channel as f32
    }
}

fn guard_sum(sum: f32) -> f32 {
    if sum == 0.0 {
        EPSILON
    } else {
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_feature_layout_for_plain_pixel() {
        let image = RgbImage::from_pixel(1, 1, Rgb([50, 100, 25]));
        let features = extract_features(&image);

        assert_eq!(features.dim(), (1, FEATURE_COUNT));
        let row = features.row(0);
        let expected = [50.0, 100.0, 25.0, 150.0 / 175.0, 300.0 / 175.0, 75.0 / 175.0, 2.0, 4.0, 0.5];
        for (col, (got, want)) in row.iter().zip(expected).enumerate() {
            assert!((got - want).abs() < 1e-5, "column {}: expected {}, got {}", col, want, got);
        }
    }

    #[test]
    fn test_chromaticity_sums_to_three() {
        let image = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 77]));
        let features = extract_features(&image);

        for row in features.rows() {
            let total = row[3] + row[4] + row[5];
            assert!((total - 3.0).abs() < 1e-4, "chromaticity summed to {}", total);
        }
    }

    #[test]
    fn test_zero_channels_stay_finite() {
        let image = RgbImage::from_fn(2, 2, |x, y| match (x, y) {
            (0, 0) => Rgb([0, 0, 0]),
            (1, 0) => Rgb([0, 255, 0]),
            (0, 1) => Rgb([255, 0, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let features = extract_features(&image);

        assert_eq!(features.nrows(), 4);
        assert!(features.iter().all(|v| v.is_finite()));
        // An all-black pixel is three equal epsilons
        let black = features.row(0);
        assert!((black[3] - 1.0).abs() < 1e-4);
        assert!((black[6] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_rows_follow_row_major_order() {
        let image = RgbImage::from_fn(3, 2, |x, y| Rgb([(y * 3 + x + 1) as u8, 1, 1]));
        let features = extract_features(&image);

        let reds: Vec<f32> = features.column(0).to_vec();
        assert_eq!(reds, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
