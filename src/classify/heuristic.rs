use super::types::VegetationMask;
use image::RgbImage;

/// Minimum green intensity (exclusive) for a pixel to count as vegetation
pub const GREEN_FLOOR: u8 = 80;

/// Green-dominance rule: G > R, G > B and G > [`GREEN_FLOOR`]
pub fn is_vegetation(r: u8, g: u8, b: u8) -> bool {
    g > r && g > b && g > GREEN_FLOOR
}

/// Classify every pixel with the green-dominance rule
pub fn classify_heuristic(image: &RgbImage) -> VegetationMask {
    let _span = tracing::debug_span!("classify_heuristic").entered();

    let (width, height) = image.dimensions();
    VegetationMask::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let [r, g, b] = image.get_pixel(x as u32, y as u32).0;
        is_vegetation(r, g, b)
    })
}
