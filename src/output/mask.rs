use crate::classify::VegetationMask;
use crate::error::{CoverageError, MaskWriteSource, Result};
use image::error::{ImageFormatHint, UnsupportedError, UnsupportedErrorKind};
use image::{DynamicImage, GrayImage, ImageError, ImageFormat, Luma, Rgb, RgbImage};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Mask value for vegetation pixels
pub const MASK_ON: u8 = 255;
/// Mask value for everything else
pub const MASK_OFF: u8 = 0;

/// Overlay color for vegetation pixels
pub const OVERLAY_VEGETATION: Rgb<u8> = Rgb([0, 255, 0]);
/// Overlay color for non-vegetation pixels
pub const OVERLAY_BACKGROUND: Rgb<u8> = Rgb([255, 255, 0]);

/// Convert a mask into an 8-bit single channel image (255 = vegetation)
pub fn mask_to_gray(mask: &VegetationMask) -> GrayImage {
    let (height, width) = mask.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        if mask[[y as usize, x as usize]] {
            Luma([MASK_ON])
        } else {
            Luma([MASK_OFF])
        }
    })
}

/// Convert a mask into a two-color RGB visualization
pub fn mask_to_overlay(mask: &VegetationMask) -> RgbImage {
    let (height, width) = mask.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        if mask[[y as usize, x as usize]] {
            OVERLAY_VEGETATION
        } else {
            OVERLAY_BACKGROUND
        }
    })
}

/// Write `mask` as a 0/255 grayscale image at `output_path`
///
/// The encoding follows the file extension and must be lossless (PNG, BMP, TIFF...); lossy
/// formats such as JPEG are rejected before anything is written. Parent directories are
/// created, and the file only appears at `output_path` once it has been fully written.
pub fn render_mask<P: AsRef<Path>>(mask: &VegetationMask, output_path: P) -> Result<PathBuf> {
    let path = output_path.as_ref();
    let _span = tracing::debug_span!("render_mask", path = %path.display()).entered();

    let format = output_format(path)?;
    if is_lossy(format) {
        return Err(CoverageError::mask_write(path, lossy_format_error(format)));
    }

    publish(&DynamicImage::ImageLuma8(mask_to_gray(mask)), path, format)?;
    Ok(path.to_path_buf())
}

/// Write the green/yellow visualization of `mask` at `output_path`
pub fn render_overlay<P: AsRef<Path>>(mask: &VegetationMask, output_path: P) -> Result<PathBuf> {
    let path = output_path.as_ref();
    let _span = tracing::debug_span!("render_overlay", path = %path.display()).entered();

    let format = output_format(path)?;
    publish(&DynamicImage::ImageRgb8(mask_to_overlay(mask)), path, format)?;
    Ok(path.to_path_buf())
}

fn output_format(path: &Path) -> Result<ImageFormat> {
    ImageFormat::from_path(path).map_err(|err| CoverageError::mask_write(path, err))
}

/// Formats whose encoders may alter pixel values
fn is_lossy(format: ImageFormat) -> bool {
    matches!(format, ImageFormat::Jpeg | ImageFormat::Avif)
}

fn lossy_format_error(format: ImageFormat) -> ImageError {
    ImageError::Unsupported(UnsupportedError::from_format_and_kind(
        ImageFormatHint::Exact(format),
        UnsupportedErrorKind::GenericFeature("lossy encoding of a binary mask".to_string()),
    ))
}

/// Encode into a temporary sibling file, then rename it over `path`
fn publish(image: &DynamicImage, path: &Path, format: ImageFormat) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|err| CoverageError::mask_write(path, err))?;

    let mut tmp = temp_file_in(dir).map_err(|err| CoverageError::mask_write(path, err))?;
    encode(image, format, &mut tmp).map_err(|err| CoverageError::mask_write(path, err))?;

    tmp.persist(path)
        .map_err(|err| CoverageError::mask_write(path, err.error))?;

    tracing::debug!("Wrote {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}

fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    tmp: &mut NamedTempFile,
) -> std::result::Result<(), MaskWriteSource> {
    let mut writer = BufWriter::new(tmp.as_file_mut());
    image.write_to(&mut writer, format)?;
    writer.flush()?;
    drop(writer);
    tmp.as_file().sync_all()?;
    Ok(())
}

fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".vegcover-").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    builder.tempfile_in(dir)
}
