use std::io::ErrorKind;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use tracing::{debug, trace};

use crate::domain::FixError;

/// Decode the image at `path`, normalized to RGB8. A missing file is a
/// recoverable `NotFound`, never a crash, and touches no other state.
pub fn open(path: &Path) -> Result<DynamicImage, FixError> {
    let reader = ImageReader::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FixError::NotFound(path.to_path_buf()),
        _ => FixError::Io(e),
    })?;
    let image = reader.decode()?;
    trace!("Decoded {} ({}x{})", path.display(), image.width(), image.height());
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

/// Rotate by a multiple of 90 degrees, expanding the canvas so nothing is
/// clipped. Other angles are a caller bug, not a user error.
pub fn rotate(image: &DynamicImage, degrees: i32) -> Result<DynamicImage, FixError> {
    let turns = degrees.rem_euclid(360);
    match turns {
        0 => Ok(image.clone()),
        90 => Ok(image.rotate90()),
        180 => Ok(image.rotate180()),
        270 => Ok(image.rotate270()),
        _ => Err(FixError::InvalidArgument(format!(
            "rotation must be a multiple of 90 degrees, got {degrees}"
        ))),
    }
}

/// Scale to the largest size that fits in `container` while preserving the
/// aspect ratio: a proportionally wider image is scaled to the container
/// width, a taller one to its height.
pub fn fit(image: &DynamicImage, container: (u32, u32)) -> DynamicImage {
    let (width, height) = (container.0.max(1), container.1.max(1));
    let fitted = image.resize(width, height, FilterType::Triangle);
    debug!(
        "Fit {}x{} into {}x{} -> {}x{}",
        image.width(),
        image.height(),
        width,
        height,
        fitted.width(),
        fitted.height()
    );
    fitted
}
