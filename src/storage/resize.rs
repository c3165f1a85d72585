use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use super::UploadError;

fn resizable_format(mime: &str) -> Option<ImageFormat> {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

/// Shrink a PNG or JPEG so its longest edge is at most `max_dimension`,
/// keeping the aspect ratio. Other formats, and images already small
/// enough, come back untouched.
pub fn fit_within_blocking(
    data: Bytes,
    mime: &str,
    max_dimension: u32,
) -> Result<Bytes, UploadError> {
    let Some(format) = resizable_format(mime) else {
        return Ok(data);
    };

    let img = image::load_from_memory_with_format(&data, format)
        .map_err(|e| UploadError::InvalidImage(e.to_string()))?;
    let (width, height) = img.dimensions();
    if width.max(height) <= max_dimension {
        return Ok(data);
    }

    let resized = img.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    // JPEG has no alpha channel
    let resized = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };

    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, format)
        .map_err(|e| UploadError::InvalidImage(e.to_string()))?;

    tracing::debug!(
        from_width = width,
        from_height = height,
        to_width = resized.width(),
        to_height = resized.height(),
        "Downscaled image"
    );
    Ok(Bytes::from(out.into_inner()))
}

/// [`fit_within_blocking`] on the blocking thread pool.
pub async fn fit_within(
    data: Bytes,
    mime: String,
    max_dimension: u32,
) -> Result<Bytes, UploadError> {
    tokio::task::spawn_blocking(move || fit_within_blocking(data, &mime, max_dimension))
        .await
        .map_err(|e| UploadError::InvalidImage(format!("image task failed: {}", e)))?
}
