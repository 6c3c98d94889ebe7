use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use crate::config::ImageSettings;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Image is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("No image data was uploaded")]
    Empty,
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Raw upload as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

/// Bounded, re-encoded image handed to the validator and classifier.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl NormalizedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    pub fn was_resized(&self) -> bool {
        self.width != self.original_width || self.height != self.original_height
    }
}

pub fn normalize(
    image: &UploadedImage,
    settings: &ImageSettings,
) -> Result<NormalizedImage, PreprocessError> {
    let mime_type = image.mime_type.trim().to_ascii_lowercase();
    if !mime_type.starts_with("image/") {
        return Err(PreprocessError::UnsupportedType(mime_type));
    }
    if image.bytes.is_empty() {
        return Err(PreprocessError::Empty);
    }
    if image.bytes.len() > settings.max_upload_bytes {
        return Err(PreprocessError::TooLarge {
            size: image.bytes.len(),
            limit: settings.max_upload_bytes,
        });
    }

    let format = ImageFormat::from_mime_type(&mime_type)
        .or_else(|| image::guess_format(&image.bytes).ok())
        .ok_or_else(|| PreprocessError::UnsupportedType(mime_type.clone()))?;

    let decoded = image::load_from_memory_with_format(&image.bytes, format)
        .map_err(|e| PreprocessError::Decode(e.to_string()))?;
    let (width, height) = decoded.dimensions();
    let file_name = image
        .file_name
        .clone()
        .unwrap_or_else(|| format!("upload.{}", format.extensions_str().first().unwrap_or(&"img")));

    let (target_width, target_height) = match scaled_dimensions(width, height, settings.max_edge) {
        Some(target) => target,
        None => {
            log::debug!("Image {}x{} within {}px, passing through", width, height, settings.max_edge);
            return Ok(NormalizedImage {
                bytes: image.bytes.clone(),
                mime_type,
                file_name,
                width,
                height,
                original_width: width,
                original_height: height,
            });
        }
    };

    let resized = decoded.resize_exact(target_width, target_height, FilterType::Triangle);
    let bytes = encode(&resized, format, settings.jpeg_quality)?;

    log::info!(
        "Normalized image {}x{} -> {}x{} ({} -> {} bytes)",
        width,
        height,
        target_width,
        target_height,
        image.bytes.len(),
        bytes.len()
    );

    Ok(NormalizedImage {
        bytes,
        mime_type,
        file_name,
        width: target_width,
        height: target_height,
        original_width: width,
        original_height: height,
    })
}

/// Target size for a uniform downscale, or `None` when the image already fits.
///
/// The factor is `min(max_edge / width, max_edge / height)`, applied in integer
/// arithmetic so the longest edge lands exactly on `max_edge`.
fn scaled_dimensions(width: u32, height: u32, max_edge: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_edge {
        return None;
    }
    let scale = |edge: u32| ((edge as u64 * max_edge as u64 / longest as u64) as u32).max(1);
    Some((scale(width), scale(height)))
}

fn encode(image: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>, PreprocessError> {
    let mut buffer = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| PreprocessError::Encode(e.to_string()))?;
        }
        other => {
            image
                .write_to(&mut buffer, other)
                .map_err(|e| PreprocessError::Encode(e.to_string()))?;
        }
    }
    Ok(buffer.into_inner())
}
