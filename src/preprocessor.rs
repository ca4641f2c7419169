//! Image preprocessing before upload to the inference API
//!
//! Uploads are size-checked, decoded, downscaled to a bounded dimension and
//! re-encoded as JPEG so every request carries a predictable payload.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::debug;

/// Input formats accepted from users
pub const SUPPORTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::WebP,
];

/// Reasons an upload cannot be normalized
#[derive(Debug, Error)]
pub enum ImageError {
    /// Payload exceeds the configured size cap
    #[error("image is {size} bytes, limit is {limit} bytes")]
    TooLarge {
        /// Size of the upload in bytes
        size: usize,
        /// Configured cap in bytes
        limit: usize,
    },
    /// Payload is not one of the supported formats or fails to decode
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    /// Re-encoding to JPEG failed
    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// Normalized JPEG ready for transmission
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// JPEG bytes
    pub bytes: Vec<u8>,
    /// Width in pixels after resizing
    pub width: u32,
    /// Height in pixels after resizing
    pub height: u32,
}

impl EncodedImage {
    /// MIME type of the encoded payload
    pub const MIME_TYPE: &'static str = "image/jpeg";

    /// Base64 data URL accepted by the chat-completions `image_url` part
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", Self::MIME_TYPE, BASE64.encode(&self.bytes))
    }
}

/// Validates and normalizes uploaded images
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    max_bytes: usize,
    max_dimension: u32,
    quality: u8,
}

impl ImagePreprocessor {
    /// Creates a preprocessor
    ///
    /// # Examples
    ///
    /// ```
    /// use treasure_hunter_bot::preprocessor::ImagePreprocessor;
    ///
    /// let preprocessor = ImagePreprocessor::new(10 * 1024 * 1024, 1024, 85);
    /// assert!(preprocessor.normalize(b"definitely not an image").is_err());
    /// ```
    #[must_use]
    pub const fn new(max_bytes: usize, max_dimension: u32, quality: u8) -> Self {
        Self {
            max_bytes,
            max_dimension,
            quality,
        }
    }

    /// Upload cap in whole megabytes, rounded up, as quoted to users
    #[must_use]
    pub const fn max_megabytes(&self) -> usize {
        self.max_bytes.div_ceil(1024 * 1024)
    }

    /// Decode `raw`, bound its dimensions and re-encode it as JPEG.
    ///
    /// This is CPU-bound; async callers should run it on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::TooLarge` for oversized payloads,
    /// `ImageError::UnsupportedFormat` if the bytes are not a supported,
    /// decodable image, and `ImageError::Encode` if re-encoding fails.
    pub fn normalize(&self, raw: &[u8]) -> Result<EncodedImage, ImageError> {
        if raw.len() > self.max_bytes {
            return Err(ImageError::TooLarge {
                size: raw.len(),
                limit: self.max_bytes,
            });
        }

        let format = image::guess_format(raw)
            .map_err(|_| ImageError::UnsupportedFormat("unrecognized data".to_string()))?;
        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(ImageError::UnsupportedFormat(format!("{format:?}")));
        }

        let decoded = image::load_from_memory_with_format(raw, format)
            .map_err(|e| ImageError::UnsupportedFormat(e.to_string()))?;

        let resized = if decoded.width() > self.max_dimension
            || decoded.height() > self.max_dimension
        {
            decoded.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            decoded
        };

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| ImageError::Encode(e.to_string()))?;

        debug!(
            input_format = ?format,
            input_bytes = raw.len(),
            output_bytes = bytes.len(),
            width = rgb.width(),
            height = rgb.height(),
            "Normalized image"
        );

        Ok(EncodedImage {
            bytes,
            width: rgb.width(),
            height: rgb.height(),
        })
    }
}
