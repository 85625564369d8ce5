//! Image transcoding on the blocking pool.
//!
//! WebP goes through libwebp so `quality` applies to both targets. Lossless
//! WebP is available behind `lossless: true`.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::sync::Arc;
use tracing::debug;

use crate::config::{TargetFormat, TranscodeOptions};
use crate::error::{Error, Result};

impl TargetFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpg",
        }
    }

    /// MIME type.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            Self::Webp => ImageFormat::WebP,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Re-encoded image.
#[derive(Debug, Clone)]
pub struct Transcoded {
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// Output format.
    pub format: TargetFormat,
    /// Final width.
    pub width: u32,
    /// Final height.
    pub height: u32,
}

/// Converts `bytes` to the configured target format.
///
/// Returns `Ok(None)` when the input should be uploaded as-is: transcoding
/// is disabled, the input is already in the target format and needs no
/// resize, or the input is a format we leave alone (GIF, SVG and anything
/// the decoder does not recognise).
///
/// # Errors
///
/// Returns [`Error::Transcode`] when a recognised image fails to decode or
/// encode.
pub fn transcode_blocking(bytes: &[u8], options: &TranscodeOptions) -> Result<Option<Transcoded>> {
    if !options.enabled {
        return Ok(None);
    }

    let source_format = match image::guess_format(bytes) {
        Ok(ImageFormat::Gif) | Err(_) => return Ok(None),
        Ok(format) => format,
    };

    let img = image::load_from_memory_with_format(bytes, source_format)
        .map_err(|e| Error::Transcode(format!("decode {source_format:?}: {e}")))?;

    let needs_resize = options.max_width.is_some_and(|max| img.width() > max);
    if source_format == options.format.image_format() && !needs_resize {
        return Ok(None);
    }

    let img = match options.max_width {
        Some(max) if needs_resize => {
            let height = (u64::from(img.height()) * u64::from(max) / u64::from(img.width())).max(1);
            debug!("resizing {}x{} to width {}", img.width(), img.height(), max);
            img.resize_exact(max, height as u32, FilterType::Lanczos3)
        }
        _ => img,
    };

    let bytes = match options.format {
        TargetFormat::Webp => encode_webp(&img, options)?,
        TargetFormat::Jpeg => {
            let mut out = Vec::new();
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut out, options.quality))
                .map_err(|e| Error::Transcode(format!("encode Jpeg: {e}")))?;
            out
        }
    };

    Ok(Some(Transcoded {
        bytes,
        format: options.format,
        width: img.width(),
        height: img.height(),
    }))
}

fn encode_webp(img: &DynamicImage, options: &TranscodeOptions) -> Result<Vec<u8>> {
    // libwebp only takes 8-bit RGB or RGBA buffers.
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let encoder = webp::Encoder::from_image(&rgba)
        .map_err(|e| Error::Transcode(format!("encode Webp: {e}")))?;
    let encoded = if options.lossless {
        encoder.encode_lossless()
    } else {
        encoder.encode(f32::from(options.quality))
    };
    Ok(encoded.to_vec())
}

/// Runs [`transcode_blocking`] on tokio's blocking pool.
///
/// # Errors
///
/// Returns [`Error::Transcode`] on codec failure or if the blocking task
/// panics.
pub async fn transcode(bytes: Arc<Vec<u8>>, options: TranscodeOptions) -> Result<Option<Transcoded>> {
    tokio::task::spawn_blocking(move || transcode_blocking(&bytes, &options))
        .await
        .map_err(|e| Error::Transcode(format!("transcode task failed: {e}")))?
}
