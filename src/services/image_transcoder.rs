//! Raster image normalization.
//!
//! Every recognized raster upload (webp, png, jpeg) is re-encoded as lossy
//! webp, then the encoded buffer is decoded again to compute a blurhash, so
//! the fingerprint describes exactly what was stored.

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};
use thiserror::Error;

pub const WEBP: &str = "image/webp";

/// Content types that are transcoded to webp.
pub const TRANSCODABLE: [&str; 3] = ["image/webp", "image/png", "image/jpeg"];

/// Blurhash component grid.
const BLURHASH_COMPONENTS_X: u32 = 4;
const BLURHASH_COMPONENTS_Y: u32 = 3;

/// Largest width/height libwebp accepts.
const WEBP_MAX_DIMENSION: u32 = 16383;

pub const DEFAULT_WEBP_QUALITY: f32 = 80.0;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("problem decoding image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("problem encoding image as webp: {0}")]
    Encode(String),
    #[error("problem decoding re-encoded webp: {0}")]
    Reload(#[source] image::ImageError),
    #[error("problem generating blurhash: {0}")]
    Blurhash(String),
    #[error("image transcoding task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Output of a successful transcode.
#[derive(Debug, Clone)]
pub struct TranscodedImage {
    pub data: Bytes,
    pub blurhash: String,
}

impl TranscodedImage {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImageTranscoder {
    quality: f32,
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new(DEFAULT_WEBP_QUALITY)
    }
}

impl ImageTranscoder {
    pub fn new(quality: f32) -> Self {
        Self {
            quality: quality.clamp(0.0, 100.0),
        }
    }

    /// Whether uploads of `content_type` go through the transcoder.
    pub fn is_transcodable(content_type: &str) -> bool {
        let essence = super::content_type::essence(content_type);
        TRANSCODABLE.contains(&essence.as_str())
    }

    /// Transcode on the blocking pool so decoding and encoding do not stall
    /// the runtime.
    pub async fn transcode_blocking(
        &self,
        data: Bytes,
    ) -> Result<TranscodedImage, TranscodeError> {
        let transcoder = *self;
        tokio::task::spawn_blocking(move || transcoder.transcode(&data)).await?
    }

    pub fn transcode(&self, data: &[u8]) -> Result<TranscodedImage, TranscodeError> {
        let img = image::load_from_memory(data).map_err(TranscodeError::Decode)?;
        let encoded = self.encode_webp(&img)?;

        let reloaded = image::load_from_memory_with_format(&encoded, ImageFormat::WebP)
            .map_err(TranscodeError::Reload)?;
        let blurhash = compute_blurhash(&reloaded)?;

        tracing::debug!(
            "transcoded image to webp: {} -> {} bytes",
            data.len(),
            encoded.len()
        );

        Ok(TranscodedImage {
            data: Bytes::from(encoded),
            blurhash,
        })
    }

    fn encode_webp(&self, img: &DynamicImage) -> Result<Vec<u8>, TranscodeError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(TranscodeError::Encode("image has no pixels".into()));
        }
        if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
            return Err(TranscodeError::Encode(format!(
                "{}x{} exceeds the webp limit of {} px",
                width, height, WEBP_MAX_DIMENSION
            )));
        }

        let rgba_img = img.to_rgba8();
        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder
            .encode_simple(false, self.quality)
            .map_err(|err| TranscodeError::Encode(format!("{:?}", err)))?;

        Ok(webp_data.to_vec())
    }
}

fn compute_blurhash(img: &DynamicImage) -> Result<String, TranscodeError> {
    let (width, height) = img.dimensions();
    let rgba = img.to_rgba8();
    blurhash::encode(
        BLURHASH_COMPONENTS_X,
        BLURHASH_COMPONENTS_Y,
        width,
        height,
        rgba.as_raw(),
    )
    .map_err(|err| TranscodeError::Blurhash(format!("{:?}", err)))
}
