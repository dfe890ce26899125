// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Payload compression.
//!
//! Text and JSON use zstd and round-trip exactly (JSON up to whitespace).
//! Images are downscaled and re-encoded as JPEG; that path is lossy and has
//! no inverse.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{DataProcessingError, Result, SyncError};
use crate::network::QualityTier;
use crate::op::ContentType;
use crate::strategy::CompressionProfile;

const ZSTD_LEVEL: i32 = 3;
const ZSTD_LEVEL_AGGRESSIVE: i32 = 9;
const THUMBNAIL_QUALITY: u8 = 60;

/// Wire encoding of a payload body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Identity,
    Zstd,
    Jpeg,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Identity => "identity",
            Encoding::Zstd => "zstd",
            Encoding::Jpeg => "jpeg",
        }
    }
}

/// Result of compressing one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedData {
    pub bytes: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
    /// `compressed_size / original_size`; 1.0 for empty input.
    pub ratio: f64,
    pub encoding: Encoding,
    pub thumbnail: Option<Vec<u8>>,
}

impl CompressedData {
    fn new(bytes: Vec<u8>, original_size: usize, encoding: Encoding) -> Self {
        let compressed_size = bytes.len();
        let ratio = if original_size == 0 {
            1.0
        } else {
            compressed_size as f64 / original_size as f64
        };
        CompressedData { bytes, original_size, compressed_size, ratio, encoding, thumbnail: None }
    }

    fn identity(payload: &[u8]) -> Self {
        CompressedData::new(payload.to_vec(), payload.len(), Encoding::Identity)
    }

    /// Bytes saved, as a percentage of the original.
    pub fn savings_percent(&self) -> f64 {
        (1.0 - self.ratio) * 100.0
    }
}

/// Maximum edge and JPEG quality for images sent at `tier`.
pub fn image_limits(tier: QualityTier) -> (u32, u8) {
    match tier {
        QualityTier::Excellent => (2048, 90),
        QualityTier::Good => (1600, 80),
        QualityTier::Fair => (1280, 70),
        QualityTier::Poor => (960, 60),
        QualityTier::VeryPoor | QualityTier::Unknown => (640, 50),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressor {
    threshold: usize,
    thumbnail_size: u32,
}

impl Default for Compressor {
    fn default() -> Self {
        Compressor::from_config(&EngineConfig::default())
    }
}

impl Compressor {
    pub fn new(threshold: usize, thumbnail_size: u32) -> Self {
        Compressor { threshold, thumbnail_size }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Compressor::new(config.compression_threshold_bytes, config.thumbnail_size)
    }

    /// Payloads shorter than this are passed through.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn compress(
        &self,
        payload: &[u8],
        content_type: ContentType,
        profile: &CompressionProfile,
    ) -> Result<CompressedData> {
        if payload.len() < self.threshold {
            return Ok(CompressedData::identity(payload));
        }
        let data = match content_type {
            ContentType::Image => self.compress_image(payload, profile)?,
            ContentType::Text | ContentType::Json if !profile.compress_text => {
                CompressedData::identity(payload)
            }
            ContentType::Text => zstd_compress(payload, payload.len(), profile)?,
            ContentType::Json => {
                let minified = minify_json(payload)?;
                zstd_compress(&minified, payload.len(), profile)?
            }
        };
        debug!(
            original = data.original_size,
            compressed = data.compressed_size,
            encoding = data.encoding.as_str(),
            "compressed payload"
        );
        Ok(data)
    }

    /// Restores the bytes of a text or JSON payload.
    ///
    /// JPEG bodies are returned as-is; the original image cannot be recovered.
    pub fn decompress(&self, data: &CompressedData) -> Result<Vec<u8>> {
        decode(&data.bytes, data.encoding)
    }

    fn compress_image(
        &self,
        payload: &[u8],
        profile: &CompressionProfile,
    ) -> Result<CompressedData> {
        let image = image::load_from_memory(payload).map_err(|e| {
            SyncError::new(DataProcessingError::CompressionFailed, "cannot decode image")
                .with_cause(e)
        })?;
        let (max_edge, quality) = image_limits(profile.tier);
        let resized = image.width() > max_edge || image.height() > max_edge;
        let scaled = if resized {
            image.resize(max_edge, max_edge, FilterType::Triangle)
        } else {
            image
        };

        let encoded = encode_jpeg(&scaled, quality)?;
        let mut data = if encoded.len() < payload.len() || resized {
            CompressedData::new(encoded, payload.len(), Encoding::Jpeg)
        } else {
            CompressedData::identity(payload)
        };
        if profile.create_thumbnails {
            let thumb = scaled.thumbnail(self.thumbnail_size, self.thumbnail_size);
            data.thumbnail = Some(encode_jpeg(&thumb, THUMBNAIL_QUALITY)?);
        }
        Ok(data)
    }
}

/// Decodes a body received with the given encoding.
pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Identity | Encoding::Jpeg => Ok(bytes.to_vec()),
        Encoding::Zstd => zstd::decode_all(bytes).map_err(|e| {
            SyncError::new(DataProcessingError::DecompressionFailed, "corrupt zstd frame")
                .with_cause(e)
        }),
    }
}

fn zstd_compress(
    input: &[u8],
    original_size: usize,
    profile: &CompressionProfile,
) -> Result<CompressedData> {
    let level = if profile.aggressive { ZSTD_LEVEL_AGGRESSIVE } else { ZSTD_LEVEL };
    let compressed = zstd::encode_all(input, level).map_err(|e| {
        SyncError::new(DataProcessingError::CompressionFailed, "zstd encoding failed")
            .with_cause(e)
    })?;
    if compressed.len() < input.len() {
        Ok(CompressedData::new(compressed, original_size, Encoding::Zstd))
    } else {
        Ok(CompressedData::new(input.to_vec(), original_size, Encoding::Identity))
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality)).map_err(|e| {
        SyncError::new(DataProcessingError::CompressionFailed, "cannot encode JPEG").with_cause(e)
    })?;
    Ok(out.into_inner())
}

/// Strips insignificant whitespace from a JSON document.
///
/// Key order, number spelling and string contents are left untouched.
pub fn minify_json(input: &[u8]) -> Result<Vec<u8>> {
    serde_json::from_slice::<serde::de::IgnoredAny>(input).map_err(|e| {
        SyncError::new(DataProcessingError::CompressionFailed, "payload is not valid JSON")
            .with_cause(e)
    })?;

    let mut out = Vec::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    for &b in input {
        if in_string {
            out.push(b);
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b' ' | b'\t' | b'\n' | b'\r' => {}
            b'"' => {
                in_string = true;
                out.push(b);
            }
            _ => out.push(b),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "compress_tests.rs"]
mod tests;
