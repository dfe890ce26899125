// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;
use trickle_core::{CompressionProfile, Compressor, ContentType, EngineConfig, QualityTier};

use super::render;
use crate::cli::{KindArg, OutputFormat, TierArg};
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
pub struct CompressReport {
    pub kind: ContentType,
    pub tier: QualityTier,
    pub encoding: &'static str,
    pub original_size: usize,
    pub compressed_size: usize,
    pub ratio: f64,
    pub savings_percent: f64,
    pub thumbnail_size: Option<usize>,
}

/// Execute the compress command.
pub fn run(
    config: &EngineConfig,
    file: &Path,
    kind: Option<KindArg>,
    tier: TierArg,
    out: Option<&Path>,
    output: OutputFormat,
) -> Result<()> {
    let bytes = fs::read(file).map_err(|source| Error::Read { path: file.to_path_buf(), source })?;
    let kind = kind.map_or_else(|| infer_kind(file), ContentType::from);
    let (report, compressed) = compress(config, &bytes, kind, tier.into())?;

    if let Some(out) = out {
        fs::write(out, compressed)
            .map_err(|source| Error::Write { path: out.to_path_buf(), source })?;
        info!(path = %out.display(), "wrote compressed payload");
    }
    println!("{}", render(&report, output, format_text)?);
    Ok(())
}

/// Guesses the payload kind from a file extension.
pub fn infer_kind(path: &Path) -> ContentType {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => ContentType::Json,
        Some("png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp") => ContentType::Image,
        _ => ContentType::Text,
    }
}

pub fn compress(
    config: &EngineConfig,
    bytes: &[u8],
    kind: ContentType,
    tier: QualityTier,
) -> Result<(CompressReport, Vec<u8>)> {
    let profile = CompressionProfile::for_tier(tier);
    let data = Compressor::from_config(config).compress(bytes, kind, &profile)?;
    let report = CompressReport {
        kind,
        tier,
        encoding: data.encoding.as_str(),
        original_size: data.original_size,
        compressed_size: data.compressed_size,
        ratio: data.ratio,
        savings_percent: data.savings_percent(),
        thumbnail_size: data.thumbnail.as_ref().map(Vec::len),
    };
    Ok((report, data.bytes))
}

pub fn format_text(report: &CompressReport) -> String {
    let mut lines = vec![
        format!("original:   {} bytes", report.original_size),
        format!("compressed: {} bytes ({})", report.compressed_size, report.encoding),
        format!("ratio:      {:.2}", report.ratio),
        format!("saved:      {:.1}%", report.savings_percent),
    ];
    if let Some(size) = report.thumbnail_size {
        lines.push(format!("thumbnail:  {size} bytes"));
    }
    lines.join("\n")
}

#[cfg(test)]
#[path = "compress_tests.rs"]
mod tests;
