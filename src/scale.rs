//! Pixel-ratio resolution from artboard export declarations.
//!
//! Only ratio declarations (`1x`, `2x`, `1.5x`) describe a bundle scale.
//! Absolute sizes (`64px`, `128w`, `96h`, `200width`) and anything that
//! doesn't parse are skipped silently.

use crate::document::{ExportFormat, Layer};
use std::fmt;

/// Encoded image format of one exported raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Webp,
    Jpg,
}

impl ImageFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            "jpg" | "jpeg" => Some(ImageFormat::Jpg),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Jpg => "jpg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One requested scale of an artboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSpec {
    pub ratio: f64,
    pub format: ImageFormat,
}

impl ScaleSpec {
    /// Directory name for this ratio: `2`, `1.5`.
    pub fn dir_name(&self) -> String {
        format_number(self.ratio)
    }
}

/// Parse a size suffix like `2x` into its ratio.
pub fn parse_ratio(size: &str) -> Option<f64> {
    let size = size.trim();
    if size.ends_with("px") {
        return None;
    }
    let ratio: f64 = size.strip_suffix(['x', 'X'])?.trim().parse().ok()?;
    (ratio.is_finite() && ratio > 0.0).then_some(ratio)
}

fn resolve_format(format: &ExportFormat) -> Option<ScaleSpec> {
    Some(ScaleSpec {
        ratio: parse_ratio(&format.size)?,
        format: ImageFormat::parse(&format.file_format)?,
    })
}

/// Requested scales of an artboard in declaration order.
///
/// Duplicate `(ratio, format)` declarations are collapsed to the first.
pub fn resolve_scales(layer: &Layer) -> Vec<ScaleSpec> {
    let mut scales: Vec<ScaleSpec> = Vec::new();
    for spec in layer.export_formats.iter().filter_map(resolve_format) {
        if !scales.contains(&spec) {
            scales.push(spec);
        }
    }
    scales
}

/// Render a dimension without a trailing `.0`: `64`, `1.5`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
