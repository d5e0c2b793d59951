//! Shared test utilities for the dci-bundle test suite.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let layer = artboard("a1", "D/gear/Normal", "#e0e0e0", &[("png", "1x"), ("png", "2x")]);
//! assert_eq!(layer.frame.width, 36.0);
//! ```

use crate::document::{ExportFormat, Frame, Layer, LayerKind};

// =========================================================================
// Layer builders
// =========================================================================

/// A 36×36 artboard at the origin with the given export formats
/// (`(file_format, size)` pairs).
pub fn artboard(id: &str, name: &str, background: &str, formats: &[(&str, &str)]) -> Layer {
    Layer {
        id: id.to_string(),
        name: name.to_string(),
        kind: LayerKind::Artboard,
        frame: Frame {
            x: 0.0,
            y: 0.0,
            width: 36.0,
            height: 36.0,
        },
        background_color: background.to_string(),
        export_formats: formats
            .iter()
            .map(|(file_format, size)| ExportFormat {
                file_format: file_format.to_string(),
                size: size.to_string(),
            })
            .collect(),
        source: None,
    }
}
