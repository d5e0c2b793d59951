//! CLI output formatting for export, open and settings commands.
//!
//! # Output Format
//!
//! ## Export
//!
//! ```text
//! gear (3 artboards)
//!     Skipped D/gear/Pressed: invalid background color "#abcdef"
//!     → gear.dci (4 files, 4 links)
//! home (1 artboard)
//!     Failed: Packager exited with status 2
//!         stderr: dci: broken layout
//!
//! Exported 1 bundle, 0 skipped, 1 failed
//! ```
//!
//! ## Open
//!
//! ```text
//! gear.dci → gear.preview.json
//!     16/normal.dark/2 (32×32, dark)
//!         001 1.0.png.alpha8
//!     16/normal.light/2 (32×32, light)
//!         001 1.png
//! Preview image: gear.preview.png
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability. Format functions are pure: no I/O, no side effects.

use crate::document::Layer;
use crate::export::{ExportEvent, ExportReport, IconOutcome, PreviewReport};
use crate::palette::{PaletteSetting, diverging_fields};
use crate::scale::format_number;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Tool output, one indented line per non-empty line, prefixed by stream name.
fn stream_lines(label: &str, text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| format!("{}{label}: {l}", indent(2)))
        .collect()
}

// ============================================================================
// Export
// ============================================================================

/// Format a single export progress event as display lines.
pub fn format_export_event(event: &ExportEvent) -> Vec<String> {
    match event {
        ExportEvent::IconStarted {
            icon_name,
            artboards,
        } => vec![format!("{icon_name} ({})", plural(*artboards, "artboard"))],
        ExportEvent::ArtboardSkipped { skipped, .. } => vec![format!(
            "{}Skipped {}: {}",
            indent(1),
            skipped.artboard,
            skipped.reason
        )],
        ExportEvent::IconFinished { icon_name, outcome } => match outcome {
            IconOutcome::Packaged {
                bundle,
                canonical,
                links,
            } => vec![format!(
                "{}\u{2192} {} ({}, {})",
                indent(1),
                file_name(bundle),
                plural(*canonical, "file"),
                plural(*links, "link")
            )],
            IconOutcome::Skipped => {
                vec![format!("{}Kept existing {icon_name}.dci", indent(1))]
            }
            IconOutcome::Failed {
                reason,
                stdout,
                stderr,
            } => {
                let mut lines = vec![format!("{}Failed: {reason}", indent(1))];
                lines.extend(stream_lines("stdout", stdout));
                lines.extend(stream_lines("stderr", stderr));
                lines
            }
        },
    }
}

/// Format the closing summary of an export.
pub fn format_export_summary(report: &ExportReport) -> Vec<String> {
    if report.icons.is_empty() {
        return vec!["No icon artboards found".to_string()];
    }
    vec![
        String::new(),
        format!(
            "Exported {}, {} skipped, {} failed",
            plural(report.packaged(), "bundle"),
            report.skipped(),
            report.failed()
        ),
    ]
}

// ============================================================================
// Open
// ============================================================================

/// Format the result of opening a bundle: groups in layout order, then files.
pub fn format_preview(bundle: &Path, report: &PreviewReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} \u{2192} {}",
        file_name(bundle),
        file_name(&report.manifest_path)
    )];
    if report.canvas.groups.is_empty() {
        lines.push(format!("{}(no images)", indent(1)));
    }
    for group in &report.canvas.groups {
        lines.push(format!(
            "{}{} ({}\u{d7}{}, {})",
            indent(1),
            group.relative_path,
            format_number(group.pixel_width),
            format_number(group.pixel_height),
            if group.is_dark_variant { "dark" } else { "light" }
        ));
        for (i, layer) in group.children.iter().enumerate() {
            lines.push(format!("{}{} {}", indent(2), format_index(i + 1), layer.name));
        }
    }
    if let Some(png) = &report.png_path {
        lines.push(format!("Preview image: {}", file_name(png)));
    }
    lines
}

// ============================================================================
// Settings
// ============================================================================

/// One line per artboard with its palette, then whether the selection agrees.
pub fn format_palette_table(rows: &[(&Layer, PaletteSetting)]) -> Vec<String> {
    let mut lines: Vec<String> = rows
        .iter()
        .map(|(layer, s)| {
            format!(
                "{}  role {}  h {} s {} l {} r {} g {} b {} a {}",
                layer.name,
                s.palette_role,
                s.hue,
                s.saturation,
                s.lightness,
                s.red,
                s.green,
                s.blue,
                s.alpha
            )
        })
        .collect();

    let settings: Vec<PaletteSetting> = rows.iter().map(|(_, s)| *s).collect();
    let diverging = diverging_fields(&settings);
    if rows.len() > 1 {
        if diverging.is_empty() {
            lines.push("Selection is uniform".to_string());
        } else {
            lines.push(format!("Selection differs in: {}", diverging.join(", ")));
        }
    }
    lines
}
