//! Bundle decoding into a preview model.
//!
//! An unpacked bundle is a directory tree rooted at the icon name:
//!
//! ```text
//! gear/
//! └── 64/                  nominal size
//!     ├── normal.light/    mode + theme variant
//!     │   └── 2/           scale
//!     │       └── 1.0.png  layer
//!     └── normal.dark/
//!         └── 2/
//!             └── 1.0.png -> ../../normal.light/2/1.0.png
//! ```
//!
//! Everything the preview needs is in the path: the pixel size of a layer is
//! `size × scale`, and a variant segment containing `.dark` marks a dark
//! group. Files are visited in lexical path order, which is also the layout
//! order, so the same bundle always produces the same preview.
//!
//! ## Layout
//!
//! Files are grouped by their directory (`64/normal.light/2`). Groups stack
//! top to bottom; inside a group layers run left to right:
//!
//! ```text
//! ┌ margin ┬───────┬ margin ┬───────┬ margin ┐
//! │        │ layer │        │ layer │        │   group 1
//! └────────┴───────┴────────┴───────┴────────┘
//!   margin
//! ┌ margin ┬───────────┬ margin ┐
//! │        │   layer   │        │               group 2
//! ```

use crate::document::Frame;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// One file of an unpacked bundle with the metadata recovered from its path.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFile {
    /// Path below the icon directory, `/`-separated: `64/normal.light/2/1.png`.
    pub relative_path: String,
    /// Absolute location in the unpack directory.
    pub source: PathBuf,
    pub size: f64,
    pub scale: f64,
    pub is_dark_variant: bool,
}

impl DecodedFile {
    pub fn pixel_dimension(&self) -> f64 {
        self.size * self.scale
    }

    /// Directory part of [`relative_path`](Self::relative_path).
    pub fn group_path(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.relative_path)
    }
}

/// Recover size, scale and theme from `size/variant/scale/...`.
///
/// `None` for paths with fewer segments or non-numeric size/scale.
pub fn parse_layer_path(relative_path: &str) -> Option<(f64, f64, bool)> {
    let segments: Vec<&str> = relative_path.split('/').collect();
    if segments.len() < 4 {
        return None;
    }
    let size: f64 = segments[0].parse().ok().filter(|v: &f64| v.is_finite())?;
    let scale: f64 = segments[2].parse().ok().filter(|v: &f64| v.is_finite())?;
    Some((size, scale, segments[1].contains(".dark")))
}

/// Enumerate the files of `<unpack_root>/<icon_name>` in lexical path order.
///
/// Links are followed. Dangling links, unreadable entries and paths that
/// don't carry size and scale are skipped; only an unreadable icon
/// directory is an error.
pub fn decode_tree(unpack_root: &Path, icon_name: &str) -> Result<Vec<DecodedFile>, DecodeError> {
    let icon_root = unpack_root.join(icon_name);
    if !icon_root.is_dir() {
        tracing::warn!("Bundle has no {icon_name}/ directory");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&icon_root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            // Only an unreadable icon directory itself ends the walk.
            Err(source) if source.depth() == 0 => {
                return Err(DecodeError::Walk {
                    path: icon_root.clone(),
                    source,
                });
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        match fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => {}
            _ => {
                tracing::warn!("Skipping unreadable {}", entry.path().display());
                continue;
            }
        }
        let Ok(rel) = entry.path().strip_prefix(&icon_root) else {
            continue;
        };
        let relative_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let Some((size, scale, is_dark_variant)) = parse_layer_path(&relative_path) else {
            tracing::debug!("Skipping {relative_path}: no size/scale in path");
            continue;
        };
        files.push(DecodedFile {
            relative_path,
            source: entry.path().to_path_buf(),
            size,
            scale,
            is_dark_variant,
        });
    }
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

/// One layer placed on the preview canvas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewLayer {
    pub name: String,
    pub relative_path: String,
    /// Where the decoded bytes live; only valid while the unpack dir exists.
    #[serde(skip)]
    pub source: PathBuf,
    /// Canvas coordinates.
    pub frame: Frame,
}

/// All layers of one `size/variant/scale` directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewGroup {
    pub relative_path: String,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub is_dark_variant: bool,
    pub frame: Frame,
    pub children: Vec<PreviewLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewCanvas {
    pub icon_name: String,
    pub width: f64,
    pub height: f64,
    pub groups: Vec<PreviewGroup>,
}

/// Group decoded files by directory and lay the groups out on a canvas.
///
/// `files` must be in lexical order (as [`decode_tree`] returns them).
pub fn layout_preview(icon_name: &str, files: &[DecodedFile], margin: f64) -> PreviewCanvas {
    let mut canvas = PreviewCanvas {
        icon_name: icon_name.to_string(),
        width: 0.0,
        height: 0.0,
        groups: Vec::new(),
    };
    let mut index: HashMap<String, usize> = HashMap::new();

    for file in files {
        let dim = file.pixel_dimension();
        let dir = file.group_path();
        let slot = match index.get(dir) {
            Some(&slot) => slot,
            None => {
                let y = canvas.height + margin;
                canvas.groups.push(PreviewGroup {
                    relative_path: dir.to_string(),
                    pixel_width: dim,
                    pixel_height: dim,
                    is_dark_variant: file.is_dark_variant,
                    frame: Frame {
                        x: 0.0,
                        y,
                        width: margin,
                        height: margin,
                    },
                    children: Vec::new(),
                });
                index.insert(dir.to_string(), canvas.groups.len() - 1);
                canvas.groups.len() - 1
            }
        };

        let group = &mut canvas.groups[slot];
        group.children.push(PreviewLayer {
            name: file.file_name().to_string(),
            relative_path: file.relative_path.clone(),
            source: file.source.clone(),
            frame: Frame {
                x: group.frame.width,
                y: group.frame.y,
                width: dim,
                height: dim,
            },
        });
        group.frame.width += dim + margin;
        group.frame.height = group.frame.height.max(dim + margin);

        canvas.width = canvas.width.max(group.frame.width);
        canvas.height = canvas.height.max(group.frame.y + group.frame.height);
    }
    canvas
}
