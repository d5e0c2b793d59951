//! The host document: pages of layers plus a per-document settings store.
//!
//! The editor that draws the icons is not part of this crate. Its state is
//! exchanged as a JSON document:
//!
//! ```json
//! {
//!   "pages": [{
//!     "name": "Icons",
//!     "layers": [{
//!       "id": "6F1C…",
//!       "name": "D/gear/Normal",
//!       "type": "Artboard",
//!       "frame": { "x": 40, "y": 40, "width": 36, "height": 36 },
//!       "background_color": "#e0e0e0ff",
//!       "export_formats": [{ "file_format": "png", "size": "2x" }],
//!       "source": "art/gear-normal.png"
//!     }]
//!   }],
//!   "settings": { "6F1C…PaletteSettings": { "paletteRole": 0, "hue": 0 } }
//! }
//! ```
//!
//! Palette and padding settings are keyed by artboard id and reached only
//! through the [`SettingsStore`] trait.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No page named {0:?}")]
    UnknownPage(String),
}

/// Key/value settings owned by the host document.
pub trait SettingsStore {
    fn setting(&self, key: &str) -> Option<&serde_json::Value>;
    fn set_setting(&mut self, key: &str, value: serde_json::Value);
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
    /// Directory the document was loaded from; layer sources resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub name: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    Artboard,
    Group,
    Image,
    ShapePath,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An export format declared on an artboard, e.g. `png` at `2x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFormat {
    pub file_format: String,
    pub size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    #[serde(default)]
    pub frame: Frame,
    #[serde(default)]
    pub background_color: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_formats: Vec<ExportFormat>,
    /// Pre-rendered artwork for this artboard, relative to the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl Layer {
    pub fn is_artboard(&self) -> bool {
        self.kind == LayerKind::Artboard
    }
}

impl Document {
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = fs::read_to_string(path)?;
        let mut document: Document = serde_json::from_str(&content)?;
        document.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Every layer on every page, in page order.
    pub fn all_layers(&self) -> Vec<&Layer> {
        self.pages.iter().flat_map(|p| p.layers.iter()).collect()
    }

    pub fn page(&self, name: &str) -> Result<&Page, DocumentError> {
        self.pages
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| DocumentError::UnknownPage(name.to_string()))
    }

    pub fn page_mut(&mut self, name: &str) -> Result<&mut Page, DocumentError> {
        self.pages
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| DocumentError::UnknownPage(name.to_string()))
    }

    pub fn page_layers(&self, name: &str) -> Result<Vec<&Layer>, DocumentError> {
        Ok(self.page(name)?.layers.iter().collect())
    }

    /// Layers whose id is in `ids`, in document order.
    pub fn layers_by_id(&self, ids: &[String]) -> Vec<&Layer> {
        self.all_layers()
            .into_iter()
            .filter(|l| ids.contains(&l.id))
            .collect()
    }

    pub fn layers_by_id_mut(&mut self, ids: &[String]) -> Vec<&mut Layer> {
        self.pages
            .iter_mut()
            .flat_map(|p| p.layers.iter_mut())
            .filter(|l| ids.contains(&l.id))
            .collect()
    }

    /// Resolve a layer's `source` against the document directory.
    pub fn source_path(&self, layer: &Layer) -> Option<PathBuf> {
        layer.source.as_ref().map(|s| self.base_dir.join(s))
    }
}

impl Page {
    /// Right-most edge of any layer on the page (0 for an empty page).
    pub fn right_edge(&self) -> f64 {
        self.layers
            .iter()
            .map(|l| l.frame.x + l.frame.width)
            .fold(0.0, f64::max)
    }
}

impl SettingsStore for Document {
    fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }

    fn set_setting(&mut self, key: &str, value: serde_json::Value) {
        self.settings.insert(key.to_string(), value);
    }
}
