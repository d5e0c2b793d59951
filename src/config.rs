//! Tool configuration.
//!
//! Settings are read from `dci-bundle.toml` next to the document (or the file
//! passed with `--config`) and layered over stock defaults. Files are sparse:
//! specify only what differs.
//!
//! ```toml
//! [tools]
//! dci = "dci"                        # Bundle packager executable
//! converter = "dci-image-converter"  # Alpha8 converter executable
//!
//! [theme]
//! generic = "#e0e0e0"   # Artboard background for theme-neutral icons
//! light = "#f0f0f0"     # Artboard background for light-theme icons
//! dark = "#1f1f1f"      # Artboard background for dark-theme icons
//!
//! [preview]
//! margin = 10           # Gap around preview layers and groups
//! render_png = true     # Also compose <icon>.preview.png
//!
//! [template]
//! artboard_size = 36    # Side of new icon artboards
//! spacing = 40          # Gap between new artboards
//! scales = [1, 2, 3]    # Export ratios declared on new artboards
//! format = "png"
//!
//! [staging]
//! prefix = "dci-bundle-"  # Temp directory prefix
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::scale::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up next to the document.
pub const CONFIG_FILENAME: &str = "dci-bundle.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
    pub tools: ToolsConfig,
    pub theme: ThemeColors,
    pub preview: PreviewConfig,
    pub template: TemplateConfig,
    pub staging: StagingConfig,
}

impl BundleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, color) in [
            ("theme.generic", &self.theme.generic),
            ("theme.light", &self.theme.light),
            ("theme.dark", &self.theme.dark),
        ] {
            if parse_hex_color(color).is_none() {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a #rrggbb color, got {color:?}"
                )));
            }
        }
        if self.tools.dci.is_empty() || self.tools.converter.is_empty() {
            return Err(ConfigError::Validation(
                "tools.dci and tools.converter must not be empty".into(),
            ));
        }
        if self.template.artboard_size <= 0.0 {
            return Err(ConfigError::Validation(
                "template.artboard_size must be positive".into(),
            ));
        }
        if self.template.scales.is_empty() || self.template.scales.iter().any(|s| *s <= 0.0) {
            return Err(ConfigError::Validation(
                "template.scales must be a non-empty list of positive ratios".into(),
            ));
        }
        if ImageFormat::parse(&self.template.format).is_none() {
            return Err(ConfigError::Validation(format!(
                "template.format {:?} is not one of png, webp, jpg",
                self.template.format
            )));
        }
        Ok(())
    }
}

/// External executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    /// Packs and unpacks bundles (`--create`, `--export`).
    pub dci: String,
    /// Produces alpha-only renditions (`--toAlpha8`).
    pub converter: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dci: "dci".to_string(),
            converter: "dci-image-converter".to_string(),
        }
    }
}

/// Artboard background colors that mark an artboard's theme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeColors {
    pub generic: String,
    pub light: String,
    pub dark: String,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            generic: "#e0e0e0".to_string(),
            light: "#f0f0f0".to_string(),
            dark: "#1f1f1f".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    pub margin: u32,
    pub render_png: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            margin: 10,
            render_png: true,
        }
    }
}

/// Layout of artboards created by `new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
    pub artboard_size: f64,
    pub spacing: f64,
    pub scales: Vec<f64>,
    pub format: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            artboard_size: 36.0,
            spacing: 40.0,
            scales: vec![1.0, 2.0, 3.0],
            format: "png".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagingConfig {
    pub prefix: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            prefix: "dci-bundle-".to_string(),
        }
    }
}

/// Parse `#rrggbb` (an optional trailing alpha byte is ignored).
pub fn parse_hex_color(color: &str) -> Option<[u8; 3]> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some([byte(0)?, byte(2)?, byte(4)?])
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Stock defaults as a TOML table, the base layer for user overrides.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BundleConfig::default()).unwrap_or(toml::Value::Table(Default::default()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as raw TOML. `Ok(None)` when the file doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Layer an optional overlay on the stock defaults, deserialize, validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<BundleConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BundleConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`, falling back to defaults when it is absent.
pub fn load_config(path: &Path) -> Result<BundleConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// A documented config file with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r##"# dci-bundle configuration
# Every option is optional; the values below are the defaults.

[tools]
# Executable that packs (--create) and unpacks (--export) bundles.
dci = "dci"
# Executable that converts a PNG to an alpha-only rendition (--toAlpha8).
converter = "dci-image-converter"

[theme]
# Artboard background colors. An artboard whose background starts with one of
# these is exported for that theme; any other color skips the artboard.
generic = "#e0e0e0"
light = "#f0f0f0"
dark = "#1f1f1f"

[preview]
# Gap between preview layers, and between preview groups.
margin = 10
# Compose <icon>.preview.png next to <icon>.preview.json.
render_png = true

[template]
# Artboards created by `dci-bundle new`.
artboard_size = 36
spacing = 40
scales = [1, 2, 3]
format = "png"

[staging]
# Prefix of the temporary directories used while packing and unpacking.
prefix = "dci-bundle-"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = BundleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tools.dci, "dci");
        assert_eq!(config.theme.generic, "#e0e0e0");
        assert_eq!(config.preview.margin, 10);
        assert_eq!(config.template.scales, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn stock_toml_matches_defaults() {
        let parsed: BundleConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = BundleConfig::default();
        assert_eq!(parsed.tools.converter, defaults.tools.converter);
        assert_eq!(parsed.theme.dark, defaults.theme.dark);
        assert_eq!(parsed.template.artboard_size, defaults.template.artboard_size);
        assert_eq!(parsed.staging.prefix, defaults.staging.prefix);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.tools.dci, "dci");
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[tools]\ndci = \"/opt/dci/bin/dci\"\n[preview]\nmargin = 4\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.tools.dci, "/opt/dci/bin/dci");
        assert_eq!(config.tools.converter, "dci-image-converter");
        assert_eq!(config.preview.margin, 4);
        assert!(config.preview.render_png);
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[theme]\nsepia = \"#704214\"\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[tools\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn bad_color_fails_validation() {
        let overlay: toml::Value = toml::from_str("[theme]\nlight = \"white\"\n").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn bad_template_fails_validation() {
        let overlay: toml::Value = toml::from_str("[template]\nscales = []\n").unwrap();
        assert!(resolve_config(Some(overlay)).is_err());
        let overlay: toml::Value = toml::from_str("[template]\nformat = \"gif\"\n").unwrap();
        assert!(resolve_config(Some(overlay)).is_err());
    }

    #[test]
    fn merge_toml_deep_nested() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n[b]\nz = 4\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
        assert_eq!(merged["b"]["z"].as_integer(), Some(4));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#e0e0e0"), Some([0xe0, 0xe0, 0xe0]));
        assert_eq!(parse_hex_color("#1f1f1fff"), Some([0x1f, 0x1f, 0x1f]));
        assert_eq!(parse_hex_color("e0e0e0"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }
}
