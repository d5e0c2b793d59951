//! Per-artboard palette and padding settings.
//!
//! Both live in the document's settings store, keyed by artboard id:
//!
//! | Key | Value |
//! |---|---|
//! | `<id>PaletteSettings` | `{ "paletteRole": 0, "hue": 0, …, "alpha": 0 }` |
//! | `<id>Padding` | integer inset in points |
//!
//! A missing palette entry means "no palette role, no adjustments"; a missing
//! padding entry means 0.

use crate::document::SettingsStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Selected artboards differ in {}; confirm to override them all", .0.join(", "))]
    Diverging(Vec<&'static str>),
}

/// Lower and upper bound for every color adjustment.
pub const ADJUSTMENT_RANGE: (i32, i32) = (-100, 100);

/// Semantic color slot an icon image is tinted against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum PaletteRole {
    #[default]
    None,
    Foreground,
    Background,
    HighlightForeground,
    Highlight,
}

impl PaletteRole {
    pub fn code(self) -> i32 {
        match self {
            PaletteRole::None => -1,
            PaletteRole::Foreground => 0,
            PaletteRole::Background => 1,
            PaletteRole::HighlightForeground => 2,
            PaletteRole::Highlight => 3,
        }
    }

    pub fn is_none(self) -> bool {
        self == PaletteRole::None
    }
}

impl TryFrom<i32> for PaletteRole {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(PaletteRole::None),
            0 => Ok(PaletteRole::Foreground),
            1 => Ok(PaletteRole::Background),
            2 => Ok(PaletteRole::HighlightForeground),
            3 => Ok(PaletteRole::Highlight),
            other => Err(format!("unknown palette role {other}")),
        }
    }
}

impl From<PaletteRole> for i32 {
    fn from(role: PaletteRole) -> Self {
        role.code()
    }
}

impl std::str::FromStr for PaletteRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(PaletteRole::None),
            "foreground" | "fg" => Ok(PaletteRole::Foreground),
            "background" | "bg" => Ok(PaletteRole::Background),
            "highlight-foreground" | "highlightforeground" => {
                Ok(PaletteRole::HighlightForeground)
            }
            "highlight" => Ok(PaletteRole::Highlight),
            _ => s
                .parse::<i32>()
                .map_err(|_| format!("unknown palette role {s:?}"))
                .and_then(PaletteRole::try_from),
        }
    }
}

impl fmt::Display for PaletteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaletteRole::None => "none",
            PaletteRole::Foreground => "foreground",
            PaletteRole::Background => "background",
            PaletteRole::HighlightForeground => "highlight-foreground",
            PaletteRole::Highlight => "highlight",
        };
        f.write_str(label)
    }
}

/// Palette role plus the seven color adjustments, each in `[-100, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaletteSetting {
    pub palette_role: PaletteRole,
    pub hue: i32,
    pub saturation: i32,
    pub lightness: i32,
    pub red: i32,
    pub green: i32,
    pub blue: i32,
    pub alpha: i32,
}

impl PaletteSetting {
    /// Build a setting, clamping every adjustment into range.
    pub fn new(role: PaletteRole, adjustments: [i32; 7]) -> Self {
        let [hue, saturation, lightness, red, green, blue, alpha] =
            adjustments.map(|v| v.clamp(ADJUSTMENT_RANGE.0, ADJUSTMENT_RANGE.1));
        Self {
            palette_role: role,
            hue,
            saturation,
            lightness,
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Adjustments in file-name order: hue, saturation, lightness, red, green, blue, alpha.
    pub fn adjustments(&self) -> [i32; 7] {
        [
            self.hue,
            self.saturation,
            self.lightness,
            self.red,
            self.green,
            self.blue,
            self.alpha,
        ]
    }

    pub fn has_adjustments(&self) -> bool {
        self.adjustments().iter().any(|v| *v != 0)
    }

    fn clamped(self) -> Self {
        Self::new(self.palette_role, self.adjustments())
    }

    /// File-name segment: `<role>` or `<role>_<h>_<s>_<l>_<r>_<g>_<b>_<a>`.
    ///
    /// `None` when the role is [`PaletteRole::None`].
    pub fn encode(&self) -> Option<String> {
        if self.palette_role.is_none() {
            return None;
        }
        let mut segment = self.palette_role.code().to_string();
        if self.has_adjustments() {
            for value in self.adjustments() {
                segment.push('_');
                segment.push_str(&value.to_string());
            }
        }
        Some(segment)
    }
}

pub fn palette_key(artboard_id: &str) -> String {
    format!("{artboard_id}PaletteSettings")
}

pub fn padding_key(artboard_id: &str) -> String {
    format!("{artboard_id}Padding")
}

/// Read the palette setting for an artboard, defaulting when absent.
///
/// A stored value that doesn't deserialize is treated as absent.
pub fn resolve_palette(store: &impl SettingsStore, artboard_id: &str) -> PaletteSetting {
    let key = palette_key(artboard_id);
    match store.setting(&key) {
        None => PaletteSetting::default(),
        Some(value) => match serde_json::from_value::<PaletteSetting>(value.clone()) {
            Ok(setting) => setting.clamped(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable palette setting {key}: {e}");
                PaletteSetting::default()
            }
        },
    }
}

pub fn store_palette(store: &mut impl SettingsStore, artboard_id: &str, setting: &PaletteSetting) {
    let value = serde_json::to_value(setting.clamped()).unwrap_or_default();
    store.set_setting(&palette_key(artboard_id), value);
}

/// Read the padding for an artboard.
///
/// Absent → `Some(0.0)`. Numbers and numeric strings are accepted; anything
/// else is corrupt and yields `None`, which makes the artboard's size
/// undefined.
pub fn resolve_padding(store: &impl SettingsStore, artboard_id: &str) -> Option<f64> {
    match store.setting(&padding_key(artboard_id)) {
        None | Some(serde_json::Value::Null) => Some(0.0),
        Some(serde_json::Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Some(_) => None,
    }
}

pub fn store_padding(store: &mut impl SettingsStore, artboard_id: &str, padding: i64) {
    store.set_setting(&padding_key(artboard_id), serde_json::json!(padding));
}

/// Names of the fields on which `settings` disagree, in declaration order.
///
/// An empty result means a bulk edit won't override anything that differs.
pub fn diverging_fields(settings: &[PaletteSetting]) -> Vec<&'static str> {
    const FIELDS: [&str; 8] = [
        "paletteRole",
        "hue",
        "saturation",
        "lightness",
        "red",
        "green",
        "blue",
        "alpha",
    ];
    let Some(first) = settings.first() else {
        return Vec::new();
    };
    let key = |s: &PaletteSetting| {
        let [h, sa, l, r, g, b, a] = s.adjustments();
        [s.palette_role.code(), h, sa, l, r, g, b, a]
    };
    let reference = key(first);
    FIELDS
        .iter()
        .enumerate()
        .filter(|(i, _)| settings[1..].iter().any(|s| key(s)[*i] != reference[*i]))
        .map(|(_, name)| *name)
        .collect()
}

/// True when all settings are identical (vacuously true for 0 or 1).
pub fn is_uniform(settings: &[PaletteSetting]) -> bool {
    diverging_fields(settings).is_empty()
}

/// Write one palette setting to every artboard in `ids`.
///
/// When the current settings disagree the edit would flatten them, so it
/// only goes ahead with `confirmed`.
pub fn apply_palette(
    store: &mut impl SettingsStore,
    ids: &[String],
    setting: &PaletteSetting,
    confirmed: bool,
) -> Result<(), SettingsError> {
    let current: Vec<PaletteSetting> = ids.iter().map(|id| resolve_palette(&*store, id)).collect();
    let diverging = diverging_fields(&current);
    if !diverging.is_empty() && !confirmed {
        return Err(SettingsError::Diverging(diverging));
    }
    for id in ids {
        store_palette(store, id, setting);
    }
    Ok(())
}
