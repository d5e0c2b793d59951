//! Icon artboard name parsing.
//!
//! Every artboard that belongs to an icon carries a structured name made of
//! `/`-separated segments:
//!
//! ```text
//! D/<icon>/<Mode>                     theme-neutral artboard
//! D/<icon>/<Mode>/<Light|Dark>        artboard drawn for one theme
//! D/<icon>/<Mode>/Background          background layer
//! D/<icon>/<Mode>/<Light|Dark>/Background
//! ```
//!
//! The first segment is the family tag `D`. Anything else (wrong tag, fewer
//! than three or more than five segments, unknown mode or marker) is simply
//! not an icon: [`parse_icon_name`] returns [`ParsedName::NotAnIcon`] and
//! callers skip the artboard without reporting anything.

use std::fmt;
use thiserror::Error;

/// Segment separator inside artboard names.
pub const NAME_SEPARATOR: char = '/';

/// Family tag every icon artboard name starts with.
pub const FAMILY_TAG: &str = "D";

const BACKGROUND_MARKER: &str = "Background";

/// Interaction state an artboard draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IconMode {
    Normal,
    Hover,
    Pressed,
    Disabled,
}

impl IconMode {
    pub const ALL: [IconMode; 4] = [
        IconMode::Normal,
        IconMode::Hover,
        IconMode::Pressed,
        IconMode::Disabled,
    ];

    /// Name as written in artboard names (`Normal`).
    pub fn as_str(self) -> &'static str {
        match self {
            IconMode::Normal => "Normal",
            IconMode::Hover => "Hover",
            IconMode::Pressed => "Pressed",
            IconMode::Disabled => "Disabled",
        }
    }

    /// Name as used in bundle directories (`normal`).
    pub fn dir_name(self) -> &'static str {
        match self {
            IconMode::Normal => "normal",
            IconMode::Hover => "hover",
            IconMode::Pressed => "pressed",
            IconMode::Disabled => "disabled",
        }
    }

    fn parse(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(segment))
    }
}

/// Theme named explicitly in the artboard name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExplicitTheme {
    Light,
    Dark,
}

impl ExplicitTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            ExplicitTheme::Light => "Light",
            ExplicitTheme::Dark => "Dark",
        }
    }

    fn parse(segment: &str) -> Option<Self> {
        if segment.eq_ignore_ascii_case("Light") {
            Some(ExplicitTheme::Light)
        } else if segment.eq_ignore_ascii_case("Dark") {
            Some(ExplicitTheme::Dark)
        } else {
            None
        }
    }
}

/// Semantic fields of an icon artboard name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSpecName {
    pub icon_name: String,
    pub mode: IconMode,
    pub explicit_theme: Option<ExplicitTheme>,
    pub is_background_layer: bool,
}

impl IconSpecName {
    /// Render back to the artboard name form.
    pub fn render(&self) -> String {
        let mut segments = vec![FAMILY_TAG, self.icon_name.as_str(), self.mode.as_str()];
        if let Some(theme) = self.explicit_theme {
            segments.push(theme.as_str());
        }
        if self.is_background_layer {
            segments.push(BACKGROUND_MARKER);
        }
        segments.join(&NAME_SEPARATOR.to_string())
    }
}

impl fmt::Display for IconSpecName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Result of parsing an artboard name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedName {
    Icon(IconSpecName),
    NotAnIcon,
}

impl ParsedName {
    pub fn into_icon(self) -> Option<IconSpecName> {
        match self {
            ParsedName::Icon(spec) => Some(spec),
            ParsedName::NotAnIcon => None,
        }
    }
}

/// Parse an artboard name like `D/gear/Hover/Dark`.
///
/// - `"D/gear/Normal"` → icon `gear`, mode Normal, no theme, foreground
/// - `"D/gear/Normal/Light"` → explicit Light theme
/// - `"D/gear/Normal/Background"` → background layer
/// - `"D/gear/Normal/Dark/Background"` → both
/// - `"X/gear/Normal"`, `"D/gear"`, `"D/gear/Spinning"` → not an icon
pub fn parse_icon_name(name: &str) -> ParsedName {
    let segments: Vec<&str> = name.split(NAME_SEPARATOR).collect();
    if !(3..=5).contains(&segments.len()) || segments[0] != FAMILY_TAG {
        return ParsedName::NotAnIcon;
    }
    let icon_name = segments[1];
    if icon_name.is_empty() {
        return ParsedName::NotAnIcon;
    }
    let Some(mode) = IconMode::parse(segments[2]) else {
        return ParsedName::NotAnIcon;
    };

    let (explicit_theme, is_background_layer) = match &segments[3..] {
        [] => (None, false),
        [marker] if *marker == BACKGROUND_MARKER => (None, true),
        [theme] => match ExplicitTheme::parse(theme) {
            Some(t) => (Some(t), false),
            None => return ParsedName::NotAnIcon,
        },
        [theme, marker] if *marker == BACKGROUND_MARKER => match ExplicitTheme::parse(theme) {
            Some(t) => (Some(t), true),
            None => return ParsedName::NotAnIcon,
        },
        _ => return ParsedName::NotAnIcon,
    };

    ParsedName::Icon(IconSpecName {
        icon_name: icon_name.to_string(),
        mode,
        explicit_theme,
        is_background_layer,
    })
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    #[error("icon name is empty")]
    Empty,
    #[error("icon name {0:?} contains one of '/', '.', or a space")]
    InvalidCharacter(String),
}

/// Check a user-supplied icon name before it is written into artboard names.
pub fn validate_icon_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.contains([NAME_SEPARATOR, ' ', '.']) {
        return Err(NameError::InvalidCharacter(name.to_string()));
    }
    Ok(())
}

/// Replace the icon-name segment of an artboard name, keeping the rest.
///
/// Returns `Ok(None)` when `artboard_name` is not in the `D/...` family.
pub fn rename_icon(artboard_name: &str, new_name: &str) -> Result<Option<String>, NameError> {
    validate_icon_name(new_name)?;
    let prefix = format!("{FAMILY_TAG}{NAME_SEPARATOR}");
    if !artboard_name.starts_with(&prefix) {
        return Ok(None);
    }
    let mut segments: Vec<&str> = artboard_name.split(NAME_SEPARATOR).collect();
    if segments.len() < 2 {
        return Ok(None);
    }
    segments[1] = new_name;
    Ok(Some(segments.join(&NAME_SEPARATOR.to_string())))
}
