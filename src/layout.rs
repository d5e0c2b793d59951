//! Bundle layout encoding: artboards → staged icon directory tree.
//!
//! Icon artboards are grouped by icon name, annotated with their theme,
//! padding, palette and scales, and written into a tree that the packager
//! turns into `<icon>.dci`:
//!
//! ```text
//! <icon>/<size>/<mode>.<light|dark>/<scale>/<index>[.<padding>p][.<palette>].<ext>[.alpha8]
//! ```
//!
//! ## Theme fan-out
//!
//! | Artboard background | Variant directories |
//! |---|---|
//! | generic | `<mode>.light` (real file) and `<mode>.dark` (link) |
//! | light | `<mode>.light` |
//! | dark | `<mode>.dark` |
//!
//! Per scale, the first variant directory receives the encoded image; every
//! further variant gets a relative symbolic link to it, so each distinct image
//! is stored once.
//!
//! ## File names
//!
//! `index` counts the real files written to one `size/variant/scale`
//! directory, starting at 1; links don't advance it. The padding segment is
//! left out for zero padding and the palette segment for the `None` role (see
//! [`PaletteSetting::encode`]).
//!
//! ## Alpha-only renditions
//!
//! When an artboard has a palette role, a PNG of the image is converted to an
//! alpha8 rendition. If that is strictly smaller than the encoded image it
//! replaces it, and links point at the `.alpha8` file instead.

use crate::config::ThemeColors;
use crate::document::{Frame, Layer, SettingsStore};
use crate::naming::{ExplicitTheme, IconSpecName, parse_icon_name};
use crate::palette::{PaletteSetting, resolve_padding, resolve_palette};
use crate::render::Renderer;
use crate::scale::{ImageFormat, ScaleSpec, format_number, resolve_scales};
use crate::tools::AlphaConverter;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to create staging directory {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No artboard of {0} produced any file")]
    Empty(String),
}

/// Theme an artboard's background color stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeColor {
    Generic,
    Light,
    Dark,
}

/// Variant directory suffix inside a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeVariant {
    Light,
    Dark,
}

impl ThemeVariant {
    pub fn suffix(self) -> &'static str {
        match self {
            ThemeVariant::Light => "light",
            ThemeVariant::Dark => "dark",
        }
    }
}

impl ThemeColor {
    /// Match a host background color (`#e0e0e0ff`) against the theme colors.
    ///
    /// Host colors may carry an alpha byte, so the configured `#rrggbb` only
    /// has to be a prefix. Comparison ignores case.
    pub fn classify(color: &str, colors: &ThemeColors) -> Option<Self> {
        let color = color.trim().to_ascii_lowercase();
        [
            (&colors.generic, ThemeColor::Generic),
            (&colors.light, ThemeColor::Light),
            (&colors.dark, ThemeColor::Dark),
        ]
        .into_iter()
        .find(|(known, _)| color.starts_with(&known.to_ascii_lowercase()))
        .map(|(_, theme)| theme)
    }

    /// Variant directories this theme populates; the first holds real files.
    pub fn variants(self) -> &'static [ThemeVariant] {
        match self {
            ThemeColor::Generic => &[ThemeVariant::Light, ThemeVariant::Dark],
            ThemeColor::Light => &[ThemeVariant::Light],
            ThemeColor::Dark => &[ThemeVariant::Dark],
        }
    }
}

/// Artboards sharing one icon name, in encounter order.
#[derive(Debug, Clone)]
pub struct IconGroup<'a> {
    pub icon_name: String,
    pub members: Vec<(IconSpecName, &'a Layer)>,
}

/// Group icon artboards by icon name. Non-artboards and names that don't
/// parse as icons are left out.
pub fn classify_icons<'a>(layers: &[&'a Layer]) -> Vec<IconGroup<'a>> {
    let mut groups: Vec<IconGroup<'a>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for layer in layers.iter().copied().filter(|l| l.is_artboard()) {
        let Some(spec) = parse_icon_name(&layer.name).into_icon() else {
            continue;
        };
        let slot = *index.entry(spec.icon_name.clone()).or_insert_with(|| {
            groups.push(IconGroup {
                icon_name: spec.icon_name.clone(),
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].members.push((spec, layer));
    }
    groups
}

/// Why an artboard contributed nothing to its bundle.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    UnrecognizedColor(String),
    InvalidSize,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnrecognizedColor(color) => {
                write!(f, "invalid background color {color:?}")
            }
            SkipReason::InvalidSize => f.write_str("size is undefined (check the padding)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedArtboard {
    pub artboard: String,
    pub reason: SkipReason,
}

/// A fully resolved icon artboard, ready to stage.
#[derive(Debug, Clone)]
pub struct IconArtboard<'a> {
    pub layer: &'a Layer,
    pub spec: IconSpecName,
    pub theme: ThemeColor,
    pub padding: f64,
    pub size: f64,
    pub palette: PaletteSetting,
    pub scales: Vec<ScaleSpec>,
}

impl<'a> IconArtboard<'a> {
    pub fn resolve(
        spec: IconSpecName,
        layer: &'a Layer,
        store: &impl SettingsStore,
        colors: &ThemeColors,
    ) -> Result<Self, SkipReason> {
        let theme = ThemeColor::classify(&layer.background_color, colors)
            .ok_or_else(|| SkipReason::UnrecognizedColor(layer.background_color.clone()))?;
        if let Some(explicit) = spec.explicit_theme {
            let named = match explicit {
                ExplicitTheme::Light => ThemeColor::Light,
                ExplicitTheme::Dark => ThemeColor::Dark,
            };
            if named != theme {
                tracing::warn!(
                    "{} is named {} but its background is {:?}; using the background",
                    layer.name,
                    explicit.as_str(),
                    theme
                );
            }
        }
        let padding = resolve_padding(store, &layer.id).unwrap_or(f64::NAN);
        let size = nominal_size(&layer.frame, padding);
        if !size.is_finite() || size <= 0.0 {
            return Err(SkipReason::InvalidSize);
        }
        Ok(Self {
            layer,
            spec,
            theme,
            padding,
            size,
            palette: resolve_palette(store, &layer.id),
            scales: resolve_scales(layer),
        })
    }
}

/// `max(width, height) - 2 × padding`; NaN when padding is NaN.
pub fn nominal_size(frame: &Frame, padding: f64) -> f64 {
    frame.width.max(frame.height) - 2.0 * padding
}

/// `<index>[.<padding>p][.<palette>].<ext>`
pub fn layer_file_name(index: u32, padding: f64, palette: &PaletteSetting, ext: &str) -> String {
    let mut segments = vec![index.to_string()];
    if padding != 0.0 {
        segments.push(format!("{}p", format_number(padding)));
    }
    segments.extend(palette.encode());
    segments.push(ext.to_string());
    segments.join(".")
}

/// Relative path from directory `from_dir` to `to` (both relative to one root).
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from_dir.components().collect();
    let target: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for component in &target[common..] {
        rel.push(component.as_os_str());
    }
    rel
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedKind {
    /// Encoded image.
    Canonical,
    /// Alpha-only rendition that replaced the encoded image.
    Alpha8,
    /// Link to another staged file (relative target).
    Link(PathBuf),
}

/// One entry of the staged tree, relative to the icon directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub kind: StagedKind,
}

impl StagedFile {
    pub fn is_link(&self) -> bool {
        matches!(self.kind, StagedKind::Link(_))
    }
}

/// Writes artboards into one icon's staging directory.
pub struct BundleStager<'a> {
    renderer: &'a dyn Renderer,
    converter: &'a dyn AlphaConverter,
    icon_root: PathBuf,
    scratch_dir: PathBuf,
    counters: HashMap<PathBuf, u32>,
    scratch_seq: u32,
}

impl<'a> BundleStager<'a> {
    /// `scratch_dir` holds temporary PNG renditions and must lie outside `icon_root`.
    pub fn new(
        renderer: &'a dyn Renderer,
        converter: &'a dyn AlphaConverter,
        icon_root: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            renderer,
            converter,
            icon_root: icon_root.into(),
            scratch_dir: scratch_dir.into(),
            counters: HashMap::new(),
            scratch_seq: 0,
        }
    }

    pub fn icon_root(&self) -> &Path {
        &self.icon_root
    }

    /// Stage every scale and variant of one artboard.
    ///
    /// Failures confined to one cell (directory creation, rendering, link
    /// creation) are logged and skip that cell only.
    pub fn stage_artboard(&mut self, artboard: &IconArtboard<'_>) -> Vec<StagedFile> {
        let mut staged = Vec::new();
        let size_dir = format_number(artboard.size);

        for scale in &artboard.scales {
            let mut canonical: Option<PathBuf> = None;
            for variant in artboard.theme.variants() {
                let dir: PathBuf = [
                    size_dir.clone(),
                    format!("{}.{}", artboard.spec.mode.dir_name(), variant.suffix()),
                    scale.dir_name(),
                ]
                .iter()
                .collect();
                if let Err(e) = fs::create_dir_all(self.icon_root.join(&dir)) {
                    tracing::warn!("Failed to create {}, skipping: {e}", dir.display());
                    continue;
                }

                match &canonical {
                    None => match self.write_canonical(artboard, scale, &dir) {
                        Some(file) => {
                            canonical = Some(file.path.clone());
                            staged.push(file);
                        }
                        None => break,
                    },
                    Some(target) => {
                        if let Some(link) = self.write_link(&dir, target) {
                            staged.push(link);
                        }
                    }
                }
            }
        }
        staged
    }

    fn next_free_index(&self, dir: &Path, artboard: &IconArtboard<'_>, ext: &str) -> (u32, String) {
        let mut index = self.counters.get(dir).copied().unwrap_or(0) + 1;
        loop {
            let name = layer_file_name(index, artboard.padding, &artboard.palette, ext);
            // A link mirrored from another variant may already use this name.
            if fs::symlink_metadata(self.icon_root.join(dir).join(&name)).is_err() {
                return (index, name);
            }
            index += 1;
        }
    }

    fn write_canonical(
        &mut self,
        artboard: &IconArtboard<'_>,
        scale: &ScaleSpec,
        dir: &Path,
    ) -> Option<StagedFile> {
        let (index, name) = self.next_free_index(dir, artboard, scale.format.extension());
        let rel = dir.join(&name);

        let bytes = match self.renderer.export(artboard.layer, scale.ratio, scale.format) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to export {} at {}x: {e}", artboard.layer.name, scale.ratio);
                return None;
            }
        };
        if let Err(e) = fs::write(self.icon_root.join(&rel), &bytes) {
            tracing::warn!("Failed to write {}: {e}", rel.display());
            return None;
        }
        self.counters.insert(dir.to_path_buf(), index);

        if !artboard.palette.palette_role.is_none() {
            if let Some(alpha) = self.substitute_alpha(artboard, scale, &rel, bytes.len() as u64) {
                return Some(StagedFile {
                    path: alpha,
                    kind: StagedKind::Alpha8,
                });
            }
        }
        Some(StagedFile {
            path: rel,
            kind: StagedKind::Canonical,
        })
    }

    /// Convert to alpha8 and keep whichever of the two is smaller.
    ///
    /// Returns the alpha8 path when it replaced the primary file.
    fn substitute_alpha(
        &mut self,
        artboard: &IconArtboard<'_>,
        scale: &ScaleSpec,
        primary_rel: &Path,
        primary_len: u64,
    ) -> Option<PathBuf> {
        let primary = self.icon_root.join(primary_rel);
        let mut alpha_name = primary_rel.file_name()?.to_os_string();
        alpha_name.push(".alpha8");
        let alpha_rel = primary_rel.with_file_name(alpha_name);
        let alpha = self.icon_root.join(&alpha_rel);

        let scratch_png = match scale.format {
            ImageFormat::Png => None,
            _ => Some(self.write_scratch_png(artboard, scale)?),
        };
        let input = scratch_png.as_deref().unwrap_or(&primary);
        let result = self.converter.to_alpha8(input, &alpha);
        if let Some(png) = &scratch_png {
            let _ = fs::remove_file(png);
        }

        match result {
            Ok(out) if out.is_success() => {}
            Ok(out) => {
                tracing::warn!(
                    "Alpha8 conversion of {} failed ({:?}): {}",
                    primary_rel.display(),
                    out.status,
                    out.stderr.trim()
                );
                let _ = fs::remove_file(&alpha);
                return None;
            }
            Err(e) => {
                tracing::warn!("Alpha8 conversion of {} failed: {e}", primary_rel.display());
                let _ = fs::remove_file(&alpha);
                return None;
            }
        }

        let alpha_len = match fs::metadata(&alpha) {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!("Alpha8 output {} missing: {e}", alpha_rel.display());
                return None;
            }
        };
        if alpha_len < primary_len {
            if let Err(e) = fs::remove_file(&primary) {
                tracing::warn!("Failed to remove {}: {e}", primary_rel.display());
                let _ = fs::remove_file(&alpha);
                return None;
            }
            tracing::debug!("{} replaced by alpha8 ({alpha_len} < {primary_len} bytes)", primary_rel.display());
            Some(alpha_rel)
        } else {
            let _ = fs::remove_file(&alpha);
            None
        }
    }

    fn write_scratch_png(&mut self, artboard: &IconArtboard<'_>, scale: &ScaleSpec) -> Option<PathBuf> {
        let bytes = match self.renderer.export(artboard.layer, scale.ratio, ImageFormat::Png) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("No PNG rendition of {} for alpha8: {e}", artboard.layer.name);
                return None;
            }
        };
        self.scratch_seq += 1;
        let path = self.scratch_dir.join(format!("{}.png", self.scratch_seq));
        let written = fs::create_dir_all(&self.scratch_dir).and_then(|_| fs::write(&path, bytes));
        match written {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!("Failed to write {}: {e}", path.display());
                None
            }
        }
    }

    /// The canonical file's name, or the same tail under the next free
    /// index when another artboard already wrote that name here. Links do
    /// not advance the directory counter.
    fn free_link_name(&self, dir: &Path, target_name: &str) -> String {
        let taken = |name: &str| fs::symlink_metadata(self.icon_root.join(dir).join(name)).is_ok();
        if !taken(target_name) {
            return target_name.to_string();
        }
        let tail = target_name.split_once('.').map_or(target_name, |(_, tail)| tail);
        let mut index = self.counters.get(dir).copied().unwrap_or(0) + 1;
        loop {
            let name = format!("{index}.{tail}");
            if !taken(&name) {
                return name;
            }
            index += 1;
        }
    }

    fn write_link(&self, dir: &Path, target: &Path) -> Option<StagedFile> {
        let target_name = target.file_name()?.to_string_lossy();
        let name = self.free_link_name(dir, &target_name);
        let rel = dir.join(name);
        let abs = self.icon_root.join(&rel);
        let link_target = relative_path(dir, target);
        match link_file(&link_target, &self.icon_root.join(target), &abs) {
            Ok(()) => Some(StagedFile {
                path: rel,
                kind: StagedKind::Link(link_target),
            }),
            Err(e) => {
                tracing::warn!("Failed to link {}: {e}", rel.display());
                None
            }
        }
    }
}

#[cfg(unix)]
fn link_file(relative_target: &Path, _absolute_target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(relative_target, link)
}

// Without symlinks the content is duplicated.
#[cfg(not(unix))]
fn link_file(_relative_target: &Path, absolute_target: &Path, link: &Path) -> std::io::Result<()> {
    fs::copy(absolute_target, link).map(|_| ())
}

/// Stage a whole icon group: resolve every member, then write them
/// background layers first so they get the lowest indices.
pub fn stage_group(
    stager: &mut BundleStager<'_>,
    group: &IconGroup<'_>,
    store: &impl SettingsStore,
    colors: &ThemeColors,
) -> (Vec<StagedFile>, Vec<SkippedArtboard>) {
    let mut skipped = Vec::new();
    let mut resolved = Vec::new();
    for (spec, layer) in &group.members {
        match IconArtboard::resolve(spec.clone(), *layer, store, colors) {
            Ok(artboard) => resolved.push(artboard),
            Err(reason) => {
                tracing::warn!("Skipping {} of {}: {reason}", layer.name, group.icon_name);
                skipped.push(SkippedArtboard {
                    artboard: layer.name.clone(),
                    reason,
                });
            }
        }
    }
    resolved.sort_by_key(|a| !a.spec.is_background_layer);

    let staged = resolved
        .iter()
        .flat_map(|artboard| stager.stage_artboard(artboard))
        .collect();
    (staged, skipped)
}

/// Result of staging one icon group.
#[derive(Debug, Clone)]
pub struct StagedIcon {
    pub icon_name: String,
    /// `<staging_root>/<icon_name>`, the directory handed to the packager.
    pub root: PathBuf,
    pub files: Vec<StagedFile>,
    pub skipped: Vec<SkippedArtboard>,
}

impl StagedIcon {
    pub fn canonical_count(&self) -> usize {
        self.files.iter().filter(|f| !f.is_link()).count()
    }

    pub fn link_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_link()).count()
    }
}

/// Stage one icon group under `staging_root`.
///
/// Scratch renditions live in `<staging_root>/.scratch` and are removed
/// before returning. An icon for which nothing could be written is an error
/// so that an existing bundle is never replaced by an empty one.
pub fn stage_icon(
    group: &IconGroup<'_>,
    store: &impl SettingsStore,
    colors: &ThemeColors,
    renderer: &dyn Renderer,
    converter: &dyn AlphaConverter,
    staging_root: &Path,
) -> Result<StagedIcon, StageError> {
    let root = staging_root.join(&group.icon_name);
    fs::create_dir_all(&root).map_err(|source| StageError::Root {
        path: root.clone(),
        source,
    })?;
    let scratch = staging_root.join(".scratch");

    let mut stager = BundleStager::new(renderer, converter, &root, &scratch);
    let (files, skipped) = stage_group(&mut stager, group, store, colors);
    let _ = fs::remove_dir_all(&scratch);

    if files.is_empty() {
        return Err(StageError::Empty(group.icon_name.clone()));
    }
    Ok(StagedIcon {
        icon_name: group.icon_name.clone(),
        root,
        files,
        skipped,
    })
}
