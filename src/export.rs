//! Export and open: one bundle per icon, one preview per bundle.
//!
//! # Export
//!
//! Icons are processed strictly one after another. For each icon group:
//!
//! 1. Check the packager (and, when any artboard has a palette role, the
//!    alpha converter) can be run.
//! 2. If `<dest>/<icon>.dci` exists, ask the [`Prompter`]; a decline skips the icon.
//! 3. Stage the artboards into a fresh temporary directory ([`stage_icon`]).
//! 4. Remove the old bundle, then run the packager.
//! 5. Drop the staging directory (best effort).
//!
//! A failure in any step is recorded against that icon and the batch moves
//! on. Only a missing destination directory aborts the whole export.
//!
//! # Open
//!
//! A bundle is unpacked into a temporary directory, decoded and laid out,
//! and the layout is written next to the output as `<icon>.preview.json`
//! (plus `<icon>.preview.png` when `preview.render_png` is set).
//!
//! Progress goes out as [`ExportEvent`]s over an optional channel; see
//! [`crate::output`] for the terminal rendering.

use crate::config::BundleConfig;
use crate::decode::{DecodeError, PreviewCanvas, decode_tree, layout_preview};
use crate::document::{Layer, SettingsStore};
use crate::layout::{IconArtboard, IconGroup, SkippedArtboard, StageError, classify_icons, stage_icon};
use crate::palette::resolve_palette;
use crate::render::{Renderer, render_preview};
use crate::tools::{AlphaConverter, Packager, ToolError, ToolOutput};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

pub const BUNDLE_EXTENSION: &str = "dci";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Destination directory {0} does not exist")]
    MissingDestination(PathBuf),
}

#[derive(Error, Debug)]
pub enum OpenError {
    #[error("{0} is not a .dci bundle")]
    NotABundle(PathBuf),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("Unpacking failed with status {status:?}: {stderr}")]
    Unpack {
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Decides whether an existing bundle may be replaced.
pub trait Prompter {
    fn confirm_overwrite(&self, bundle: &Path) -> bool;
}

/// Non-interactive answer to every overwrite prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    Always,
    Never,
}

impl Prompter for OverwritePolicy {
    fn confirm_overwrite(&self, _bundle: &Path) -> bool {
        matches!(self, OverwritePolicy::Always)
    }
}

/// The external pieces an export talks to.
pub struct Collaborators<'a> {
    pub renderer: &'a dyn Renderer,
    pub packager: &'a dyn Packager,
    pub converter: &'a dyn AlphaConverter,
    pub prompter: &'a dyn Prompter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IconOutcome {
    Packaged {
        bundle: PathBuf,
        canonical: usize,
        links: usize,
    },
    /// The user declined to overwrite an existing bundle.
    Skipped,
    Failed {
        reason: String,
        stdout: String,
        stderr: String,
    },
}

impl IconOutcome {
    fn failed(reason: impl Into<String>) -> Self {
        IconOutcome::Failed {
            reason: reason.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconReport {
    pub icon_name: String,
    pub outcome: IconOutcome,
    pub skipped_artboards: Vec<SkippedArtboard>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub icons: Vec<IconReport>,
}

impl ExportReport {
    pub fn packaged(&self) -> usize {
        self.count(|o| matches!(o, IconOutcome::Packaged { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, IconOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, IconOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&IconOutcome) -> bool) -> usize {
        self.icons.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Progress events emitted while exporting.
#[derive(Debug, Clone)]
pub enum ExportEvent {
    IconStarted {
        icon_name: String,
        artboards: usize,
    },
    ArtboardSkipped {
        icon_name: String,
        skipped: SkippedArtboard,
    },
    IconFinished {
        icon_name: String,
        outcome: IconOutcome,
    },
}

/// Export every icon found among `layers` into `dest`.
pub fn export_icons(
    layers: &[&Layer],
    store: &impl SettingsStore,
    dest: &Path,
    config: &BundleConfig,
    tools: &Collaborators<'_>,
    events: Option<Sender<ExportEvent>>,
) -> Result<ExportReport, ExportError> {
    if !dest.is_dir() {
        return Err(ExportError::MissingDestination(dest.to_path_buf()));
    }

    let emit = |event: ExportEvent| {
        if let Some(tx) = &events {
            tx.send(event).ok();
        }
    };

    let mut report = ExportReport::default();
    for group in classify_icons(layers) {
        emit(ExportEvent::IconStarted {
            icon_name: group.icon_name.clone(),
            artboards: group.members.len(),
        });

        let (outcome, skipped_artboards) = export_icon(&group, store, dest, config, tools);
        for skipped in &skipped_artboards {
            emit(ExportEvent::ArtboardSkipped {
                icon_name: group.icon_name.clone(),
                skipped: skipped.clone(),
            });
        }
        if let IconOutcome::Failed { reason, .. } = &outcome {
            tracing::warn!("Export of {} failed: {reason}", group.icon_name);
        }
        emit(ExportEvent::IconFinished {
            icon_name: group.icon_name.clone(),
            outcome: outcome.clone(),
        });
        report.icons.push(IconReport {
            icon_name: group.icon_name,
            outcome,
            skipped_artboards,
        });
    }
    Ok(report)
}

fn export_icon(
    group: &IconGroup<'_>,
    store: &impl SettingsStore,
    dest: &Path,
    config: &BundleConfig,
    tools: &Collaborators<'_>,
) -> (IconOutcome, Vec<SkippedArtboard>) {
    if let Err(e) = tools.packager.ensure_available() {
        return (IconOutcome::failed(e.to_string()), Vec::new());
    }
    let needs_converter = group
        .members
        .iter()
        .any(|(_, layer)| !resolve_palette(store, &layer.id).palette_role.is_none());
    if needs_converter {
        if let Err(e) = tools.converter.ensure_available() {
            return (IconOutcome::failed(e.to_string()), Vec::new());
        }
    }

    let bundle = dest.join(format!("{}.{BUNDLE_EXTENSION}", group.icon_name));
    let exists = fs::symlink_metadata(&bundle).is_ok();
    if exists && !tools.prompter.confirm_overwrite(&bundle) {
        return (IconOutcome::Skipped, Vec::new());
    }

    let tmp = match tempfile::Builder::new()
        .prefix(&config.staging.prefix)
        .tempdir()
    {
        Ok(tmp) => tmp,
        Err(e) => {
            return (
                IconOutcome::failed(format!("Failed to create staging directory: {e}")),
                Vec::new(),
            );
        }
    };

    let staged = match stage_icon(
        group,
        store,
        &config.theme,
        tools.renderer,
        tools.converter,
        tmp.path(),
    ) {
        Ok(staged) => staged,
        Err(e) => {
            let skipped = match &e {
                StageError::Empty(_) => skipped_for(group, store, config),
                StageError::Root { .. } => Vec::new(),
            };
            return (IconOutcome::failed(e.to_string()), skipped);
        }
    };
    tracing::debug!(
        "Staged {} in {}: {} files, {} links",
        staged.icon_name,
        staged.root.display(),
        staged.canonical_count(),
        staged.link_count()
    );

    if exists {
        if let Err(e) = remove_existing(&bundle) {
            return (
                IconOutcome::failed(format!("Failed to remove {}: {e}", bundle.display())),
                staged.skipped,
            );
        }
    }

    let outcome = match tools.packager.pack(&staged.root, dest) {
        Ok(out) if out.is_success() => IconOutcome::Packaged {
            bundle,
            canonical: staged.canonical_count(),
            links: staged.link_count(),
        },
        Ok(ToolOutput {
            status,
            stdout,
            stderr,
        }) => IconOutcome::Failed {
            reason: format!("Packager exited with status {}", status_text(status)),
            stdout,
            stderr,
        },
        Err(e) => IconOutcome::failed(e.to_string()),
    };

    if let Err(e) = tmp.close() {
        tracing::debug!("Failed to remove staging directory: {e}");
    }
    (outcome, staged.skipped)
}

// Re-resolve to report why every artboard of an empty icon was dropped.
fn skipped_for(
    group: &IconGroup<'_>,
    store: &impl SettingsStore,
    config: &BundleConfig,
) -> Vec<SkippedArtboard> {
    group
        .members
        .iter()
        .filter_map(|(spec, layer)| {
            IconArtboard::resolve(spec.clone(), *layer, store, &config.theme)
                .err()
                .map(|reason| SkippedArtboard {
                    artboard: layer.name.clone(),
                    reason,
                })
        })
        .collect()
}

fn remove_existing(path: &Path) -> std::io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn status_text(status: Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// Where an opened bundle's preview was written.
#[derive(Debug, Clone)]
pub struct PreviewReport {
    pub icon_name: String,
    pub canvas: PreviewCanvas,
    pub manifest_path: PathBuf,
    pub png_path: Option<PathBuf>,
}

impl PreviewReport {
    pub fn layer_count(&self) -> usize {
        self.canvas.groups.iter().map(|g| g.children.len()).sum()
    }
}

/// Unpack `bundle`, lay its images out and write the preview into `out_dir`.
pub fn open_bundle(
    bundle: &Path,
    out_dir: &Path,
    config: &BundleConfig,
    packager: &dyn Packager,
) -> Result<PreviewReport, OpenError> {
    let is_bundle = bundle
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(BUNDLE_EXTENSION));
    let icon_name = bundle
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|_| is_bundle)
        .ok_or_else(|| OpenError::NotABundle(bundle.to_path_buf()))?;

    packager.ensure_available()?;
    let tmp = tempfile::Builder::new()
        .prefix(&config.staging.prefix)
        .tempdir()?;
    let out = packager.unpack(bundle, tmp.path())?;
    if !out.is_success() {
        return Err(OpenError::Unpack {
            status: out.status,
            stdout: out.stdout,
            stderr: out.stderr,
        });
    }

    let files = decode_tree(tmp.path(), &icon_name)?;
    let canvas = layout_preview(&icon_name, &files, f64::from(config.preview.margin));

    fs::create_dir_all(out_dir)?;
    let manifest_path = out_dir.join(format!("{icon_name}.preview.json"));
    fs::write(&manifest_path, serde_json::to_string_pretty(&canvas)?)?;

    // Layer sources live in the unpack directory, so render before it drops.
    let png_path = if config.preview.render_png && !canvas.groups.is_empty() {
        let path = out_dir.join(format!("{icon_name}.preview.png"));
        render_preview(&canvas, &config.theme).save(&path)?;
        Some(path)
    } else {
        None
    };

    Ok(PreviewReport {
        icon_name,
        canvas,
        manifest_path,
        png_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::palette::{PaletteRole, PaletteSetting, store_palette};
    use crate::render::tests::MockRenderer;
    use crate::test_helpers::artboard;
    use crate::tools::tests::{MockConverter, MockPackager};
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Records each prompt and answers with a fixed value.
    struct RecordingPrompter {
        answer: bool,
        asked: RefCell<Vec<PathBuf>>,
    }

    impl RecordingPrompter {
        fn answering(answer: bool) -> Self {
            Self {
                answer,
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl Prompter for RecordingPrompter {
        fn confirm_overwrite(&self, bundle: &Path) -> bool {
            self.asked.borrow_mut().push(bundle.to_path_buf());
            self.answer
        }
    }

    fn gear_layers() -> Vec<Layer> {
        vec![
            artboard("1", "D/gear/Normal", "#e0e0e0", &[("png", "1x"), ("png", "2x")]),
            artboard("2", "D/gear/Hover", "#e0e0e0", &[("png", "1x"), ("png", "2x")]),
        ]
    }

    fn run(
        layers: &[Layer],
        doc: &Document,
        dest: &Path,
        packager: &MockPackager,
        converter: &MockConverter,
        prompter: &dyn Prompter,
    ) -> ExportReport {
        let renderer = MockRenderer::new();
        let tools = Collaborators {
            renderer: &renderer,
            packager,
            converter,
            prompter,
        };
        let refs: Vec<&Layer> = layers.iter().collect();
        export_icons(&refs, doc, dest, &BundleConfig::default(), &tools, None).unwrap()
    }

    // =========================================================================
    // Export
    // =========================================================================

    #[test]
    fn gear_exports_four_files_and_four_links() {
        let dest = TempDir::new().unwrap();
        let packager = MockPackager::new();
        let converter = MockConverter::producing(1);

        let report = run(
            &gear_layers(),
            &Document::default(),
            dest.path(),
            &packager,
            &converter,
            &OverwritePolicy::Never,
        );
        assert_eq!(
            report.icons[0].outcome,
            IconOutcome::Packaged {
                bundle: dest.path().join("gear.dci"),
                canonical: 4,
                links: 4,
            }
        );

        let packed = packager.packed();
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].icon_dir, "gear");
        assert_eq!(packed[0].dest_dir, dest.path());
        assert_eq!(packed[0].entries.len(), 8);
        assert_eq!(packed[0].entries.iter().filter(|e| e.contains(" -> ")).count(), 4);
        assert!(dest.path().join("gear.dci").exists());
    }

    #[test]
    fn staging_directory_is_removed() {
        let dest = TempDir::new().unwrap();
        let packager = MockPackager::new();
        let converter = MockConverter::producing(1);
        run(
            &gear_layers(),
            &Document::default(),
            dest.path(),
            &packager,
            &converter,
            &OverwritePolicy::Never,
        );
        let packed = packager.packed();
        let staging_root = packed[0].staged_dir.parent().unwrap();
        assert!(!staging_root.exists());
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 1);
    }

    #[test]
    fn one_bundle_per_icon_in_encounter_order() {
        let dest = TempDir::new().unwrap();
        let layers = vec![
            artboard("1", "D/home/Normal", "#f0f0f0", &[("png", "1x")]),
            artboard("2", "Cover", "#f0f0f0", &[("png", "1x")]),
            artboard("3", "D/gear/Normal", "#1f1f1f", &[("png", "1x")]),
        ];
        let packager = MockPackager::new();
        let converter = MockConverter::producing(1);
        let report = run(
            &layers,
            &Document::default(),
            dest.path(),
            &packager,
            &converter,
            &OverwritePolicy::Never,
        );
        let names: Vec<&str> = report.icons.iter().map(|r| r.icon_name.as_str()).collect();
        assert_eq!(names, vec!["home", "gear"]);
        assert_eq!(report.packaged(), 2);
    }

    #[test]
    fn missing_destination_is_an_error() {
        let packager = MockPackager::new();
        let converter = MockConverter::producing(1);
        let renderer = MockRenderer::new();
        let tools = Collaborators {
            renderer: &renderer,
            packager: &packager,
            converter: &converter,
            prompter: &OverwritePolicy::Never,
        };
        let result = export_icons(
            &[],
            &Document::default(),
            Path::new("/nonexistent/dest"),
            &BundleConfig::default(),
            &tools,
            None,
        );
        assert!(matches!(result, Err(ExportError::MissingDestination(_))));
    }

    #[test]
    fn declined_overwrite_skips_and_keeps_bundle() {
        let dest = TempDir::new().unwrap();
        std::fs::write(dest.path().join("gear.dci"), b"old").unwrap();
        let packager = MockPackager::new();
        let converter = MockConverter::producing(1);
        let prompter = RecordingPrompter::answering(false);

        let report = run(
            &gear_layers(),
            &Document::default(),
            dest.path(),
            &packager,
            &converter,
            &prompter,
        );
        assert_eq!(report.icons[0].outcome, IconOutcome::Skipped);
        assert_eq!(prompter.asked.borrow().as_slice(), &[dest.path().join("gear.dci")]);
        assert!(packager.packed().is_empty());
        assert_eq!(std::fs::read(dest.path().join("gear.dci")).unwrap(), b"old");
    }

    #[test]
    fn accepted_overwrite_replaces_bundle() {
        let dest = TempDir::new().unwrap();
        std::fs::create_dir(dest.path().join("gear.dci")).unwrap();
        let packager = MockPackager::new();
        let converter = MockConverter::producing(1);

        let report = run(
            &gear_layers(),
            &Document::default(),
            dest.path(),
            &packager,
            &converter,
            &OverwritePolicy::Always,
        );
        assert_eq!(report.packaged(), 1);
        assert_eq!(std::fs::read(dest.path().join("gear.dci")).unwrap(), b"DCI\0");
    }

    #[test]
    fn packager_failure_is_reported_with_output() {
        let dest = TempDir::new().unwrap();
        let packager = MockPackager::failing(2);
        let converter = MockConverter::producing(1);

        let report = run(
            &gear_layers(),
            &Document::default(),
            dest.path(),
            &packager,
            &converter,
            &OverwritePolicy::Never,
        );
        match &report.icons[0].outcome {
            IconOutcome::Failed { reason, stderr, .. } => {
                assert!(reason.contains('2'));
                assert_eq!(stderr, "dci: broken layout");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn missing_packager_fails_each_icon() {
        let dest = TempDir::new().unwrap();
        let packager = MockPackager {
            missing: true,
            ..MockPackager::new()
        };
        let converter = MockConverter::producing(1);
        let mut layers = gear_layers();
        layers.push(artboard("3", "D/home/Normal", "#e0e0e0", &[("png", "1x")]));

        let report = run(
            &layers,
            &Document::default(),
            dest.path(),
            &packager,
            &converter,
            &OverwritePolicy::Never,
        );
        assert_eq!(report.failed(), 2);
    }

    #[test]
    fn icon_without_usable_artboards_fails_and_keeps_old_bundle() {
        let dest = TempDir::new().unwrap();
        std::fs::write(dest.path().join("gear.dci"), b"old").unwrap();
        let layers = vec![artboard("1", "D/gear/Normal", "#ff00ff", &[("png", "1x")])];
        let packager = MockPackager::new();
        let converter = MockConverter::producing(1);

        let report = run(
            &layers,
            &Document::default(),
            dest.path(),
            &packager,
            &converter,
            &OverwritePolicy::Always,
        );
        assert_eq!(report.failed(), 1);
        assert_eq!(report.icons[0].skipped_artboards.len(), 1);
        assert_eq!(std::fs::read(dest.path().join("gear.dci")).unwrap(), b"old");
    }

    #[test]
    fn events_cover_every_icon() {
        let dest = TempDir::new().unwrap();
        let mut layers = gear_layers();
        layers.push(artboard("3", "D/gear/Pressed", "#abcdef", &[("png", "1x")]));
        let mut doc = Document::default();
        store_palette(&mut doc, "1", &PaletteSetting::new(PaletteRole::Foreground, [0; 7]));
        let packager = MockPackager::new();
        let converter = MockConverter::producing(1);
        let renderer = MockRenderer::new();
        let tools = Collaborators {
            renderer: &renderer,
            packager: &packager,
            converter: &converter,
            prompter: &OverwritePolicy::Never,
        };
        let refs: Vec<&Layer> = layers.iter().collect();
        let (tx, rx) = std::sync::mpsc::channel();

        export_icons(&refs, &doc, dest.path(), &BundleConfig::default(), &tools, Some(tx)).unwrap();
        let events: Vec<ExportEvent> = rx.iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ExportEvent::IconStarted { artboards: 3, .. }));
        assert!(matches!(&events[1], ExportEvent::ArtboardSkipped { skipped, .. } if skipped.artboard == "D/gear/Pressed"));
        assert!(matches!(
            &events[2],
            ExportEvent::IconFinished { outcome: IconOutcome::Packaged { .. }, .. }
        ));
        assert!(converter.call_count() > 0);
    }

    // =========================================================================
    // Open
    // =========================================================================

    fn fixture_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("gear/16/normal.light/2");
        std::fs::create_dir_all(&dir).unwrap();
        image::RgbaImage::from_pixel(32, 32, image::Rgba([1, 2, 3, 255]))
            .save(dir.join("1.png"))
            .unwrap();
        let dark = tmp.path().join("gear/16/normal.dark/2");
        std::fs::create_dir_all(&dark).unwrap();
        std::fs::write(dark.join("1.0.png.alpha8"), b"alpha").unwrap();
        tmp
    }

    #[test]
    fn open_rejects_non_bundle_paths() {
        let packager = MockPackager::new();
        let out = TempDir::new().unwrap();
        let err = open_bundle(
            Path::new("gear.png"),
            out.path(),
            &BundleConfig::default(),
            &packager,
        )
        .unwrap_err();
        assert!(matches!(err, OpenError::NotABundle(_)));
    }

    #[test]
    fn open_writes_manifest_and_png() {
        let fixture = fixture_tree();
        let packager = MockPackager {
            unpack_fixture: Some(fixture.path().to_path_buf()),
            ..MockPackager::new()
        };
        let out = TempDir::new().unwrap();

        let report = open_bundle(
            Path::new("/bundles/gear.dci"),
            out.path(),
            &BundleConfig::default(),
            &packager,
        )
        .unwrap();
        assert_eq!(report.icon_name, "gear");
        assert_eq!(report.layer_count(), 2);
        assert_eq!(report.canvas.groups[0].relative_path, "16/normal.dark/2");
        assert!(report.canvas.groups[0].is_dark_variant);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report.manifest_path).unwrap()).unwrap();
        assert_eq!(json["icon_name"], "gear");
        let png = report.png_path.unwrap();
        let img = image::open(png).unwrap();
        assert_eq!(img.width() as f64, report.canvas.width.ceil());
    }

    #[test]
    fn open_without_png_rendering() {
        let fixture = fixture_tree();
        let packager = MockPackager {
            unpack_fixture: Some(fixture.path().to_path_buf()),
            ..MockPackager::new()
        };
        let out = TempDir::new().unwrap();
        let mut config = BundleConfig::default();
        config.preview.render_png = false;

        let report = open_bundle(Path::new("gear.DCI"), out.path(), &config, &packager).unwrap();
        assert!(report.png_path.is_none());
        assert!(!out.path().join("gear.preview.png").exists());
    }

    #[test]
    fn failed_unpack_surfaces_output() {
        let packager = MockPackager::failing(1);
        let out = TempDir::new().unwrap();
        let err = open_bundle(
            Path::new("gear.dci"),
            out.path(),
            &BundleConfig::default(),
            &packager,
        )
        .unwrap_err();
        assert!(matches!(err, OpenError::Unpack { status: Some(1), .. }));
    }
}
