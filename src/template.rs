//! Creating and renaming icon artboards.
//!
//! `new` lays out one artboard per [`IconMode`] to the right of everything on
//! the page:
//!
//! ```text
//!   x = right_edge + spacing
//!   ┌──────┐ ┌──────┐ ┌───────┐ ┌────────┐
//!   │Normal│ │Hover │ │Pressed│ │Disabled│   generic, or /Light when theme-sensitive
//!   └──────┘ └──────┘ └───────┘ └────────┘
//!   ┌──────┐ ┌──────┐ ┌───────┐ ┌────────┐
//!   │Normal│ │Hover │ │Pressed│ │Disabled│   /Dark (theme-sensitive only)
//!   └──────┘ └──────┘ └───────┘ └────────┘
//! ```

use crate::config::BundleConfig;
use crate::document::{Document, DocumentError, ExportFormat, Frame, Layer, LayerKind};
use crate::naming::{
    ExplicitTheme, IconMode, IconSpecName, NameError, parse_icon_name, rename_icon,
    validate_icon_name,
};
use crate::scale::format_number;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Invalid icon name: {0}")]
    Name(#[from] NameError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Append the artboards of a new icon to `page`. Returns the new layer ids.
pub fn new_icon(
    document: &mut Document,
    page: &str,
    icon_name: &str,
    theme_sensitive: bool,
    config: &BundleConfig,
) -> Result<Vec<String>, TemplateError> {
    validate_icon_name(icon_name)?;
    let in_use = document
        .all_layers()
        .iter()
        .filter_map(|l| parse_icon_name(&l.name).into_icon())
        .any(|spec| spec.icon_name == icon_name);
    if in_use {
        tracing::warn!("Artboards for {icon_name} already exist; they will share one bundle");
    }

    let template = &config.template;
    let export_formats: Vec<ExportFormat> = template
        .scales
        .iter()
        .map(|&scale| ExportFormat {
            file_format: template.format.clone(),
            size: format!("{}x", format_number(scale)),
        })
        .collect();

    let rows: Vec<(Option<ExplicitTheme>, &str)> = if theme_sensitive {
        vec![
            (Some(ExplicitTheme::Light), config.theme.light.as_str()),
            (Some(ExplicitTheme::Dark), config.theme.dark.as_str()),
        ]
    } else {
        vec![(None, config.theme.generic.as_str())]
    };

    let mut taken: Vec<String> = document.all_layers().iter().map(|l| l.id.clone()).collect();
    let page = document.page_mut(page)?;
    let left = page.right_edge() + template.spacing;
    let step = template.artboard_size + template.spacing;

    let mut ids = Vec::new();
    for (row, (theme, color)) in rows.into_iter().enumerate() {
        for (column, mode) in IconMode::ALL.into_iter().enumerate() {
            let spec = IconSpecName {
                icon_name: icon_name.to_string(),
                mode,
                explicit_theme: theme,
                is_background_layer: false,
            };
            let id = unique_id(&spec, &taken);
            taken.push(id.clone());
            page.layers.push(Layer {
                id: id.clone(),
                name: spec.render(),
                kind: LayerKind::Artboard,
                frame: Frame {
                    x: left + column as f64 * step,
                    y: template.spacing + row as f64 * step,
                    width: template.artboard_size,
                    height: template.artboard_size,
                },
                background_color: color.to_string(),
                export_formats: export_formats.clone(),
                source: None,
            });
            ids.push(id);
        }
    }
    Ok(ids)
}

fn unique_id(spec: &IconSpecName, taken: &[String]) -> String {
    let mut base = format!("{}-{}", spec.icon_name, spec.mode.dir_name());
    if let Some(theme) = spec.explicit_theme {
        base.push('-');
        base.push_str(&theme.as_str().to_ascii_lowercase());
    }
    let mut id = base.clone();
    let mut n = 2;
    while taken.contains(&id) {
        id = format!("{base}-{n}");
        n += 1;
    }
    id
}

/// Give the selected icon artboards a new icon name. Returns how many changed.
///
/// Non-icon layers in the selection are left alone. An invalid name changes
/// nothing.
pub fn rename_artboards(
    document: &mut Document,
    ids: &[String],
    new_name: &str,
) -> Result<usize, NameError> {
    validate_icon_name(new_name)?;
    let mut renamed = 0;
    for layer in document.layers_by_id_mut(ids) {
        if !layer.is_artboard() {
            continue;
        }
        if let Some(name) = rename_icon(&layer.name, new_name)? {
            tracing::debug!("Renamed {} to {name}", layer.name);
            layer.name = name;
            renamed += 1;
        }
    }
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;
    use crate::layout::classify_icons;
    use crate::scale::resolve_scales;
    use crate::test_helpers::artboard;

    fn doc_with_page(layers: Vec<Layer>) -> Document {
        Document {
            pages: vec![Page {
                name: "Icons".into(),
                layers,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn generic_icon_gets_one_row() {
        let mut doc = doc_with_page(Vec::new());
        let ids = new_icon(&mut doc, "Icons", "gear", false, &BundleConfig::default()).unwrap();
        assert_eq!(ids.len(), 4);

        let layers = &doc.pages[0].layers;
        let names: Vec<&str> = layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["D/gear/Normal", "D/gear/Hover", "D/gear/Pressed", "D/gear/Disabled"]
        );
        assert!(layers.iter().all(|l| l.background_color == "#e0e0e0"));
        let xs: Vec<f64> = layers.iter().map(|l| l.frame.x).collect();
        assert_eq!(xs, vec![40.0, 116.0, 192.0, 268.0]);
        assert!(layers.iter().all(|l| l.frame.y == 40.0));
    }

    #[test]
    fn theme_sensitive_icon_gets_light_and_dark_rows() {
        let mut doc = doc_with_page(Vec::new());
        new_icon(&mut doc, "Icons", "gear", true, &BundleConfig::default()).unwrap();

        let layers = &doc.pages[0].layers;
        assert_eq!(layers.len(), 8);
        assert_eq!(layers[0].name, "D/gear/Normal/Light");
        assert_eq!(layers[0].background_color, "#f0f0f0");
        assert_eq!(layers[4].name, "D/gear/Normal/Dark");
        assert_eq!(layers[4].background_color, "#1f1f1f");
        assert_eq!(layers[4].frame.x, layers[0].frame.x);
        assert_eq!(layers[4].frame.y, 40.0 + 36.0 + 40.0);
    }

    #[test]
    fn new_icon_is_placed_right_of_existing_layers() {
        let mut existing = artboard("a", "Cover", "#ffffff", &[]);
        existing.frame = Frame { x: 100.0, y: 0.0, width: 200.0, height: 50.0 };
        let mut doc = doc_with_page(vec![existing]);
        new_icon(&mut doc, "Icons", "gear", false, &BundleConfig::default()).unwrap();
        assert_eq!(doc.pages[0].layers[1].frame.x, 340.0);
    }

    #[test]
    fn new_icon_declares_template_scales() {
        let mut doc = doc_with_page(Vec::new());
        new_icon(&mut doc, "Icons", "gear", false, &BundleConfig::default()).unwrap();
        let ratios: Vec<f64> = resolve_scales(&doc.pages[0].layers[0])
            .iter()
            .map(|s| s.ratio)
            .collect();
        assert_eq!(ratios, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn new_icon_classifies_as_one_group() {
        let mut doc = doc_with_page(Vec::new());
        new_icon(&mut doc, "Icons", "gear", true, &BundleConfig::default()).unwrap();
        let groups = classify_icons(&doc.all_layers());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 8);
    }

    #[test]
    fn ids_stay_unique_when_icon_is_added_twice() {
        let mut doc = doc_with_page(Vec::new());
        let first = new_icon(&mut doc, "Icons", "gear", false, &BundleConfig::default()).unwrap();
        let second = new_icon(&mut doc, "Icons", "gear", false, &BundleConfig::default()).unwrap();
        assert_eq!(first[0], "gear-normal");
        assert_eq!(second[0], "gear-normal-2");
    }

    #[test]
    fn invalid_name_changes_nothing() {
        let mut doc = doc_with_page(Vec::new());
        let err = new_icon(&mut doc, "Icons", "gear icon", false, &BundleConfig::default());
        assert!(matches!(err, Err(TemplateError::Name(NameError::InvalidCharacter(_)))));
        assert!(doc.pages[0].layers.is_empty());
    }

    #[test]
    fn unknown_page_is_an_error() {
        let mut doc = doc_with_page(Vec::new());
        let err = new_icon(&mut doc, "Other", "gear", false, &BundleConfig::default());
        assert!(matches!(err, Err(TemplateError::Document(DocumentError::UnknownPage(_)))));
    }

    #[test]
    fn rename_rewrites_only_the_icon_segment() {
        let mut doc = doc_with_page(vec![
            artboard("1", "D/gear/Normal/Dark", "#1f1f1f", &[]),
            artboard("2", "Cover", "#ffffff", &[]),
            artboard("3", "D/gear/Hover", "#e0e0e0", &[]),
        ]);
        let ids: Vec<String> = vec!["1".into(), "2".into()];
        assert_eq!(rename_artboards(&mut doc, &ids, "cog").unwrap(), 1);
        let names: Vec<&str> = doc.pages[0].layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["D/cog/Normal/Dark", "Cover", "D/gear/Hover"]);
    }

    #[test]
    fn rename_rejects_dotted_names() {
        let mut doc = doc_with_page(vec![artboard("1", "D/gear/Normal", "#e0e0e0", &[])]);
        let err = rename_artboards(&mut doc, &["1".to_string()], "gear.v2").unwrap_err();
        assert_eq!(err, NameError::InvalidCharacter("gear.v2".into()));
        assert_eq!(doc.pages[0].layers[0].name, "D/gear/Normal");
    }
}
