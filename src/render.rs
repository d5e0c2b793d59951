//! Raster export and preview composition.
//!
//! Rendering artboards belongs to the host editor. The bundle encoder only
//! sees the [`Renderer`] trait; [`SourceImageRenderer`] stands in for the
//! host by resampling a pre-rendered source image per scale.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode source (PNG, WebP, JPEG) | `image::ImageReader` |
//! | Resample to `frame × scale` | `image::imageops::resize` with `Lanczos3` |
//! | Encode PNG / WebP (lossless) / JPEG | `DynamicImage::write_to` |
//! | Compose preview canvas | `image::imageops::overlay` on an `RgbaImage` |

use crate::config::{ThemeColors, parse_hex_color};
use crate::decode::PreviewCanvas;
use crate::document::Layer;
use crate::scale::ImageFormat;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Artboard {0:?} has no source image")]
    NoSource(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Artboard {id:?} has an empty frame at scale {scale}")]
    EmptyFrame { id: String, scale: f64 },
}

/// Export one artboard at a pixel ratio in a given format.
pub trait Renderer {
    fn export(&self, layer: &Layer, scale: f64, format: ImageFormat) -> Result<Vec<u8>, RenderError>;
}

/// Renders artboards from their `source` image, resolved against `base_dir`.
pub struct SourceImageRenderer {
    base_dir: PathBuf,
}

impl SourceImageRenderer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

/// Output pixel size of an artboard at `scale`.
pub fn scaled_dimensions(layer: &Layer, scale: f64) -> Option<(u32, u32)> {
    let w = (layer.frame.width * scale).round();
    let h = (layer.frame.height * scale).round();
    (w >= 1.0 && h >= 1.0 && w.is_finite() && h.is_finite()).then_some((w as u32, h as u32))
}

impl Renderer for SourceImageRenderer {
    fn export(&self, layer: &Layer, scale: f64, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
        let source = layer
            .source
            .as_ref()
            .map(|s| self.base_dir.join(s))
            .ok_or_else(|| RenderError::NoSource(layer.id.clone()))?;
        let (width, height) =
            scaled_dimensions(layer, scale).ok_or_else(|| RenderError::EmptyFrame {
                id: layer.id.clone(),
                scale,
            })?;

        let img = ImageReader::open(&source)?.with_guessed_format()?.decode()?;
        let resized = img.resize_exact(width, height, FilterType::Lanczos3);
        encode(resized, format)
    }
}

fn encode(img: DynamicImage, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        ImageFormat::Png => img.write_to(&mut buf, image::ImageFormat::Png)?,
        ImageFormat::Webp => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut buf, image::ImageFormat::WebP)?,
        // JPEG has no alpha channel
        ImageFormat::Jpg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut buf, image::ImageFormat::Jpeg)?,
    }
    Ok(buf.into_inner())
}

/// Compose a decoded bundle into one image.
///
/// Each layer sits on a flat backing rectangle in the light or dark theme
/// color of its group. Layers that can't be decoded (alpha8 renditions)
/// keep only their backing.
pub fn render_preview(canvas: &PreviewCanvas, colors: &ThemeColors) -> RgbaImage {
    let light = backing(&colors.light);
    let dark = backing(&colors.dark);
    let mut out = RgbaImage::new(canvas.width.ceil() as u32, canvas.height.ceil() as u32);

    for group in &canvas.groups {
        let color = if group.is_dark_variant { dark } else { light };
        for layer in &group.children {
            let (x, y) = (layer.frame.x as i64, layer.frame.y as i64);
            let (w, h) = (layer.frame.width as u32, layer.frame.height as u32);
            fill_rect(&mut out, x, y, w, h, color);
            match decode_layer(&layer.source, w, h) {
                Ok(img) => image::imageops::overlay(&mut out, &img, x, y),
                Err(e) => tracing::warn!("Preview of {} shows backing only: {e}", layer.name),
            }
        }
    }
    out
}

fn backing(hex: &str) -> Rgba<u8> {
    let [r, g, b] = parse_hex_color(hex).unwrap_or([0x80, 0x80, 0x80]);
    Rgba([r, g, b, 0xff])
}

fn fill_rect(img: &mut RgbaImage, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>) {
    let (iw, ih) = (img.width() as i64, img.height() as i64);
    for py in y.max(0)..(y + h as i64).min(ih) {
        for px in x.max(0)..(x + w as i64).min(iw) {
            img.put_pixel(px as u32, py as u32, color);
        }
    }
}

fn decode_layer(path: &Path, w: u32, h: u32) -> Result<RgbaImage, RenderError> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(img.resize_exact(w.max(1), h.max(1), FilterType::Lanczos3).to_rgba8())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::decode::{PreviewGroup, PreviewLayer};
    use crate::document::{Frame, LayerKind};
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Renderer double: returns `len_for(format)` bytes and records each call.
    pub struct MockRenderer {
        pub png_len: usize,
        pub webp_len: usize,
        pub fail: bool,
        pub calls: RefCell<Vec<(String, f64, ImageFormat)>>,
    }

    impl MockRenderer {
        pub fn new() -> Self {
            Self::with_sizes(1000, 800)
        }

        pub fn with_sizes(png_len: usize, webp_len: usize) -> Self {
            Self {
                png_len,
                webp_len,
                fail: false,
                calls: RefCell::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        pub fn calls(&self) -> Vec<(String, f64, ImageFormat)> {
            self.calls.borrow().clone()
        }
    }

    impl Renderer for MockRenderer {
        fn export(&self, layer: &Layer, scale: f64, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
            self.calls.borrow_mut().push((layer.id.clone(), scale, format));
            if self.fail {
                return Err(RenderError::NoSource(layer.id.clone()));
            }
            let len = match format {
                ImageFormat::Png => self.png_len,
                ImageFormat::Webp | ImageFormat::Jpg => self.webp_len,
            };
            // First byte ties the content to the scale so links can be told apart.
            let mut bytes = vec![0u8; len];
            if let Some(b) = bytes.first_mut() {
                *b = scale as u8;
            }
            Ok(bytes)
        }
    }

    fn layer(source: Option<&str>, w: f64, h: f64) -> Layer {
        Layer {
            id: "a1".into(),
            name: "D/gear/Normal".into(),
            kind: LayerKind::Artboard,
            frame: Frame {
                x: 0.0,
                y: 0.0,
                width: w,
                height: h,
            },
            background_color: "#e0e0e0".into(),
            export_formats: Vec::new(),
            source: source.map(PathBuf::from),
        }
    }

    fn write_source(dir: &Path) {
        let img = RgbaImage::from_pixel(16, 16, Rgba([10, 20, 30, 255]));
        img.save(dir.join("gear.png")).unwrap();
    }

    #[test]
    fn scaled_dimensions_round() {
        assert_eq!(scaled_dimensions(&layer(None, 36.0, 36.0), 1.5), Some((54, 54)));
        assert_eq!(scaled_dimensions(&layer(None, 0.0, 36.0), 2.0), None);
    }

    #[test]
    fn export_png_at_scale() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path());
        let renderer = SourceImageRenderer::new(tmp.path());

        let bytes = renderer
            .export(&layer(Some("gear.png"), 16.0, 16.0), 2.0, ImageFormat::Png)
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }

    #[test]
    fn export_webp_and_jpg() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path());
        let renderer = SourceImageRenderer::new(tmp.path());
        let l = layer(Some("gear.png"), 16.0, 16.0);

        let webp = renderer.export(&l, 1.0, ImageFormat::Webp).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        let jpg = renderer.export(&l, 1.0, ImageFormat::Jpg).unwrap();
        assert_eq!(&jpg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn export_without_source_fails() {
        let renderer = SourceImageRenderer::new("/tmp");
        assert!(matches!(
            renderer.export(&layer(None, 16.0, 16.0), 1.0, ImageFormat::Png),
            Err(RenderError::NoSource(_))
        ));
    }

    #[test]
    fn preview_draws_backing_and_image() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path());
        let alpha = tmp.path().join("1.0.png.alpha8");
        std::fs::write(&alpha, b"not an image").unwrap();

        let child = |name: &str, source: PathBuf, x: f64, y: f64| PreviewLayer {
            name: name.into(),
            relative_path: name.into(),
            source,
            frame: Frame {
                x,
                y,
                width: 16.0,
                height: 16.0,
            },
        };
        let canvas = PreviewCanvas {
            icon_name: "gear".into(),
            width: 60.0,
            height: 60.0,
            groups: vec![
                PreviewGroup {
                    relative_path: "16/normal.light/1".into(),
                    pixel_width: 16.0,
                    pixel_height: 16.0,
                    is_dark_variant: false,
                    frame: Frame { x: 0.0, y: 0.0, width: 60.0, height: 26.0 },
                    children: vec![child("1.png", tmp.path().join("gear.png"), 10.0, 0.0)],
                },
                PreviewGroup {
                    relative_path: "16/normal.dark/1".into(),
                    pixel_width: 16.0,
                    pixel_height: 16.0,
                    is_dark_variant: true,
                    frame: Frame { x: 0.0, y: 30.0, width: 60.0, height: 26.0 },
                    children: vec![child("1.0.png.alpha8", alpha, 10.0, 30.0)],
                },
            ],
        };

        let img = render_preview(&canvas, &ThemeColors::default());
        assert_eq!(img.dimensions(), (60, 60));
        assert_eq!(img.get_pixel(15, 5), &Rgba([10, 20, 30, 255]));
        assert_eq!(img.get_pixel(15, 35), &Rgba([0x1f, 0x1f, 0x1f, 255]));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
    }
}
