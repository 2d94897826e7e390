//! Final composite rendering.
//!
//! Layers are painted onto a fresh [`Surface`] in a fixed order that callers
//! cannot change:
//!
//! 1. the background, stretched to the canvas,
//! 2. text layers in sequence order,
//! 3. overlays in sequence order, each under its own opacity,
//! 4. the foreground cut-out, stretched to the canvas.
//!
//! Within a kind, a later layer always lands on top of an earlier one. The
//! canvas takes the background's natural pixel size.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use image::{ImageEncoder, RgbaImage};
use tracing::{debug, info, warn};

use crate::color::{DEFAULT_FILL, parse_css_color};
use crate::error::{CompositeError, CompositeWarning, LoadError};
use crate::geometry::{CanvasSize, overlay_rect, text_anchor};
use crate::layers::{OverlayImage, TextLayer};
use crate::loader::{DecodedImage, ImageLoader, ImageSource};
use crate::surface::Surface;
use crate::text::{FontBook, fill_mask, rasterize_line};

/// Snapshot consumed by a single composite.
#[derive(Debug, Clone)]
pub struct CompositionInput {
    pub background: ImageSource,
    pub foreground: Option<ImageSource>,
    /// Draw order; later entries are drawn on top.
    pub texts: Vec<TextLayer>,
    /// Draw order; later entries are drawn on top.
    pub overlays: Vec<OverlayImage>,
}

/// Encoded PNG at the background's natural size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalRasterArtifact {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

#[derive(Debug)]
pub struct Composite {
    pub artifact: FinalRasterArtifact,
    /// Layers that were skipped, in the order they were encountered.
    pub warnings: Vec<CompositeWarning>,
}

#[derive(Debug, Clone, Copy)]
pub struct CompositorOptions {
    /// Canvas font size in pixels per unit of `TextLayer::font_size`.
    pub text_scale: f32,
    /// Per-image load timeout; `None` waits indefinitely.
    pub load_timeout: Option<Duration>,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            text_scale: 3.0,
            load_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compositor {
    fonts: Arc<FontBook>,
    loader: ImageLoader,
    options: CompositorOptions,
}

struct DecodedLayers {
    background: DecodedImage,
    overlays: Vec<Result<DecodedImage, LoadError>>,
    foreground: Option<Result<DecodedImage, LoadError>>,
}

impl Compositor {
    pub fn new(fonts: Arc<FontBook>, options: CompositorOptions) -> Self {
        Self {
            fonts,
            loader: ImageLoader::with_timeout(options.load_timeout),
            options,
        }
    }

    pub fn options(&self) -> &CompositorOptions {
        &self.options
    }

    /// Renders `input` and encodes it as PNG.
    ///
    /// Each call paints on its own surface, so concurrent calls never
    /// interfere. Only a background that cannot be loaded is fatal; any other
    /// unusable layer is left out and reported in [`Composite::warnings`].
    pub async fn composite(&self, input: CompositionInput) -> Result<Composite, CompositeError> {
        let decoded = self.load_all(&input).await?;
        let fonts = Arc::clone(&self.fonts);
        let options = self.options;
        tokio::task::spawn_blocking(move || render(&input, decoded, &fonts, &options))
            .await
            .map_err(|err| CompositeError::Render(anyhow::anyhow!("render task failed: {err}")))?
    }

    /// Loads every image the input needs. All loads run concurrently; results
    /// are kept in sequence order regardless of which finished first.
    async fn load_all(&self, input: &CompositionInput) -> Result<DecodedLayers, CompositeError> {
        let background = self.loader.load(&input.background);
        let overlays = join_all(input.overlays.iter().map(|o| self.loader.load(o.image())));
        let foreground = async {
            match &input.foreground {
                Some(source) => Some(self.loader.load(source).await),
                None => None,
            }
        };
        let (background, overlays, foreground) = futures::join!(background, overlays, foreground);
        let background = background.map_err(CompositeError::BackgroundDecode)?;
        Ok(DecodedLayers {
            background,
            overlays,
            foreground,
        })
    }
}

fn render(
    input: &CompositionInput,
    decoded: DecodedLayers,
    fonts: &FontBook,
    options: &CompositorOptions,
) -> Result<Composite, CompositeError> {
    let DecodedLayers {
        background,
        overlays,
        foreground,
    } = decoded;
    let canvas = CanvasSize::new(background.width(), background.height());
    let mut surface = Surface::new(canvas);
    let mut warnings = Vec::new();

    surface
        .draw_image(background.pixels(), canvas.full_rect())
        .map_err(CompositeError::Render)?;

    for layer in &input.texts {
        if let Some(warning) = draw_text_layer(&mut surface, layer, fonts, options) {
            warn!(%warning, "text layer skipped");
            warnings.push(warning);
        }
    }

    for (overlay, image) in input.overlays.iter().zip(overlays) {
        match image {
            Ok(image) => draw_overlay(&mut surface, overlay, &image)?,
            Err(error) => {
                let warning = CompositeWarning::OverlayDecode {
                    id: overlay.id(),
                    error,
                };
                warn!(%warning, "overlay skipped");
                warnings.push(warning);
            }
        }
    }

    match foreground {
        Some(Ok(image)) => surface
            .draw_image(image.pixels(), canvas.full_rect())
            .map_err(CompositeError::Render)?,
        Some(Err(error)) => {
            let warning = CompositeWarning::ForegroundDecode(error);
            warn!(%warning, "foreground skipped");
            warnings.push(warning);
        }
        None => debug!("no foreground cut-out to draw"),
    }

    let artifact = encode_png(surface.into_pixels())?;
    info!(
        width = artifact.width,
        height = artifact.height,
        texts = input.texts.len(),
        overlays = input.overlays.len(),
        skipped = warnings.len(),
        "composite rendered"
    );
    Ok(Composite { artifact, warnings })
}

fn draw_text_layer(
    surface: &mut Surface,
    layer: &TextLayer,
    fonts: &FontBook,
    options: &CompositorOptions,
) -> Option<CompositeWarning> {
    if layer.text.is_empty() {
        return None;
    }
    let Some(font) = fonts.resolve(&layer.font_family, layer.font_weight) else {
        return Some(CompositeWarning::FontUnavailable {
            id: layer.id(),
            family: layer.font_family.clone(),
        });
    };
    let color = parse_css_color(&layer.color).unwrap_or_else(|| {
        debug!(id = %layer.id(), color = %layer.color, "unparseable colour, using default fill");
        DEFAULT_FILL
    });
    let em_px = layer.font_size * options.text_scale;
    let canvas = surface.size();
    let mask = rasterize_line(&font, em_px, &layer.text, canvas)?;
    let anchor = text_anchor(layer.left, layer.top, canvas);
    surface.with_global_alpha(layer.opacity, |s| {
        fill_mask(s, &mask, anchor, layer.rotation, color)
    });
    None
}

fn draw_overlay(
    surface: &mut Surface,
    overlay: &OverlayImage,
    image: &DecodedImage,
) -> Result<(), CompositeError> {
    let t = overlay.transform;
    let rect = overlay_rect(&t, surface.size(), image.width(), image.height());
    debug!(id = %overlay.id(), ?rect, opacity = t.opacity, "drawing overlay");
    surface
        .with_global_alpha(t.opacity, |s| s.draw_image(image.pixels(), rect))
        .map_err(CompositeError::Render)
}

fn encode_png(pixels: RgbaImage) -> Result<FinalRasterArtifact, CompositeError> {
    let (width, height) = pixels.dimensions();
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png).write_image(
        pixels.as_raw(),
        width,
        height,
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(FinalRasterArtifact { width, height, png })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png(img: &RgbaImage) -> ImageSource {
        let mut out = Vec::new();
        image::codecs::png::PngEncoder::new(&mut out)
            .write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                image::ExtendedColorType::Rgba8,
            )
            .unwrap();
        ImageSource::from_bytes(out)
    }

    fn compositor() -> Compositor {
        Compositor::new(Arc::new(FontBook::empty()), CompositorOptions::default())
    }

    #[tokio::test]
    async fn canvas_takes_background_size() {
        let bg = RgbaImage::from_pixel(8, 6, Rgba([255, 255, 255, 255]));
        let out = compositor()
            .composite(CompositionInput {
                background: png(&bg),
                foreground: None,
                texts: vec![],
                overlays: vec![],
            })
            .await
            .unwrap();
        assert_eq!((out.artifact.width, out.artifact.height), (8, 6));
        let decoded = image::load_from_memory(&out.artifact.png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 6));
        assert!(decoded.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[tokio::test]
    async fn missing_font_is_reported_not_fatal() {
        let bg = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let (_, texts) = crate::layers::LayerSet::new().add(TextLayer::default());
        let out = compositor()
            .composite(CompositionInput {
                background: png(&bg),
                foreground: None,
                texts: texts.as_slice().to_vec(),
                overlays: vec![],
            })
            .await
            .unwrap();
        assert!(matches!(
            out.warnings.as_slice(),
            [CompositeWarning::FontUnavailable { .. }]
        ));
    }

    #[tokio::test]
    async fn unreadable_background_is_fatal() {
        let err = compositor()
            .composite(CompositionInput {
                background: ImageSource::from_bytes(vec![0xde, 0xad]),
                foreground: None,
                texts: vec![],
                overlays: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CompositeError::BackgroundDecode(_)));
    }

    #[tokio::test]
    async fn broken_foreground_is_skipped() {
        let bg = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        let out = compositor()
            .composite(CompositionInput {
                background: png(&bg),
                foreground: Some(ImageSource::from_bytes(vec![1, 2, 3])),
                texts: vec![],
                overlays: vec![],
            })
            .await
            .unwrap();
        assert!(matches!(
            out.warnings.as_slice(),
            [CompositeWarning::ForegroundDecode(_)]
        ));
        let decoded = image::load_from_memory(&out.artifact.png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
    }
}
