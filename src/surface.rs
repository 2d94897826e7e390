//! The drawing surface a composite is painted on.
//!
//! Mirrors the parts of a 2D canvas context the compositor needs: a straight
//! alpha RGBA raster, a `global_alpha` that scales every draw, and
//! source-over blending. `global_alpha` is only ever changed through
//! [`Surface::with_global_alpha`], which puts the previous value back once the
//! scoped draw returns.

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::{Rgba, RgbaImage};

use crate::geometry::{CanvasSize, Rect};

#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
    global_alpha: f32,
}

impl Surface {
    /// Fully transparent surface.
    pub fn new(size: CanvasSize) -> Self {
        Self {
            pixels: RgbaImage::new(size.width, size.height),
            global_alpha: 1.0,
        }
    }

    pub fn size(&self) -> CanvasSize {
        CanvasSize::new(self.pixels.width(), self.pixels.height())
    }

    pub fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Runs `draw` with `global_alpha` set to `alpha`, then restores the
    /// previous value.
    pub fn with_global_alpha<T>(&mut self, alpha: f32, draw: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.global_alpha;
        self.global_alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            previous
        };
        let out = draw(self);
        self.global_alpha = previous;
        out
    }

    /// Source-over blend of `src` at `(x, y)` with extra `coverage` in `[0, 1]`.
    /// Out-of-bounds coordinates are ignored.
    pub fn blend_pixel(&mut self, x: i64, y: i64, src: Rgba<u8>, coverage: f32) {
        if x < 0 || y < 0 || x >= self.pixels.width() as i64 || y >= self.pixels.height() as i64 {
            return;
        }
        let alpha = (src[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0) * self.global_alpha;
        if alpha <= 0.0 {
            return;
        }
        let dst = self.pixels.get_pixel_mut(x as u32, y as u32);
        *dst = source_over(*dst, src, alpha);
    }

    /// Draws `image` stretched into `rect`; edges are snapped to whole pixels.
    ///
    /// Only the part of `rect` that meets the canvas is resampled, so the
    /// work is bounded by the canvas size however large `rect` is.
    pub fn draw_image(&mut self, image: &RgbaImage, rect: Rect) -> Result<()> {
        let x0 = rect.x.round() as f64;
        let y0 = rect.y.round() as f64;
        let x1 = (rect.x + rect.width).round() as f64;
        let y1 = (rect.y + rect.height).round() as f64;
        let dest_w = x1 - x0;
        let dest_h = y1 - y0;
        if !(dest_w >= 1.0 && dest_h >= 1.0) || image.width() == 0 || image.height() == 0 {
            return Ok(());
        }
        let canvas = self.size();
        let vx0 = x0.max(0.0);
        let vy0 = y0.max(0.0);
        let vx1 = x1.min(canvas.width as f64);
        let vy1 = y1.min(canvas.height as f64);
        if vx1 <= vx0 || vy1 <= vy0 {
            return Ok(());
        }

        // visible window mapped back into source pixels
        let (src_w, src_h) = (image.width() as f64, image.height() as f64);
        let crop = SourceWindow::new(
            (vx0 - x0) * src_w / dest_w,
            (vy0 - y0) * src_h / dest_h,
            (vx1 - vx0) * src_w / dest_w,
            (vy1 - vy0) * src_h / dest_h,
            src_w,
            src_h,
        );
        let scaled = resize_rgba(image, crop, (vx1 - vx0) as u32, (vy1 - vy0) as u32)?;
        let (ox, oy) = (vx0 as i64, vy0 as i64);
        let full_opacity = self.global_alpha >= 1.0;
        for (sx, sy, px) in scaled.enumerate_pixels() {
            let (x, y) = (ox + sx as i64, oy + sy as i64);
            if full_opacity && px[3] == 255 {
                if x >= 0 && y >= 0 && x < canvas.width as i64 && y < canvas.height as i64 {
                    self.pixels.put_pixel(x as u32, y as u32, *px);
                }
            } else {
                self.blend_pixel(x, y, *px, 1.0);
            }
        }
        Ok(())
    }
}

fn source_over(dst: Rgba<u8>, src: Rgba<u8>, src_alpha: f32) -> Rgba<u8> {
    let dst_alpha = dst[3] as f32 / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha <= f32::EPSILON {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let s = src[c] as f32 * src_alpha;
        let d = dst[c] as f32 * dst_alpha * (1.0 - src_alpha);
        out[c] = ((s + d) / out_alpha).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

/// Region of a source image, in source pixels, kept inside its bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SourceWindow {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl SourceWindow {
    fn new(left: f64, top: f64, width: f64, height: f64, src_w: f64, src_h: f64) -> Self {
        let left = left.clamp(0.0, src_w);
        let top = top.clamp(0.0, src_h);
        Self {
            left,
            top,
            width: fit_extent(left, width, src_w),
            height: fit_extent(top, height, src_h),
        }
    }

    fn is_whole(&self, source: &RgbaImage) -> bool {
        self.left == 0.0
            && self.top == 0.0
            && self.width == source.width() as f64
            && self.height == source.height() as f64
    }
}

// `start + extent` must not pass `limit`, even after rounding.
fn fit_extent(start: f64, extent: f64, limit: f64) -> f64 {
    let extent = extent.min(limit - start);
    if start + extent > limit {
        (limit - start) * (1.0 - 1e-12)
    } else {
        extent
    }
}

fn resize_rgba(
    source: &RgbaImage,
    window: SourceWindow,
    target_w: u32,
    target_h: u32,
) -> Result<RgbaImage> {
    if target_w == 0 || target_h == 0 {
        anyhow::bail!("resize dimensions must be positive");
    }
    if !(window.width > 0.0 && window.height > 0.0) {
        anyhow::bail!("source window is empty: {window:?}");
    }
    let whole = window.is_whole(source);
    if whole && source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for layer resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let mut options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    if !whole {
        options = options.crop(window.left, window.top, window.width, window.height);
    }
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("layer resize failed")?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized RGBA image"))
}
