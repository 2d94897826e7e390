//! Font lookup and single-line text rasterization.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use ab_glyph::{Font, FontArc, FontVec, GlyphId, PxScale, ScaleFont, point};
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use image::Rgba;
use tracing::{debug, warn};

use crate::geometry::{CanvasSize, Point};
use crate::surface::Surface;

/// Font faces available to the compositor, keyed by family and weight.
pub struct FontBook {
    db: Database,
    cache: Mutex<HashMap<(String, u16), Option<FontArc>>>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.db.len())
            .finish()
    }
}

impl Default for FontBook {
    fn default() -> Self {
        Self::empty()
    }
}

impl FontBook {
    pub fn empty() -> Self {
        Self {
            db: Database::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Every font installed on the system.
    pub fn system() -> Self {
        let mut book = Self::empty();
        book.db.load_system_fonts();
        debug!(faces = book.db.len(), "loaded system fonts");
        book
    }

    /// Adds every font file found under `dir`.
    pub fn load_dir(&mut self, dir: &Path) {
        let before = self.db.len();
        self.db.load_fonts_dir(dir);
        debug!(dir = %dir.display(), added = self.db.len() - before, "loaded font directory");
        self.clear_cache();
    }

    pub fn load_font_data(&mut self, data: Vec<u8>) {
        self.db.load_font_data(data);
        self.clear_cache();
    }

    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    fn clear_cache(&mut self) {
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Best face for `family` at `weight`. Falls back to a generic sans-serif
    /// face and then to any face at all; `None` only when no face loads.
    pub fn resolve(&self, family: &str, weight: u16) -> Option<FontArc> {
        let key = (family.to_lowercase(), weight);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }
        let font = self.lookup(family, weight);
        if font.is_none() {
            warn!(family, weight, "no usable font face");
        }
        cache.insert(key, font.clone());
        font
    }

    fn lookup(&self, family: &str, weight: u16) -> Option<FontArc> {
        let families = [Family::Name(family), Family::SansSerif];
        let query = Query {
            families: &families,
            weight: Weight(weight.clamp(1, 1000)),
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let preferred = self.db.query(&query);
        if preferred.is_none() {
            debug!(family, "font family not found, falling back to any face");
        }
        preferred
            .into_iter()
            .chain(self.db.faces().map(|face| face.id))
            .find_map(|id| {
                self.db.with_face_data(id, |data, index| {
                    FontVec::try_from_vec_and_index(data.to_vec(), index)
                        .ok()
                        .map(FontArc::new)
                })?
            })
    }
}

const MASK_SIDE_FACTOR: f32 = 8.0;
const MASK_AREA_FACTOR: f32 = 2.0;

/// Coverage of a rasterized line, positioned relative to the text's centre.
///
/// One mask texel covers `texel` canvas pixels; it is above 1 only when the
/// line was too large to rasterize at full resolution.
#[derive(Debug, Clone)]
pub struct TextMask {
    width: u32,
    height: u32,
    /// Offset of the mask's top-left corner from the anchor point, in canvas pixels.
    origin: Point,
    texel: f32,
    coverage: Vec<f32>,
}

impl TextMask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn texel(&self) -> f32 {
        self.texel
    }

    fn at(&self, x: i64, y: i64) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0.0;
        }
        self.coverage[y as usize * self.width as usize + x as usize]
    }

    fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let top = self.at(x0, y0) * (1.0 - fx) + self.at(x0 + 1, y0) * fx;
        let bottom = self.at(x0, y0 + 1) * (1.0 - fx) + self.at(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// Converts an em size in pixels to the scale `ab_glyph` expects.
fn px_scale_for_em(font: &FontArc, em_px: f32) -> PxScale {
    let units_per_em = font.units_per_em().unwrap_or(1000.0);
    PxScale::from(em_px * font.height_unscaled() / units_per_em)
}

fn char_for_line(ch: char) -> char {
    if ch.is_control() { ' ' } else { ch }
}

/// Advance width and ascent-to-descent height of `text` at `em_px`.
fn line_extent(font: &FontArc, em_px: f32, text: &str) -> (f32, f32) {
    let scaled = font.as_scaled(px_scale_for_em(font, em_px));
    let mut caret = 0.0f32;
    let mut previous: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(char_for_line(ch));
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        caret += scaled.h_advance(id);
        previous = Some(id);
    }
    (caret, scaled.ascent() - scaled.descent())
}

/// Lays out `text` on one line, centred horizontally and vertically on the
/// origin. Returns `None` when nothing would be drawn.
///
/// The mask is kept within a few times the area of `canvas`; lines larger
/// than that are rasterized at a coarser texel instead.
pub fn rasterize_line(font: &FontArc, em_px: f32, text: &str, canvas: CanvasSize) -> Option<TextMask> {
    if text.is_empty() || !(em_px.is_finite() && em_px > 0.0) {
        return None;
    }
    let (line_w, line_h) = line_extent(font, em_px, text);
    let texel = mask_texel(line_w, line_h, canvas);
    if !texel.is_finite() {
        return None;
    }
    let mut mask = rasterize_at(font, em_px / texel, text)?;
    mask.texel = texel;
    mask.origin = Point {
        x: mask.origin.x * texel,
        y: mask.origin.y * texel,
    };
    Some(mask)
}

/// Canvas pixels per mask texel for a line box of `line_w x line_h`.
fn mask_texel(line_w: f32, line_h: f32, canvas: CanvasSize) -> f32 {
    let long_side = canvas.width.max(canvas.height).max(1) as f32 * MASK_SIDE_FACTOR;
    let area = canvas.width.max(1) as f32 * canvas.height.max(1) as f32 * MASK_AREA_FACTOR;
    let by_side = line_w.max(line_h) / long_side;
    let by_area = (line_w * line_h / area).sqrt();
    by_side.max(by_area).max(1.0)
}

fn rasterize_at(font: &FontArc, em_px: f32, text: &str) -> Option<TextMask> {
    if !(em_px.is_finite() && em_px > 0.0) {
        return None;
    }
    let scale = px_scale_for_em(font, em_px);
    let scaled = font.as_scaled(scale);
    let ascent = scaled.ascent();
    let descent = scaled.descent();

    let mut caret = 0.0f32;
    let mut previous: Option<GlyphId> = None;
    let mut outlines = Vec::new();
    for ch in text.chars() {
        let id = scaled.glyph_id(char_for_line(ch));
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, point(caret, ascent));
        caret += scaled.h_advance(id);
        previous = Some(id);
        if let Some(outlined) = font.outline_glyph(glyph) {
            outlines.push(outlined);
        }
    }
    if outlines.is_empty() {
        return None;
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for outlined in &outlines {
        let b = outlined.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    let (min_x, min_y) = (min_x.floor(), min_y.floor());
    let width = (max_x.ceil() - min_x).max(1.0) as u32;
    let height = (max_y.ceil() - min_y).max(1.0) as u32;

    let mut coverage = vec![0.0f32; width as usize * height as usize];
    for outlined in &outlines {
        let b = outlined.px_bounds();
        let ox = (b.min.x - min_x) as i64;
        let oy = (b.min.y - min_y) as i64;
        outlined.draw(|x, y, c| {
            let px = ox + x as i64;
            let py = oy + y as i64;
            if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                let cell = &mut coverage[py as usize * width as usize + px as usize];
                *cell = (*cell + c).min(1.0);
            }
        });
    }

    // Middle baseline: the box between ascent and descent is centred on the anchor.
    let center_x = caret / 2.0;
    let center_y = (ascent - descent) / 2.0;
    Some(TextMask {
        width,
        height,
        origin: Point {
            x: min_x - center_x,
            y: min_y - center_y,
        },
        texel: 1.0,
        coverage,
    })
}

/// Paints `mask` in `color`, centred on `anchor` and rotated clockwise by
/// `rotation_deg` around it. Honours the surface's `global_alpha`.
pub fn fill_mask(
    surface: &mut Surface,
    mask: &TextMask,
    anchor: Point,
    rotation_deg: f32,
    color: Rgba<u8>,
) {
    let theta = if rotation_deg.is_finite() {
        rotation_deg.to_radians()
    } else {
        0.0
    };
    let (sin, cos) = theta.sin_cos();

    let extent_x = mask.width as f32 * mask.texel;
    let extent_y = mask.height as f32 * mask.texel;
    let corners = [
        (mask.origin.x, mask.origin.y),
        (mask.origin.x + extent_x, mask.origin.y),
        (mask.origin.x, mask.origin.y + extent_y),
        (mask.origin.x + extent_x, mask.origin.y + extent_y),
    ];
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for (u, v) in corners {
        let x = anchor.x + u * cos - v * sin;
        let y = anchor.y + u * sin + v * cos;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let size = surface.size();
    let x_start = min_x.floor().max(0.0) as i64;
    let y_start = min_y.floor().max(0.0) as i64;
    let x_end = max_x.ceil().min(size.width as f32) as i64;
    let y_end = max_y.ceil().min(size.height as f32) as i64;

    for py in y_start..y_end {
        for px in x_start..x_end {
            let dx = px as f32 + 0.5 - anchor.x;
            let dy = py as f32 + 0.5 - anchor.y;
            // inverse rotation back into mask space
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            let c = mask.sample(
                (u - mask.origin.x) / mask.texel - 0.5,
                (v - mask.origin.y) / mask.texel - 0.5,
            );
            if c > 0.0 {
                surface.blend_pixel(px, py, color, c);
            }
        }
    }
}
