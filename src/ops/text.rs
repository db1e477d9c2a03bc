use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use std::collections::HashMap;
use uuid::Uuid;

use crate::canvas::PixelBuffer;
use crate::error::{EditorError, Result};
use crate::{log_info, log_warn};

// ============================================================================
// TEXT OVERLAYS - model
// ============================================================================

pub const DEFAULT_TEXT: &str = "Your Text Here";
pub const DEFAULT_POSITION: (f32, f32) = (50.0, 50.0);
pub const DEFAULT_FONT_SIZE: f32 = 32.0;
pub const DEFAULT_COLOR: [u8; 4] = [255, 255, 255, 255];

/// A text object drawn over the image until it is burned in.
/// `(x, y)` is the top-left of the first line in buffer pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct TextOverlay {
    pub id: Uuid,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub color: [u8; 4],
    pub font_family: String,
    pub bold: bool,
    pub italic: bool,
}

impl TextOverlay {
    pub fn with_defaults(font_family: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: DEFAULT_TEXT.to_string(),
            x: DEFAULT_POSITION.0,
            y: DEFAULT_POSITION.1,
            font_size: DEFAULT_FONT_SIZE,
            color: DEFAULT_COLOR,
            font_family: font_family.to_string(),
            bold: false,
            italic: false,
        }
    }

    fn apply_patch(&mut self, patch: TextOverlayPatch) {
        if let Some(text) = patch.text { self.text = text; }
        if let Some(x) = patch.x { self.x = x; }
        if let Some(y) = patch.y { self.y = y; }
        if let Some(size) = patch.font_size { self.font_size = size.max(1.0); }
        if let Some(color) = patch.color { self.color = color; }
        if let Some(family) = patch.font_family { self.font_family = family; }
        if let Some(bold) = patch.bold { self.bold = bold; }
        if let Some(italic) = patch.italic { self.italic = italic; }
    }
}

/// Partial update for a [`TextOverlay`]. `None` fields are left alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextOverlayPatch {
    pub text: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub font_size: Option<f32>,
    pub color: Option<[u8; 4]>,
    pub font_family: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
}

/// Ordered overlay collection; draw order is insertion order.
#[derive(Clone, Debug, Default)]
pub struct TextOverlays {
    items: Vec<TextOverlay>,
    active: Option<Uuid>,
    default_family: String,
}

impl TextOverlays {
    pub fn new(default_family: &str) -> Self {
        Self {
            items: Vec::new(),
            active: None,
            default_family: default_family.to_string(),
        }
    }

    /// Append an overlay with default properties and select it.
    pub fn add(&mut self) -> Uuid {
        let overlay = TextOverlay::with_defaults(&self.default_family);
        let id = overlay.id;
        self.items.push(overlay);
        self.active = Some(id);
        id
    }

    /// Merge `patch` into the overlay. Returns `false` for an unknown id.
    pub fn update(&mut self, id: Uuid, patch: TextOverlayPatch) -> bool {
        match self.items.iter_mut().find(|o| o.id == id) {
            Some(overlay) => {
                overlay.apply_patch(patch);
                true
            }
            None => false,
        }
    }

    /// Returns `false` for an unknown id.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|o| o.id != id);
        if self.active == Some(id) {
            self.active = None;
        }
        self.items.len() != before
    }

    pub fn get(&self, id: Uuid) -> Option<&TextOverlay> {
        self.items.iter().find(|o| o.id == id)
    }

    pub fn active(&self) -> Option<Uuid> {
        self.active
    }

    /// Select an overlay. Unknown ids clear the selection.
    pub fn set_active(&mut self, id: Option<Uuid>) {
        self.active = id.filter(|id| self.get(*id).is_some());
    }

    pub fn as_slice(&self) -> &[TextOverlay] {
        &self.items
    }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn clear(&mut self) {
        self.items.clear();
        self.active = None;
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Result<[u8; 4]> {
    let invalid = || EditorError::InvalidColor(s.to_string());
    let hex = s.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(invalid)? as u8;
                out[i] = v * 17;
            }
            Ok(out)
        }
        6 => Ok([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Ok([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => Err(invalid()),
    }
}

// ============================================================================
// RASTERISATION
// ============================================================================

/// Coloured RGBA patch for one overlay, already clipped to the canvas.
/// `(off_x, off_y)` is where its top-left lands on the canvas.
#[derive(Clone, Debug, Default)]
pub struct RasterizedText {
    pub buf: Vec<u8>,
    pub buf_w: u32,
    pub buf_h: u32,
    pub off_x: i32,
    pub off_y: i32,
}

impl RasterizedText {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buf_w == 0 || self.buf_h == 0
    }
}

/// Turns an overlay into pixels. The editor owns one of these; tests swap in
/// a deterministic stub.
pub trait GlyphRasterizer: Send {
    fn rasterize(&mut self, overlay: &TextOverlay, canvas_w: u32, canvas_h: u32) -> RasterizedText;
}

/// Draw overlays onto `surface` in order, later overlays on top.
pub fn draw_overlays(
    surface: &mut PixelBuffer,
    overlays: &[TextOverlay],
    rasterizer: &mut dyn GlyphRasterizer,
) {
    let (w, h) = surface.dimensions();
    for overlay in overlays {
        let raster = rasterizer.rasterize(overlay, w, h);
        if raster.is_empty() {
            continue;
        }
        surface.blend_rgba_at(raster.off_x, raster.off_y, raster.buf_w, raster.buf_h, &raster.buf);
    }
}

/// Cache for rasterized glyph pixel data. Key: (GlyphId, scale_bits).
/// Value: (pixels as (u32, u32, f32), bounds_min_x_at_origin_zero, bounds_min_y_at_origin_zero).
pub type GlyphPixelCache = HashMap<(GlyphId, u32), (Vec<(u32, u32, f32)>, f32, f32)>;

/// ab_glyph scales by line height; overlay sizes are em sizes like CSS px.
fn em_scale(font: &FontArc, font_size: f32) -> f32 {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => font_size * font.height_unscaled() / upem,
        _ => font_size,
    }
}

/// Lay out a single line of text starting at x = 0 with the ascent line at
/// y = 0. Returns `(glyphs, total_width)`.
pub fn layout_text(font: &FontArc, text: &str, scale: f32) -> (Vec<(GlyphId, f32, f32)>, f32) {
    let scaled = font.as_scaled(scale);
    let ascent = scaled.ascent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    (glyphs, cursor_x)
}

/// Rasterize text glyphs into an RGBA patch.
///
/// `(origin_x, origin_y)` is the top-left of the first line in canvas
/// coordinates. Supports multiline text via '\n'. `coverage_buf` is reused
/// between calls.
pub fn rasterize_text(
    font: &FontArc,
    text: &str,
    font_size: f32,
    origin_x: f32,
    origin_y: f32,
    color: [u8; 4],
    bold: bool,
    italic: bool,
    canvas_w: u32,
    canvas_h: u32,
    coverage_buf: &mut Vec<f32>,
    glyph_cache: &mut GlyphPixelCache,
) -> RasterizedText {
    let scale = em_scale(font, font_size);
    let line_height = font.as_scaled(scale).height();

    let mut all_glyphs: Vec<(GlyphId, f32, f32)> = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        let y_offset = line_idx as f32 * line_height;
        let (glyphs, _) = layout_text(font, line, scale);
        all_glyphs.extend(glyphs.into_iter().map(|(id, gx, gy)| (id, gx, gy + y_offset)));
    }

    if all_glyphs.is_empty() {
        return RasterizedText::empty();
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;

    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph = glyph_id.with_scale_and_position(scale, point(gx, gy));
        let bounds = font.glyph_bounds(&glyph);
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }

    if min_x >= max_x || min_y >= max_y {
        return RasterizedText::empty();
    }

    // Room for the bold pixel and the italic lean.
    let pad = 2.0 + if italic { (max_y - min_y) * 0.2 } else { 0.0 };
    min_x -= pad;
    min_y -= 2.0;
    max_x += pad;
    max_y += 2.0;

    let x0 = ((origin_x + min_x).floor() as i32).max(0);
    let y0 = ((origin_y + min_y).floor() as i32).max(0);
    let x1 = ((origin_x + max_x).ceil() as i32).min(canvas_w as i32);
    let y1 = ((origin_y + max_y).ceil() as i32).min(canvas_h as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;

    if buf_w == 0 || buf_h == 0 {
        return RasterizedText::empty();
    }

    let needed = buf_w as usize * buf_h as usize;
    coverage_buf.resize(needed, 0.0);
    coverage_buf[..needed].fill(0.0);

    // Glyphs are cached at position (0,0) and shifted on replay.
    let scale_key = scale.to_bits();
    for &(glyph_id, gx, gy) in &all_glyphs {
        let draw_x = gx.round();
        let draw_y = gy.round();
        let cache_key = (glyph_id, scale_key);

        let (pixels, base_bx, base_by) = glyph_cache.entry(cache_key).or_insert_with(|| {
            let base_glyph = glyph_id.with_scale_and_position(scale, point(0.0, 0.0));
            let mut px_list = Vec::new();
            match font.outline_glyph(base_glyph) {
                Some(outlined) => {
                    let b = outlined.px_bounds();
                    outlined.draw(|px, py, cov| px_list.push((px, py, cov)));
                    (px_list, b.min.x, b.min.y)
                }
                None => (px_list, 0.0, 0.0),
            }
        });

        let actual_bx = *base_bx + draw_x;
        let actual_by = *base_by + draw_y;
        let baseline_y = origin_y + draw_y;

        for &(px, py, cov) in pixels.iter() {
            let mut cx = px as f32 + origin_x + actual_bx;
            let cy = py as f32 + origin_y + actual_by;
            if italic {
                cx += (baseline_y - cy) * 0.2;
            }

            let ix = cx.round() as i32 - x0;
            let iy = cy.round() as i32 - y0;
            if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                let idx = iy as usize * buf_w as usize + ix as usize;
                coverage_buf[idx] = coverage_buf[idx].max(cov);
                if bold && ix + 1 < buf_w as i32 {
                    coverage_buf[idx + 1] = coverage_buf[idx + 1].max(cov);
                }
            }
        }
    }

    let mut buf = vec![0u8; needed * 4];
    for (i, &cov) in coverage_buf[..needed].iter().enumerate() {
        if cov > 0.001 {
            let idx = i * 4;
            buf[idx] = color[0];
            buf[idx + 1] = color[1];
            buf[idx + 2] = color[2];
            buf[idx + 3] = (color[3] as f32 * cov.min(1.0)).round() as u8;
        }
    }

    RasterizedText { buf, buf_w, buf_h, off_x: x0, off_y: y0 }
}

// ============================================================================
// SYSTEM FONTS
// ============================================================================

/// Families tried, in order, when the requested one is not installed.
pub const FALLBACK_FAMILIES: &[&str] = &[
    "Arial",
    "Liberation Sans",
    "DejaVu Sans",
    "Helvetica",
    "Noto Sans",
];

/// A face loaded from the system, with the style it actually has.
pub struct SystemFace {
    pub font: FontArc,
    pub weight: u16,
    pub italic: bool,
}

/// Load a font by family name, weight, and style from the system.
/// `weight` is a CSS-style weight value (400=Regular, 700=Bold, ...).
/// Returns None if nothing in the family can be loaded.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<SystemFace> {
    use font_kit::family_name::FamilyName;
    load_face(&[FamilyName::Title(family.to_string())], weight, italic)
}

fn load_face(
    names: &[font_kit::family_name::FamilyName],
    weight: u16,
    italic: bool,
) -> Option<SystemFace> {
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);
    if italic {
        props.style = Style::Italic;
    }

    let handle = SystemSource::new().select_best_match(names, &props).ok()?;
    let loaded = handle.load().ok()?;
    let found = loaded.properties();
    let bytes: Vec<u8> = (*loaded.copy_font_data()?).clone();
    let font = FontArc::try_from_vec(bytes).ok()?;
    Some(SystemFace {
        font,
        weight: found.weight.0 as u16,
        italic: matches!(found.style, Style::Italic | Style::Oblique),
    })
}

struct LoadedFace {
    font: FontArc,
    synthetic_bold: bool,
    synthetic_italic: bool,
    glyph_cache: GlyphPixelCache,
}

/// Production [`GlyphRasterizer`]: system fonts via font-kit, glyphs via
/// ab_glyph. Faces are resolved once per (family, bold, italic) and cached.
/// Bold and italic are synthesised when the family has no such face.
#[derive(Default)]
pub struct FontRasterizer {
    faces: HashMap<(String, bool, bool), Option<LoadedFace>>,
    coverage_buf: Vec<f32>,
}

impl FontRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(family: &str, bold: bool, italic: bool) -> Option<LoadedFace> {
        use font_kit::family_name::FamilyName;

        let weight = if bold { 700 } else { 400 };
        let face = std::iter::once(family)
            .chain(FALLBACK_FAMILIES.iter().copied().filter(|f| !f.eq_ignore_ascii_case(family)))
            .find_map(|name| load_system_font(name, weight, italic))
            .or_else(|| load_face(&[FamilyName::SansSerif], weight, italic));

        match face {
            Some(face) => {
                log_info!(
                    "text: resolved font '{}' (bold={}, italic={}) -> weight {}, italic {}",
                    family, bold, italic, face.weight, face.italic
                );
                Some(LoadedFace {
                    font: face.font,
                    synthetic_bold: bold && face.weight < 600,
                    synthetic_italic: italic && !face.italic,
                    glyph_cache: HashMap::new(),
                })
            }
            None => {
                log_warn!("text: no usable system font for '{}', overlays will not render", family);
                None
            }
        }
    }
}

impl GlyphRasterizer for FontRasterizer {
    fn rasterize(&mut self, overlay: &TextOverlay, canvas_w: u32, canvas_h: u32) -> RasterizedText {
        if overlay.text.trim().is_empty() || canvas_w == 0 || canvas_h == 0 {
            return RasterizedText::empty();
        }

        let key = (overlay.font_family.clone(), overlay.bold, overlay.italic);
        let face = self
            .faces
            .entry(key)
            .or_insert_with(|| Self::resolve(&overlay.font_family, overlay.bold, overlay.italic));

        let Some(face) = face.as_mut() else {
            return RasterizedText::empty();
        };

        rasterize_text(
            &face.font,
            &overlay.text,
            overlay.font_size,
            overlay.x,
            overlay.y,
            overlay.color,
            face.synthetic_bold,
            face.synthetic_italic,
            canvas_w,
            canvas_h,
            &mut self.coverage_buf,
            &mut face.glyph_cache,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Paints one solid `size/2 × size` block per visible character.
    struct BlockRasterizer;

    impl GlyphRasterizer for BlockRasterizer {
        fn rasterize(&mut self, o: &TextOverlay, _: u32, _: u32) -> RasterizedText {
            let glyphs = o.text.chars().filter(|c| !c.is_whitespace()).count() as u32;
            if glyphs == 0 {
                return RasterizedText::empty();
            }
            let cell = (o.font_size / 2.0).max(1.0) as u32;
            let (w, h) = (cell * glyphs, cell * 2);
            RasterizedText {
                buf: o.color.repeat((w * h) as usize),
                buf_w: w,
                buf_h: h,
                off_x: o.x as i32,
                off_y: o.y as i32,
            }
        }
    }

    #[test]
    fn add_uses_defaults_and_selects() {
        let mut overlays = TextOverlays::new("Arial");
        let id = overlays.add();
        let o = overlays.get(id).unwrap();
        assert_eq!(o.text, "Your Text Here");
        assert_eq!((o.x, o.y, o.font_size), (50.0, 50.0, 32.0));
        assert_eq!(o.color, [255, 255, 255, 255]);
        assert_eq!(o.font_family, "Arial");
        assert!(!o.bold && !o.italic);
        assert_eq!(overlays.active(), Some(id));
    }

    #[test]
    fn ids_are_unique() {
        let mut overlays = TextOverlays::new("Arial");
        let a = overlays.add();
        let b = overlays.add();
        assert_ne!(a, b);
        assert_eq!(overlays.len(), 2);
    }

    #[test]
    fn update_merges_only_given_fields() {
        let mut overlays = TextOverlays::new("Arial");
        let id = overlays.add();
        let patch = TextOverlayPatch {
            text: Some("Hi".into()),
            bold: Some(true),
            ..Default::default()
        };
        assert!(overlays.update(id, patch));
        let o = overlays.get(id).unwrap();
        assert_eq!(o.text, "Hi");
        assert!(o.bold);
        assert_eq!(o.x, 50.0);
        assert_eq!(o.font_size, 32.0);
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut overlays = TextOverlays::new("Arial");
        overlays.add();
        let stranger = Uuid::new_v4();
        assert!(!overlays.update(stranger, TextOverlayPatch::default()));
        assert!(!overlays.remove(stranger));
        assert_eq!(overlays.len(), 1);
    }

    #[test]
    fn removing_active_overlay_clears_selection() {
        let mut overlays = TextOverlays::new("Arial");
        let first = overlays.add();
        let second = overlays.add();
        assert!(overlays.remove(first));
        assert_eq!(overlays.active(), Some(second));
        assert!(overlays.remove(second));
        assert_eq!(overlays.active(), None);
        assert!(overlays.is_empty());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#ffffff").unwrap(), [255, 255, 255, 255]);
        assert_eq!(parse_hex_color("#f00").unwrap(), [255, 0, 0, 255]);
        assert_eq!(parse_hex_color("00ff0080").unwrap(), [0, 255, 0, 128]);
        assert!(matches!(parse_hex_color("#12"), Err(EditorError::InvalidColor(_))));
        assert!(parse_hex_color("#gggggg").is_err());
        assert!(parse_hex_color("#ééé").is_err());
    }

    #[test]
    fn overlays_draw_in_insertion_order() {
        let mut surface = PixelBuffer::new_filled(40, 40, Rgba([0, 0, 0, 255]));
        let mut overlays = TextOverlays::new("Arial");
        let red = overlays.add();
        let blue = overlays.add();
        let place = |color| TextOverlayPatch {
            text: Some("X".into()),
            x: Some(5.0),
            y: Some(5.0),
            font_size: Some(10.0),
            color: Some(color),
            ..Default::default()
        };
        overlays.update(red, place([255, 0, 0, 255]));
        overlays.update(blue, place([0, 0, 255, 255]));

        draw_overlays(&mut surface, overlays.as_slice(), &mut BlockRasterizer);
        assert_eq!(surface.get_pixel(6, 6), Rgba([0, 0, 255, 255]));
        assert_eq!(surface.get_pixel(30, 30), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn empty_text_is_skipped_without_font_lookup() {
        let mut raster = FontRasterizer::new();
        let mut o = TextOverlay::with_defaults("Arial");
        o.text = "   ".into();
        assert!(raster.rasterize(&o, 100, 100).is_empty());
        assert!(raster.faces.is_empty());
    }
}
