// ============================================================================
// IMAGE FILTERS - non-destructive filter stack, compositor, presets
// ============================================================================

use rayon::prelude::*;

use crate::canvas::{CHANNELS, PixelBuffer};
use crate::error::{EditorError, Result};
use crate::ops::adjustments::{self, ColorMatrix};
use crate::ops::text::{GlyphRasterizer, TextOverlay, draw_overlays};

// ---------------------------------------------------------------------------
//  Filter state
// ---------------------------------------------------------------------------

pub const PERCENT_RANGE: (f32, f32) = (0.0, 200.0);
pub const HUE_RANGE: (f32, f32) = (-180.0, 180.0);
pub const BLUR_RANGE: (f32, f32) = (0.0, 10.0);

/// NaN takes the field's neutral value instead of a range end.
fn clamp_to(value: f32, range: (f32, f32), neutral: f32) -> f32 {
    if value.is_nan() {
        return neutral;
    }
    value.clamp(range.0, range.1)
}

/// The nine display filters. Percent fields are 0..200, `hue` is degrees
/// and `blur` is a radius in pixels. Values are clamped on the way in, so a
/// `FilterState` is always in range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterState {
    brightness: f32,
    contrast: f32,
    saturation: f32,
    hue: f32,
    blur: f32,
    sepia: f32,
    grayscale: f32,
    invert: f32,
    opacity: f32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            hue: 0.0,
            blur: 0.0,
            sepia: 0.0,
            grayscale: 0.0,
            invert: 0.0,
            opacity: 100.0,
        }
    }
}

impl FilterState {
    pub fn brightness(&self) -> f32 { self.brightness }
    pub fn contrast(&self) -> f32 { self.contrast }
    pub fn saturation(&self) -> f32 { self.saturation }
    pub fn hue(&self) -> f32 { self.hue }
    pub fn blur(&self) -> f32 { self.blur }
    pub fn sepia(&self) -> f32 { self.sepia }
    pub fn grayscale(&self) -> f32 { self.grayscale }
    pub fn invert(&self) -> f32 { self.invert }
    pub fn opacity(&self) -> f32 { self.opacity }

    pub fn with_brightness(self, v: f32) -> Self {
        Self { brightness: clamp_to(v, PERCENT_RANGE, 100.0), ..self }
    }

    pub fn with_contrast(self, v: f32) -> Self {
        Self { contrast: clamp_to(v, PERCENT_RANGE, 100.0), ..self }
    }

    pub fn with_saturation(self, v: f32) -> Self {
        Self { saturation: clamp_to(v, PERCENT_RANGE, 100.0), ..self }
    }

    pub fn with_hue(self, v: f32) -> Self {
        Self { hue: clamp_to(v, HUE_RANGE, 0.0), ..self }
    }

    pub fn with_blur(self, v: f32) -> Self {
        Self { blur: clamp_to(v, BLUR_RANGE, 0.0), ..self }
    }

    pub fn with_sepia(self, v: f32) -> Self {
        Self { sepia: clamp_to(v, PERCENT_RANGE, 0.0), ..self }
    }

    pub fn with_grayscale(self, v: f32) -> Self {
        Self { grayscale: clamp_to(v, PERCENT_RANGE, 0.0), ..self }
    }

    pub fn with_invert(self, v: f32) -> Self {
        Self { invert: clamp_to(v, PERCENT_RANGE, 0.0), ..self }
    }

    pub fn with_opacity(self, v: f32) -> Self {
        Self { opacity: clamp_to(v, PERCENT_RANGE, 100.0), ..self }
    }

    pub fn is_identity(&self) -> bool {
        self.pipeline().is_empty()
    }

    /// Ordered list of stages that actually change pixels.
    ///
    /// Order is fixed: brightness, contrast, saturation, hue, blur, sepia,
    /// grayscale, invert, opacity.
    pub fn pipeline(&self) -> Vec<FilterStage> {
        [
            FilterStage::Brightness(self.brightness / 100.0),
            FilterStage::Contrast(self.contrast / 100.0),
            FilterStage::Saturate(self.saturation / 100.0),
            FilterStage::HueRotate(self.hue),
            FilterStage::Blur(self.blur),
            FilterStage::Sepia((self.sepia / 100.0).min(1.0)),
            FilterStage::Grayscale((self.grayscale / 100.0).min(1.0)),
            FilterStage::Invert((self.invert / 100.0).min(1.0)),
            FilterStage::Opacity((self.opacity / 100.0).min(1.0)),
        ]
        .into_iter()
        .filter(|s| !s.is_identity())
        .collect()
    }

    /// Short human-readable summary of the non-default values, for logs.
    pub fn describe(&self) -> String {
        let stages = self.pipeline();
        if stages.is_empty() {
            return "identity".to_string();
        }
        stages.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(" ")
    }
}

// ---------------------------------------------------------------------------
//  Stages + interpreter
// ---------------------------------------------------------------------------

/// One step of the compositor. Amounts are normalised: 1.0 is the CSS
/// "100%" value, `HueRotate` is degrees and `Blur` is a pixel radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterStage {
    Brightness(f32),
    Contrast(f32),
    Saturate(f32),
    HueRotate(f32),
    Blur(f32),
    Sepia(f32),
    Grayscale(f32),
    Invert(f32),
    Opacity(f32),
}

impl FilterStage {
    pub fn is_identity(&self) -> bool {
        match *self {
            FilterStage::Brightness(v)
            | FilterStage::Contrast(v)
            | FilterStage::Saturate(v)
            | FilterStage::Opacity(v) => v == 1.0,
            FilterStage::HueRotate(deg) => deg.rem_euclid(360.0) == 0.0,
            FilterStage::Blur(r) => r <= 0.0,
            FilterStage::Sepia(a) | FilterStage::Grayscale(a) | FilterStage::Invert(a) => a <= 0.0,
        }
    }

    fn apply(&self, working: &mut Vec<f32>, width: usize, height: usize) {
        match *self {
            FilterStage::Brightness(f) => adjustments::brightness(working, width, f),
            FilterStage::Contrast(c) => adjustments::contrast(working, width, c),
            FilterStage::Saturate(s) => matrix(working, width, adjustments::saturate_matrix(s)),
            FilterStage::HueRotate(deg) => matrix(working, width, adjustments::hue_rotate_matrix(deg)),
            FilterStage::Blur(radius) => {
                *working = parallel_gaussian_blur(working, width, height, radius);
            }
            FilterStage::Sepia(a) => matrix(working, width, adjustments::sepia_matrix(a)),
            FilterStage::Grayscale(a) => matrix(working, width, adjustments::grayscale_matrix(a)),
            FilterStage::Invert(a) => adjustments::invert(working, width, a),
            FilterStage::Opacity(a) => adjustments::opacity(working, width, a),
        }
    }
}

fn matrix(working: &mut [f32], width: usize, m: ColorMatrix) {
    adjustments::apply_color_matrix(working, width, &m);
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            FilterStage::Brightness(v) => write!(f, "brightness({:.0}%)", v * 100.0),
            FilterStage::Contrast(v) => write!(f, "contrast({:.0}%)", v * 100.0),
            FilterStage::Saturate(v) => write!(f, "saturate({:.0}%)", v * 100.0),
            FilterStage::HueRotate(v) => write!(f, "hue-rotate({:.0}deg)", v),
            FilterStage::Blur(v) => write!(f, "blur({:.1}px)", v),
            FilterStage::Sepia(v) => write!(f, "sepia({:.0}%)", v * 100.0),
            FilterStage::Grayscale(v) => write!(f, "grayscale({:.0}%)", v * 100.0),
            FilterStage::Invert(v) => write!(f, "invert({:.0}%)", v * 100.0),
            FilterStage::Opacity(v) => write!(f, "opacity({:.0}%)", v * 100.0),
        }
    }
}

/// Run the filter stack over `buffer` and return the filtered copy.
/// An identity state returns a byte-exact clone.
pub fn apply_filters(buffer: &PixelBuffer, filters: &FilterState) -> PixelBuffer {
    let stages = filters.pipeline();
    if stages.is_empty() || buffer.is_empty() {
        return buffer.clone();
    }

    let (w, h) = buffer.dimensions();
    let mut working = adjustments::to_working(buffer);
    for stage in &stages {
        stage.apply(&mut working, w as usize, h as usize);
    }
    adjustments::from_working(w, h, &working)
}

/// Render what the user sees: filters over the committed buffer, then text
/// overlays on top, unfiltered. Never touches `buffer`.
///
/// Returns `None` when no image is loaded.
pub fn preview(
    buffer: Option<&PixelBuffer>,
    filters: &FilterState,
    overlays: &[TextOverlay],
    rasterizer: &mut dyn GlyphRasterizer,
) -> Option<PixelBuffer> {
    let buffer = buffer?;
    let mut surface = apply_filters(buffer, filters);
    draw_overlays(&mut surface, overlays, rasterizer);
    Some(surface)
}

// ---------------------------------------------------------------------------
//  Parallel separable Gaussian blur (rayon)
// ---------------------------------------------------------------------------

/// Build a 1-D Gaussian kernel truncated at ceil(3*sigma).
fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let mut kernel = vec![0.0f32; len];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        let v = (-x * x / s2).exp();
        *k = v;
        sum += v;
    }
    let inv = 1.0 / sum;
    for v in &mut kernel { *v *= inv; }
    kernel
}

/// Separable Gaussian over an interleaved RGBA f32 buffer. Edges clamp.
/// Colour is averaged premultiplied by alpha, so transparent neighbours do
/// not bleed their RGB into visible pixels.
fn parallel_gaussian_blur(buf_in: &[f32], w: usize, h: usize, sigma: f32) -> Vec<f32> {
    if w == 0 || h == 0 || sigma <= 0.0 {
        return buf_in.to_vec();
    }

    let kernel = build_gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    let stride = w * CHANNELS;
    let pixel_count = stride * h;

    let mut premul = buf_in.to_vec();
    premul.par_chunks_mut(CHANNELS).for_each(|px| {
        let a = px[3] / 255.0;
        for c in 0..3 {
            px[c] *= a;
        }
    });
    let buf_in = premul.as_slice();

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; pixel_count];
    buf_h.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in_start = y * stride;
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius as isize)
                    .clamp(0, w as isize - 1) as usize;
                let idx = row_in_start + sx * CHANNELS;
                for c in 0..CHANNELS {
                    acc[c] += buf_in[idx + c] * kv;
                }
            }
            row_out[x * CHANNELS..x * CHANNELS + CHANNELS].copy_from_slice(&acc);
        }
    });

    // --- Vertical pass (parallel by row) ---
    let mut buf_v = vec![0.0f32; pixel_count];
    buf_v.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius as isize)
                    .clamp(0, h as isize - 1) as usize;
                let idx = sy * stride + x * CHANNELS;
                for c in 0..CHANNELS {
                    acc[c] += buf_h[idx + c] * kv;
                }
            }
            let alpha = acc[3].clamp(0.0, 255.0);
            let px = &mut row_out[x * CHANNELS..x * CHANNELS + CHANNELS];
            for c in 0..3 {
                px[c] = if alpha > 0.0 {
                    (acc[c] * 255.0 / alpha).clamp(0.0, 255.0)
                } else {
                    0.0
                };
            }
            px[3] = alpha;
        }
    });

    buf_v
}

// ---------------------------------------------------------------------------
//  Presets
// ---------------------------------------------------------------------------

/// Named filter combinations offered by the editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterPreset {
    Original,
    Vintage,
    BlackAndWhite,
    HighContrast,
    Warm,
    Cool,
    Dramatic,
    Soft,
}

impl FilterPreset {
    pub fn all() -> &'static [FilterPreset] {
        &[
            FilterPreset::Original,
            FilterPreset::Vintage,
            FilterPreset::BlackAndWhite,
            FilterPreset::HighContrast,
            FilterPreset::Warm,
            FilterPreset::Cool,
            FilterPreset::Dramatic,
            FilterPreset::Soft,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterPreset::Original => "Original",
            FilterPreset::Vintage => "Vintage",
            FilterPreset::BlackAndWhite => "Black & White",
            FilterPreset::HighContrast => "High Contrast",
            FilterPreset::Warm => "Warm",
            FilterPreset::Cool => "Cool",
            FilterPreset::Dramatic => "Dramatic",
            FilterPreset::Soft => "Soft",
        }
    }

    /// Look a preset up by label. Case, spacing and punctuation are ignored,
    /// and `&` may be written as `and` ("black-and-white", "highcontrast").
    pub fn from_name(name: &str) -> Result<FilterPreset> {
        let wanted = normalise_name(name);
        Self::all()
            .iter()
            .copied()
            .find(|p| normalise_name(p.label()) == wanted)
            .ok_or_else(|| EditorError::UnknownPreset(name.to_string()))
    }

    pub fn filters(&self) -> FilterState {
        let base = FilterState::default();
        match self {
            FilterPreset::Original => base,
            FilterPreset::Vintage => base
                .with_brightness(95.0)
                .with_contrast(110.0)
                .with_saturation(80.0)
                .with_hue(15.0)
                .with_sepia(30.0),
            FilterPreset::BlackAndWhite => base
                .with_contrast(110.0)
                .with_saturation(0.0)
                .with_grayscale(100.0),
            FilterPreset::HighContrast => base
                .with_brightness(105.0)
                .with_contrast(150.0)
                .with_saturation(120.0),
            FilterPreset::Warm => base
                .with_brightness(105.0)
                .with_contrast(105.0)
                .with_saturation(110.0)
                .with_hue(10.0)
                .with_sepia(15.0),
            FilterPreset::Cool => base
                .with_contrast(105.0)
                .with_saturation(110.0)
                .with_hue(-10.0),
            FilterPreset::Dramatic => base
                .with_brightness(90.0)
                .with_contrast(140.0)
                .with_saturation(130.0),
            FilterPreset::Soft => base
                .with_brightness(110.0)
                .with_contrast(90.0)
                .with_saturation(90.0)
                .with_blur(1.0),
        }
    }
}

fn normalise_name(name: &str) -> String {
    name.to_lowercase()
        .replace('&', "and")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}
