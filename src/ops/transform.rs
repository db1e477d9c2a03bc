// ============================================================================
// GEOMETRIC TRANSFORMS - crop, resize, flip
// ============================================================================

use image::imageops;
use rayon::prelude::*;

use crate::canvas::{CHANNELS, CropRegion, PixelBuffer};
use crate::error::EditorError;

/// Interpolation method for resize operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl Interpolation {
    pub fn label(&self) -> &'static str {
        match self {
            Interpolation::Nearest  => "nearest",
            Interpolation::Bilinear => "bilinear",
            Interpolation::Bicubic  => "bicubic",
            Interpolation::Lanczos3 => "lanczos3",
        }
    }

    pub fn all() -> &'static [Interpolation] {
        &[
            Interpolation::Nearest,
            Interpolation::Bilinear,
            Interpolation::Bicubic,
            Interpolation::Lanczos3,
        ]
    }

    pub fn to_filter(&self) -> imageops::FilterType {
        match self {
            Interpolation::Nearest  => imageops::FilterType::Nearest,
            Interpolation::Bilinear => imageops::FilterType::Triangle,
            Interpolation::Bicubic  => imageops::FilterType::CatmullRom,
            Interpolation::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

impl std::str::FromStr for Interpolation {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Interpolation::all()
            .iter()
            .copied()
            .find(|i| i.label() == s)
            .or(match s.as_str() {
                "linear" | "triangle" => Some(Interpolation::Bilinear),
                "cubic" | "catmullrom" => Some(Interpolation::Bicubic),
                "lanczos" => Some(Interpolation::Lanczos3),
                _ => None,
            })
            .ok_or(EditorError::UnknownInterpolation(s))
    }
}

// ---------------------------------------------------------------------------
//  Crop
// ---------------------------------------------------------------------------

/// Copy the region out of `buffer`. The region is clamped into the buffer
/// first, so any input yields at least a 1×1 result. Returns `None` only
/// for an empty buffer.
pub fn crop(buffer: &PixelBuffer, region: &CropRegion) -> Option<PixelBuffer> {
    let (x, y, w, h) = region.clamped(buffer.width(), buffer.height())?;
    Some(buffer.extract_region(x, y, w, h))
}

// ---------------------------------------------------------------------------
//  Resize
// ---------------------------------------------------------------------------

/// Target dimensions for a resize, with an optional aspect lock.
///
/// The lock ratio comes from `original_width`/`original_height`, the size of
/// the buffer it was seeded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeSpec {
    pub width: u32,
    pub height: u32,
    pub lock_aspect: bool,
    pub original_width: u32,
    pub original_height: u32,
}

impl ResizeSpec {
    /// Target matching the buffer's current size, aspect locked.
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            lock_aspect: true,
            original_width: width,
            original_height: height,
        }
    }

    pub fn set_width(&mut self, width: u32) {
        self.width = width.max(1);
        if self.lock_aspect && self.original_width > 0 {
            self.height = locked_dimension(self.width, self.original_height, self.original_width);
        }
    }

    pub fn set_height(&mut self, height: u32) {
        self.height = height.max(1);
        if self.lock_aspect && self.original_height > 0 {
            self.width = locked_dimension(self.height, self.original_width, self.original_height);
        }
    }

    pub fn set_lock_aspect(&mut self, lock: bool) {
        self.lock_aspect = lock;
    }

    /// Target size clamped to [1, max_dimension] on both edges.
    pub fn target(&self, max_dimension: u32) -> (u32, u32) {
        let max = max_dimension.max(1);
        (self.width.clamp(1, max), self.height.clamp(1, max))
    }
}

/// `round(changed * original_other / original_changed)`, at least 1.
fn locked_dimension(changed: u32, original_other: u32, original_changed: u32) -> u32 {
    let v = (changed as f64 * original_other as f64 / original_changed as f64).round();
    (v as u32).max(1)
}

/// Resample to `new_w`×`new_h`. Zero dimensions are bumped to 1.
pub fn resize(buffer: &PixelBuffer, new_w: u32, new_h: u32, interp: Interpolation) -> PixelBuffer {
    let (new_w, new_h) = (new_w.max(1), new_h.max(1));
    if buffer.dimensions() == (new_w, new_h) {
        return buffer.clone();
    }
    let flat = buffer.to_rgba_image();
    let resized = imageops::resize(&flat, new_w, new_h, interp.to_filter());
    PixelBuffer::from_rgba_image(resized)
}

// ---------------------------------------------------------------------------
//  Flip
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

impl FlipAxis {
    pub fn label(&self) -> &'static str {
        match self {
            FlipAxis::Horizontal => "horizontal",
            FlipAxis::Vertical => "vertical",
        }
    }
}

impl std::str::FromStr for FlipAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "horizontal" | "x" => Ok(FlipAxis::Horizontal),
            "v" | "vertical" | "y" => Ok(FlipAxis::Vertical),
            other => Err(format!("unknown flip axis '{}' (expected h or v)", other)),
        }
    }
}

/// Mirror into a new buffer of the same size.
pub fn flip(buffer: &PixelBuffer, axis: FlipAxis) -> PixelBuffer {
    let mut out = buffer.clone();
    flip_in_place(&mut out, axis);
    out
}

pub fn flip_in_place(buffer: &mut PixelBuffer, axis: FlipAxis) {
    if buffer.is_empty() {
        return;
    }
    let stride = buffer.stride();
    let height = buffer.height() as usize;
    let data = buffer.as_raw_mut();
    match axis {
        FlipAxis::Horizontal => {
            data.par_chunks_mut(stride).for_each(|row| {
                let w = row.len() / CHANNELS;
                for x in 0..w / 2 {
                    let (l, r) = (x * CHANNELS, (w - 1 - x) * CHANNELS);
                    for c in 0..CHANNELS {
                        row.swap(l + c, r + c);
                    }
                }
            });
        }
        FlipAxis::Vertical => {
            for y in 0..height / 2 {
                let (top, bottom) = data.split_at_mut((height - 1 - y) * stride);
                top[y * stride..(y + 1) * stride].swap_with_slice(&mut bottom[..stride]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.put_pixel(x, y, Rgba([x as u8 * 10, y as u8 * 10, 7, 255]));
            }
        }
        buf
    }

    #[test]
    fn full_region_crop_is_identity() {
        let buf = gradient(12, 9);
        let out = crop(&buf, &CropRegion::new(0, 0, 12, 9)).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn crop_clamps_out_of_range_regions() {
        let buf = gradient(10, 10);
        let out = crop(&buf, &CropRegion::new(8, -4, 50, 6)).unwrap();
        assert_eq!(out.dimensions(), (2, 6));
        assert_eq!(out.get_pixel(0, 0), buf.get_pixel(8, 0));
        assert!(crop(&PixelBuffer::new(0, 0), &CropRegion::new(0, 0, 1, 1)).is_none());
    }

    #[test]
    fn double_flip_is_identity() {
        let buf = gradient(7, 5);
        assert_eq!(flip(&flip(&buf, FlipAxis::Horizontal), FlipAxis::Horizontal), buf);
        assert_eq!(flip(&flip(&buf, FlipAxis::Vertical), FlipAxis::Vertical), buf);
    }

    #[test]
    fn flips_mirror_the_right_axis() {
        let buf = gradient(4, 3);
        let h = flip(&buf, FlipAxis::Horizontal);
        assert_eq!(h.dimensions(), (4, 3));
        assert_eq!(h.get_pixel(0, 1), buf.get_pixel(3, 1));
        let v = flip(&buf, FlipAxis::Vertical);
        assert_eq!(v.get_pixel(2, 0), buf.get_pixel(2, 2));
        assert_eq!(v.get_pixel(2, 1), buf.get_pixel(2, 1));
    }

    #[test]
    fn aspect_lock_recomputes_other_edge() {
        let mut spec = ResizeSpec::for_dimensions(400, 300);
        spec.set_width(200);
        assert_eq!((spec.width, spec.height), (200, 150));
        spec.set_height(100);
        assert_eq!((spec.width, spec.height), (133, 100));

        spec.set_lock_aspect(false);
        spec.set_width(50);
        assert_eq!((spec.width, spec.height), (50, 100));
    }

    #[test]
    fn resize_targets_are_clamped() {
        let mut spec = ResizeSpec::for_dimensions(10, 10);
        spec.set_width(0);
        assert_eq!((spec.width, spec.height), (1, 1));
        spec.set_lock_aspect(false);
        spec.set_width(99_999);
        assert_eq!(spec.target(4096), (4096, 1));
    }

    #[test]
    fn resize_changes_dimensions() {
        let buf = gradient(8, 6);
        for interp in Interpolation::all() {
            let out = resize(&buf, 4, 3, *interp);
            assert_eq!(out.dimensions(), (4, 3));
        }
        assert_eq!(resize(&buf, 8, 6, Interpolation::Bilinear), buf);
    }

    #[test]
    fn interpolation_parses_labels_and_aliases() {
        assert_eq!("Bicubic".parse::<Interpolation>().unwrap(), Interpolation::Bicubic);
        assert_eq!("lanczos".parse::<Interpolation>().unwrap(), Interpolation::Lanczos3);
        assert!("sinc".parse::<Interpolation>().is_err());
        assert_eq!("h".parse::<FlipAxis>().unwrap(), FlipAxis::Horizontal);
        assert!("diagonal".parse::<FlipAxis>().is_err());
    }
}
