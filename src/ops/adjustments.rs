// ============================================================================
// ADJUSTMENT PRIMITIVES - per-pixel transforms over an f32 working buffer
// ============================================================================
//
// The filter compositor keeps the image as interleaved RGBA f32 in 0..255
// between stages. Every helper here clamps each channel back into 0..255
// before returning, so stages compose the same way chained display filters do.
// Rows are processed in parallel via rayon.
// ============================================================================

use rayon::prelude::*;

use crate::canvas::{CHANNELS, PixelBuffer};

/// Row-major 3×3 matrix applied to (R, G, B).
pub type ColorMatrix = [[f32; 3]; 3];

// Rec.709 luma weights, as used by the saturate / hue-rotate / grayscale
// matrices.
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

pub fn to_working(buffer: &PixelBuffer) -> Vec<f32> {
    buffer.as_raw().par_iter().map(|&b| b as f32).collect()
}

pub fn from_working(width: u32, height: u32, working: &[f32]) -> PixelBuffer {
    let raw: Vec<u8> = working
        .par_iter()
        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    PixelBuffer::from_raw(width, height, raw).unwrap_or_else(|| PixelBuffer::new(width, height))
}

/// Apply `transform` to every pixel. `transform` receives and returns
/// (r, g, b, a) in 0..255.
pub fn apply_pixel_transform<F>(working: &mut [f32], width: usize, transform: F)
where
    F: Fn(f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    if width == 0 || working.is_empty() {
        return;
    }
    let stride = width * CHANNELS;
    working.par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(CHANNELS) {
            let (r, g, b, a) = transform(px[0], px[1], px[2], px[3]);
            px[0] = r.clamp(0.0, 255.0);
            px[1] = g.clamp(0.0, 255.0);
            px[2] = b.clamp(0.0, 255.0);
            px[3] = a.clamp(0.0, 255.0);
        }
    });
}

/// Multiply RGB by `m`; alpha is untouched.
pub fn apply_color_matrix(working: &mut [f32], width: usize, m: &ColorMatrix) {
    let m = *m;
    apply_pixel_transform(working, width, move |r, g, b, a| {
        (
            m[0][0] * r + m[0][1] * g + m[0][2] * b,
            m[1][0] * r + m[1][1] * g + m[1][2] * b,
            m[2][0] * r + m[2][1] * g + m[2][2] * b,
            a,
        )
    });
}

/// Linear RGB gain (1.0 = unchanged).
pub fn brightness(working: &mut [f32], width: usize, factor: f32) {
    apply_pixel_transform(working, width, move |r, g, b, a| {
        (r * factor, g * factor, b * factor, a)
    });
}

/// Slope around mid-grey (1.0 = unchanged, 0.0 = flat grey).
pub fn contrast(working: &mut [f32], width: usize, factor: f32) {
    let mid = 127.5;
    apply_pixel_transform(working, width, move |r, g, b, a| {
        (
            (r - mid) * factor + mid,
            (g - mid) * factor + mid,
            (b - mid) * factor + mid,
            a,
        )
    });
}

/// Blend toward the negative. `amount` in 0..1.
pub fn invert(working: &mut [f32], width: usize, amount: f32) {
    let amount = amount.clamp(0.0, 1.0);
    let slope = 1.0 - 2.0 * amount;
    let offset = 255.0 * amount;
    apply_pixel_transform(working, width, move |r, g, b, a| {
        (r * slope + offset, g * slope + offset, b * slope + offset, a)
    });
}

/// Scale alpha. `amount` in 0..1.
pub fn opacity(working: &mut [f32], width: usize, amount: f32) {
    let amount = amount.clamp(0.0, 1.0);
    apply_pixel_transform(working, width, move |r, g, b, a| (r, g, b, a * amount));
}

/// Saturation matrix. `s` = 1.0 is identity, 0.0 is fully desaturated,
/// values above 1.0 oversaturate.
pub fn saturate_matrix(s: f32) -> ColorMatrix {
    let s = s.max(0.0);
    [
        [LUMA_R + (1.0 - LUMA_R) * s, LUMA_G - LUMA_G * s, LUMA_B - LUMA_B * s],
        [LUMA_R - LUMA_R * s, LUMA_G + (1.0 - LUMA_G) * s, LUMA_B - LUMA_B * s],
        [LUMA_R - LUMA_R * s, LUMA_G - LUMA_G * s, LUMA_B + (1.0 - LUMA_B) * s],
    ]
}

/// Luminance-preserving hue rotation by `degrees`.
pub fn hue_rotate_matrix(degrees: f32) -> ColorMatrix {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

/// Sepia tone interpolated by `amount` in 0..1.
pub fn sepia_matrix(amount: f32) -> ColorMatrix {
    let k = 1.0 - amount.clamp(0.0, 1.0);
    [
        [0.393 + 0.607 * k, 0.769 - 0.769 * k, 0.189 - 0.189 * k],
        [0.349 - 0.349 * k, 0.686 + 0.314 * k, 0.168 - 0.168 * k],
        [0.272 - 0.272 * k, 0.534 - 0.534 * k, 0.131 + 0.869 * k],
    ]
}

/// Desaturation toward BT.709 luma, interpolated by `amount` in 0..1.
pub fn grayscale_matrix(amount: f32) -> ColorMatrix {
    let k = 1.0 - amount.clamp(0.0, 1.0);
    [
        [LUMA_R + (1.0 - LUMA_R) * k, LUMA_G - LUMA_G * k, LUMA_B - LUMA_B * k],
        [LUMA_R - LUMA_R * k, LUMA_G + (1.0 - LUMA_G) * k, LUMA_B - LUMA_B * k],
        [LUMA_R - LUMA_R * k, LUMA_G - LUMA_G * k, LUMA_B + (1.0 - LUMA_B) * k],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(m: &ColorMatrix, rgb: [f32; 3]) -> [f32; 3] {
        let mut px = vec![rgb[0], rgb[1], rgb[2], 255.0];
        apply_color_matrix(&mut px, 1, m);
        [px[0], px[1], px[2]]
    }

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 0.5)
    }

    #[test]
    fn identity_matrices() {
        let rgb = [200.0, 90.0, 30.0];
        assert!(close(apply(&saturate_matrix(1.0), rgb), rgb));
        assert!(close(apply(&hue_rotate_matrix(0.0), rgb), rgb));
        assert!(close(apply(&sepia_matrix(0.0), rgb), rgb));
        assert!(close(apply(&grayscale_matrix(0.0), rgb), rgb));
    }

    #[test]
    fn full_grayscale_equalises_channels() {
        let out = apply(&grayscale_matrix(1.0), [200.0, 90.0, 30.0]);
        assert!((out[0] - out[1]).abs() < 1e-3);
        assert!((out[1] - out[2]).abs() < 1e-3);
    }

    #[test]
    fn zero_saturation_matches_full_grayscale() {
        let rgb = [10.0, 240.0, 128.0];
        assert!(close(apply(&saturate_matrix(0.0), rgb), apply(&grayscale_matrix(1.0), rgb)));
    }

    #[test]
    fn results_are_clamped() {
        let mut px = vec![250.0, 5.0, 128.0, 255.0];
        brightness(&mut px, 1, 2.0);
        assert_eq!(px, vec![255.0, 10.0, 255.0, 255.0]);
    }

    #[test]
    fn contrast_zero_is_flat_grey() {
        let mut px = vec![0.0, 255.0, 40.0, 255.0];
        contrast(&mut px, 1, 0.0);
        assert_eq!(&px[..3], &[127.5, 127.5, 127.5]);
    }

    #[test]
    fn invert_and_opacity_touch_only_their_channels() {
        let mut px = vec![0.0, 100.0, 255.0, 200.0];
        invert(&mut px, 1, 1.0);
        assert_eq!(px, vec![255.0, 155.0, 0.0, 200.0]);
        opacity(&mut px, 1, 0.5);
        assert_eq!(px, vec![255.0, 155.0, 0.0, 100.0]);
    }

    #[test]
    fn working_round_trip_is_lossless() {
        let buf = PixelBuffer::from_raw(2, 1, vec![1, 2, 3, 4, 250, 251, 252, 253]).unwrap();
        let w = to_working(&buf);
        assert_eq!(from_working(2, 1, &w), buf);
    }
}
