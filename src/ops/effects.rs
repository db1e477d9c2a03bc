// ============================================================================
// CONVOLUTION EFFECTS - 3×3 kernels, emboss
// ============================================================================
//
// Kernels read only from the source buffer and write a fresh one, so a pixel
// never sees its neighbours' new values. The 1-pixel border and the alpha
// channel are copied through unchanged.
// ============================================================================

use rayon::prelude::*;

use crate::canvas::{CHANNELS, PixelBuffer};

/// Row-major 3×3 weights, `kernel[dy + 1][dx + 1]`.
pub type Kernel3x3 = [[f32; 3]; 3];

pub const EMBOSS_KERNEL: Kernel3x3 = [
    [-2.0, -1.0, 0.0],
    [-1.0, 1.0, 1.0],
    [0.0, 1.0, 2.0],
];

/// Added to every weighted sum so flat areas land on mid-grey.
pub const KERNEL_BIAS: f32 = 128.0;

/// Run `processor` over interior pixels only; edges and anything in a
/// buffer with no interior come back as-is.
fn apply_interior_effect<F>(src: &PixelBuffer, processor: F) -> PixelBuffer
where
    F: Fn(&[u8], usize, usize, usize) -> [u8; 3] + Sync,
{
    let (w, h) = (src.width() as usize, src.height() as usize);
    if w < 3 || h < 3 {
        return src.clone();
    }

    let src_raw = src.as_raw();
    let stride = src.stride();
    let mut out = src.clone();

    out.as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .filter(|(y, _)| *y > 0 && *y < h - 1)
        .for_each(|(y, row_out)| {
            for x in 1..w - 1 {
                let rgb = processor(src_raw, stride, x, y);
                let pi = x * CHANNELS;
                row_out[pi..pi + 3].copy_from_slice(&rgb);
            }
        });

    out
}

/// Convolve RGB with `kernel` plus [`KERNEL_BIAS`], clamped to 0..255.
pub fn apply_kernel(src: &PixelBuffer, kernel: &Kernel3x3) -> PixelBuffer {
    let kernel = *kernel;
    apply_interior_effect(src, move |raw, stride, x, y| {
        let mut acc = [KERNEL_BIAS; 3];
        for (ky, row) in kernel.iter().enumerate() {
            let sy = y + ky - 1;
            for (kx, &weight) in row.iter().enumerate() {
                if weight == 0.0 {
                    continue;
                }
                let idx = sy * stride + (x + kx - 1) * CHANNELS;
                for c in 0..3 {
                    acc[c] += raw[idx + c] as f32 * weight;
                }
            }
        }
        acc.map(|v| v.round().clamp(0.0, 255.0) as u8)
    })
}

pub fn emboss(src: &PixelBuffer) -> PixelBuffer {
    apply_kernel(src, &EMBOSS_KERNEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn noisy(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let v = ((x * 37 + y * 91) % 256) as u8;
                buf.put_pixel(x, y, Rgba([v, 255 - v, v / 2, (x * 20) as u8]));
            }
        }
        buf
    }

    #[test]
    fn emboss_preserves_border_and_alpha() {
        let src = noisy(8, 6);
        let out = emboss(&src);
        assert_eq!(out.dimensions(), src.dimensions());
        for y in 0..6 {
            for x in 0..8 {
                let (a, b) = (src.get_pixel(x, y), out.get_pixel(x, y));
                assert_eq!(a[3], b[3]);
                if x == 0 || y == 0 || x == 7 || y == 5 {
                    assert_eq!(a, b);
                }
            }
        }
    }

    #[test]
    fn emboss_of_flat_image_is_flat_plus_bias() {
        // Emboss weights sum to 1, so a flat area becomes v + 128.
        let src = PixelBuffer::new_filled(5, 5, Rgba([40, 100, 200, 255]));
        let out = emboss(&src);
        assert_eq!(out.get_pixel(2, 2), Rgba([168, 228, 255, 255]));
        assert_eq!(out.get_pixel(0, 0), Rgba([40, 100, 200, 255]));
    }

    #[test]
    fn kernel_reads_only_from_source() {
        // An impulse at the centre with the emboss kernel: each neighbour
        // sees the original impulse, not an already-filtered value.
        let mut src = PixelBuffer::new_filled(5, 5, Rgba([0, 0, 0, 255]));
        src.put_pixel(2, 2, Rgba([10, 10, 10, 255]));
        let out = emboss(&src);
        // (1,1) sees the impulse at its bottom-right weight 2.
        assert_eq!(out.get_pixel(1, 1)[0], 128 + 20);
        // (3,3) sees it at its top-left weight -2.
        assert_eq!(out.get_pixel(3, 3)[0], 128 - 20);
        assert_eq!(out.get_pixel(2, 2)[0], 128 + 10);
    }

    #[test]
    fn tiny_buffers_are_unchanged() {
        let src = noisy(2, 9);
        assert_eq!(emboss(&src), src);
        let src = noisy(9, 2);
        assert_eq!(emboss(&src), src);
    }

    #[test]
    fn identity_kernel_shifts_by_bias_only() {
        let k: Kernel3x3 = [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        let src = PixelBuffer::new_filled(3, 3, Rgba([10, 20, 30, 99]));
        assert_eq!(apply_kernel(&src, &k).get_pixel(1, 1), Rgba([138, 148, 158, 99]));
    }
}
