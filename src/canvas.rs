use image::{Rgba, RgbaImage};
use rayon::prelude::*;

// ============================================================================
// PIXEL BUFFER
// ============================================================================

/// Bytes per RGBA8 pixel.
pub const CHANNELS: usize = 4;

/// Flat row-major RGBA8 raster backing the image being edited.
///
/// Index arithmetic: `idx = (y * width + x) * 4 + channel`.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * CHANNELS],
        }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut buf = Self::new(width, height);
        buf.fill(color);
        buf
    }

    /// Wrap raw RGBA bytes. Returns `None` when the length does not match.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * CHANNELS {
            return None;
        }
        Some(Self { width, height, data })
    }

    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        // Length is guaranteed by every constructor.
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    pub fn dimensions(&self) -> (u32, u32) { (self.width, self.height) }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_raw(&self) -> &[u8] { &self.data }

    pub fn as_raw_mut(&mut self) -> &mut [u8] { &mut self.data }

    pub fn into_raw(self) -> Vec<u8> { self.data }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        let i = self.index(x, y);
        Rgba([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        let i = self.index(x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&pixel.0);
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        self.data.par_chunks_mut(CHANNELS).for_each(|px| px.copy_from_slice(&color.0));
    }

    /// Copy out a sub-rectangle. The rectangle must already be in bounds.
    pub fn extract_region(&self, x: u32, y: u32, w: u32, h: u32) -> PixelBuffer {
        let mut out = PixelBuffer::new(w, h);
        let src_stride = self.stride();
        let dst_stride = out.stride();
        let x_off = x as usize * CHANNELS;
        out.data.par_chunks_mut(dst_stride).enumerate().for_each(|(row, dst)| {
            let src_start = (y as usize + row) * src_stride + x_off;
            dst.copy_from_slice(&self.data[src_start..src_start + dst_stride]);
        });
        out
    }

    /// Alpha-composite an RGBA patch of size `src_w`×`src_h` with its top-left
    /// corner at (`dst_x`, `dst_y`). Out-of-bounds parts are clipped.
    pub fn blend_rgba_at(&mut self, dst_x: i32, dst_y: i32, src_w: u32, src_h: u32, src: &[u8]) {
        let bw = self.width as i32;
        let bh = self.height as i32;
        let x0 = dst_x.max(0);
        let y0 = dst_y.max(0);
        let x1 = (dst_x + src_w as i32).min(bw);
        let y1 = (dst_y + src_h as i32).min(bh);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let src_stride = src_w as usize * CHANNELS;
        for y in y0..y1 {
            let sy = (y - dst_y) as usize;
            for x in x0..x1 {
                let sx = (x - dst_x) as usize;
                let si = sy * src_stride + sx * CHANNELS;
                let top = Rgba([src[si], src[si + 1], src[si + 2], src[si + 3]]);
                if top[3] == 0 {
                    continue;
                }
                let base = self.get_pixel(x as u32, y as u32);
                self.put_pixel(x as u32, y as u32, blend_over(base, top));
            }
        }
    }

    pub fn memory_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Porter-Duff "source over" for straight (non-premultiplied) RGBA8.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 {
        return top;
    }

    let ta = top[3] as f32 / 255.0;
    let ba = base[3] as f32 / 255.0;
    let out_a = ta + ba * (1.0 - ta);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mix = |t: u8, b: u8| -> u8 {
        let c = (t as f32 * ta + b as f32 * ba * (1.0 - ta)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        mix(top[0], base[0]),
        mix(top[1], base[1]),
        mix(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

// ============================================================================
// CROP REGION
// ============================================================================

/// Crop rectangle in buffer-pixel coordinates.
///
/// Fields are signed because they come straight from numeric UI inputs;
/// [`CropRegion::clamped`] brings them inside a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CropRegion {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub active: bool,
}

impl CropRegion {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self { x, y, width, height, active: true }
    }

    /// Inactive region covering a whole `w`×`h` buffer.
    pub fn full(w: u32, h: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: w as i64,
            height: h as i64,
            active: false,
        }
    }

    /// Clamp into a `buf_w`×`buf_h` buffer, returning `(x, y, w, h)`.
    ///
    /// The result always satisfies `x + w <= buf_w`, `y + h <= buf_h` and is
    /// at least 1×1. Returns `None` only for an empty buffer.
    pub fn clamped(&self, buf_w: u32, buf_h: u32) -> Option<(u32, u32, u32, u32)> {
        if buf_w == 0 || buf_h == 0 {
            return None;
        }
        let bw = buf_w as i64;
        let bh = buf_h as i64;
        let x = self.x.clamp(0, bw - 1);
        let y = self.y.clamp(0, bh - 1);
        let w = self.width.clamp(1, bw - x);
        let h = self.height.clamp(1, bh - y);
        Some((x as u32, y as u32, w as u32, h as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.put_pixel(x, y, Rgba([x as u8, y as u8, (x + y) as u8, 255]));
            }
        }
        buf
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 16]).is_some());
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn row_major_indexing() {
        let buf = gradient(4, 3);
        assert_eq!(buf.index(1, 2), (2 * 4 + 1) * 4);
        assert_eq!(buf.get_pixel(3, 1), Rgba([3, 1, 4, 255]));
    }

    #[test]
    fn extract_region_copies_rows() {
        let buf = gradient(8, 8);
        let sub = buf.extract_region(2, 3, 4, 2);
        assert_eq!(sub.dimensions(), (4, 2));
        assert_eq!(sub.get_pixel(0, 0), buf.get_pixel(2, 3));
        assert_eq!(sub.get_pixel(3, 1), buf.get_pixel(5, 4));
    }

    #[test]
    fn rgba_image_conversion_keeps_bytes() {
        let buf = gradient(5, 4);
        let back = PixelBuffer::from_rgba_image(buf.to_rgba_image());
        assert_eq!(back, buf);
    }

    #[test]
    fn blend_over_extremes() {
        let base = Rgba([10, 20, 30, 255]);
        assert_eq!(blend_over(base, Rgba([1, 2, 3, 0])), base);
        assert_eq!(blend_over(base, Rgba([200, 100, 50, 255])), Rgba([200, 100, 50, 255]));
        let half = blend_over(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 128]));
        assert_eq!(half[3], 255);
        assert!((half[0] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn blend_rgba_at_clips_to_bounds() {
        let mut buf = PixelBuffer::new_filled(4, 4, Rgba([0, 0, 0, 255]));
        let patch = vec![255u8; 3 * 3 * 4];
        buf.blend_rgba_at(2, -1, 3, 3, &patch);
        assert_eq!(buf.get_pixel(2, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(buf.get_pixel(3, 1), Rgba([255, 255, 255, 255]));
        assert_eq!(buf.get_pixel(1, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(buf.get_pixel(2, 2), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn crop_region_clamps_out_of_range() {
        let r = CropRegion::new(-5, 90, 500, 50);
        assert_eq!(r.clamped(100, 100), Some((0, 90, 100, 10)));

        let r = CropRegion::new(150, 150, 0, -3);
        assert_eq!(r.clamped(100, 100), Some((99, 99, 1, 1)));

        assert_eq!(CropRegion::full(7, 9).clamped(7, 9), Some((0, 0, 7, 9)));
        assert_eq!(CropRegion::full(0, 0).clamped(0, 0), None);
    }
}
