// ============================================================================
// IMAGE I/O - MIME gate, decode to PixelBuffer, PNG export
// ============================================================================

use image::codecs::png::PngEncoder;
use image::io::{Limits, Reader};
use image::{ImageEncoder, ImageFormat};
use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use crate::canvas::PixelBuffer;
use crate::error::{EditorError, Result};

/// Filename offered for the exported image.
pub const DEFAULT_EXPORT_FILENAME: &str = "edited-image.png";

/// MIME types the editor accepts, paired with their decoder format.
pub const ACCEPTED_MIME_TYPES: &[(&str, ImageFormat)] = &[
    ("image/jpeg", ImageFormat::Jpeg),
    ("image/png", ImageFormat::Png),
    ("image/gif", ImageFormat::Gif),
    ("image/webp", ImageFormat::WebP),
    ("image/bmp", ImageFormat::Bmp),
];

/// Map a MIME type string (parameters and case ignored) to a decoder format.
pub fn format_for_mime(mime: &str) -> Option<ImageFormat> {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    let essence = match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg",
        other => other,
    };
    ACCEPTED_MIME_TYPES
        .iter()
        .find(|(m, _)| *m == essence)
        .map(|(_, f)| *f)
}

pub fn mime_for_format(format: ImageFormat) -> &'static str {
    ACCEPTED_MIME_TYPES
        .iter()
        .find(|(_, f)| *f == format)
        .map(|(m, _)| *m)
        .unwrap_or("application/octet-stream")
}

/// Guess a MIME type from a file extension (CLI input path).
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let format = ImageFormat::from_extension(ext)?;
    ACCEPTED_MIME_TYPES
        .iter()
        .find(|(_, f)| *f == format)
        .map(|(m, _)| *m)
}

/// Check the declared MIME type and the sniffed content before any decode
/// work happens. Returns the format to decode with.
pub fn validate_input(bytes: &[u8], declared_mime: Option<&str>) -> Result<ImageFormat> {
    if bytes.is_empty() {
        return Err(EditorError::EmptyInput);
    }

    if let Some(mime) = declared_mime
        && format_for_mime(mime).is_none()
    {
        return Err(EditorError::UnsupportedMime(mime.to_string()));
    }

    let sniffed = image::guess_format(bytes)
        .map_err(|_| EditorError::UnsupportedMime("unrecognised content".to_string()))?;
    if !ACCEPTED_MIME_TYPES.iter().any(|(_, f)| *f == sniffed) {
        return Err(EditorError::UnsupportedMime(format!("{:?}", sniffed)));
    }
    Ok(sniffed)
}

/// Validate and decode raw bytes into a fresh RGBA8 [`PixelBuffer`].
///
/// `max_dimension` bounds either edge; larger images are refused rather than
/// allocated.
pub fn decode_image(
    bytes: &[u8],
    declared_mime: Option<&str>,
    max_dimension: u32,
) -> Result<PixelBuffer> {
    let format = validate_input(bytes, declared_mime)?;

    // Header only: oversized images are refused before any pixel allocation.
    let (w, h) = Reader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| EditorError::Decode(e.to_string()))?;
    if w == 0 || h == 0 {
        return Err(EditorError::Decode("image has no pixels".to_string()));
    }
    if w > max_dimension || h > max_dimension {
        return Err(EditorError::TooLarge { width: w, height: h, max: max_dimension });
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    let mut reader = Reader::with_format(Cursor::new(bytes), format);
    reader.limits(limits);
    let img = reader.decode().map_err(|e| EditorError::Decode(e.to_string()))?;

    Ok(PixelBuffer::from_rgba_image(img.into_rgba8()))
}

/// Read a file from disk and decode it. The MIME type is inferred from the
/// extension when present.
pub fn load_image_file(path: &Path, max_dimension: u32) -> Result<PixelBuffer> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes, mime_from_extension(path), max_dimension)
}

/// Encode a buffer as PNG bytes.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(buffer.memory_bytes() / 2);
    PngEncoder::new(&mut out)
        .write_image(
            buffer.as_raw(),
            buffer.width(),
            buffer.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| EditorError::Encode(e.to_string()))?;
    Ok(out)
}

/// Write already-encoded bytes to `path`.
pub fn write_bytes(bytes: &[u8], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let buf = PixelBuffer::new_filled(w, h, Rgba([12, 34, 56, 255]));
        encode_png(&buf).unwrap()
    }

    #[test]
    fn mime_lookup_normalises() {
        assert_eq!(format_for_mime("IMAGE/PNG"), Some(ImageFormat::Png));
        assert_eq!(format_for_mime("image/jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(format_for_mime("image/webp; q=1"), Some(ImageFormat::WebP));
        assert_eq!(format_for_mime("text/plain"), None);
        assert_eq!(mime_for_format(ImageFormat::Gif), "image/gif");
    }

    #[test]
    fn declared_non_image_is_rejected_before_decode() {
        let bytes = png_bytes(2, 2);
        let err = decode_image(&bytes, Some("application/pdf"), 100).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedMime(m) if m == "application/pdf"));
    }

    #[test]
    fn garbage_content_is_rejected() {
        let err = decode_image(b"definitely not pixels", None, 100).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedMime(_)));
        assert!(matches!(decode_image(&[], None, 100), Err(EditorError::EmptyInput)));
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let bytes = png_bytes(16, 16);
        let err = decode_image(&bytes[..40], Some("image/png"), 100).unwrap_err();
        assert!(matches!(err, EditorError::Decode(_) | EditorError::Io(_)));
    }

    #[test]
    fn png_round_trip_keeps_pixels() {
        let bytes = png_bytes(3, 5);
        let buf = decode_image(&bytes, Some("image/png"), 100).unwrap();
        assert_eq!(buf.dimensions(), (3, 5));
        assert_eq!(buf.get_pixel(2, 4), Rgba([12, 34, 56, 255]));
    }

    #[test]
    fn oversized_images_are_refused() {
        let bytes = png_bytes(20, 4);
        let err = decode_image(&bytes, None, 10).unwrap_err();
        assert!(matches!(err, EditorError::TooLarge { width: 20, height: 4, max: 10 }));
    }

    #[test]
    fn size_is_checked_from_the_header_alone() {
        // Trailer cut off; the header alone decides.
        let bytes = png_bytes(20, 4);
        let err = decode_image(&bytes[..bytes.len() - 12], Some("image/png"), 10).unwrap_err();
        assert!(matches!(err, EditorError::TooLarge { width: 20, height: 4, max: 10 }));
    }

    #[test]
    fn extension_mime_guess() {
        assert_eq!(mime_from_extension(Path::new("a/b/photo.JPG")), Some("image/jpeg"));
        assert_eq!(mime_from_extension(Path::new("clip.webp")), Some("image/webp"));
        assert_eq!(mime_from_extension(Path::new("notes.txt")), None);
        assert_eq!(mime_from_extension(Path::new("noext")), None);
    }
}
