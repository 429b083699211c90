use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

/// Read a photo in any supported format and re-encode it as RGB JPEG,
/// the only format the daemon forwards to the recognition service.
pub fn load_as_jpeg(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    to_jpeg(&bytes).with_context(|| format!("decoding {}", path.display()))
}

pub fn to_jpeg(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut out = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)?;
    tracing::debug!(input = bytes.len(), output = out.len(), "photo normalized");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_with_alpha() -> Vec<u8> {
        let img = RgbaImage::from_pixel(8, 8, Rgba([200, 120, 40, 128]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_png_becomes_jpeg() {
        let jpeg = to_jpeg(&png_with_alpha()).unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
        let back = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((back.width(), back.height()), (8, 8));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(to_jpeg(b"not an image").is_err());
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_as_jpeg(Path::new("/nonexistent/face.png")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/face.png"));
    }
}
