//! Image loading, JPEG re-encoding, and source file discovery.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::types::FeatureResult;

/// JPEG quality used when re-encoding in-memory images for upload.
const UPLOAD_QUALITY: u8 = 75;

/// Load an image from a file path as 8-bit RGB.
pub fn load_rgb(path: &Path) -> FeatureResult<DynamicImage> {
    let img = image::open(path)?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Encode an image as JPEG. Alpha is dropped.
pub fn encode_jpeg(img: &DynamicImage) -> FeatureResult<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, UPLOAD_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

/// Check if a file path points to a supported image format.
pub fn is_supported_format(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" | "tiff" | "tif"
    )
}

/// Image files directly inside `dir`, sorted by path.
pub fn list_images(dir: &Path) -> FeatureResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_format(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
