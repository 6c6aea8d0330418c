use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::media::scan;
use crate::{Error, Result};

/// Default edge length of generated thumbnails (square bound)
pub const THUMBNAIL_SIZE: u32 = 256;

/// Get the default thumbnail cache directory
/// Returns ~/.cache/photo-ingest/thumbnails on Linux
pub fn default_thumbnail_dir() -> PathBuf {
    let mut path = dirs_next::cache_dir()
        .or_else(dirs_next::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    path.push("photo-ingest");
    path.push("thumbnails");
    path
}

/// Where the thumbnail for `image_path` lives (doesn't generate it).
/// Mirrors the photo's folder below `root` and keeps its extension, so
/// `100CANON/IMG_0001.CR2` becomes `100CANON/IMG_0001.CR2.jpg`.
pub fn thumbnail_path(cache_dir: &Path, root: &Path, image_path: &Path) -> PathBuf {
    let relative = image_path
        .strip_prefix(root)
        .ok()
        .filter(|r| r.is_relative() && !r.as_os_str().is_empty())
        .or_else(|| image_path.file_name().map(Path::new))
        .unwrap_or_else(|| Path::new("unnamed"));

    let mut name = relative.as_os_str().to_os_string();
    name.push(".jpg");
    cache_dir.join(name)
}

/// Generate a thumbnail for an image file and write it to `out`.
/// Rendered formats are decoded directly; RAW files go through the
/// embedded-JPEG tiers, cheapest first.
pub fn generate_thumbnail(image_path: &Path, out: &Path, size: u32) -> Result<()> {
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }

    if !scan::is_raw(image_path) {
        let img = image::open(image_path)?;
        return save_thumbnail(&img, out, size);
    }

    // Tier 1: Fast embedded JPEG search (256KB)
    // Tier 2: Extended embedded JPEG search (512KB)
    // Tier 3: Full embedded JPEG search (5MB)
    let tiers = [(256 * 1024, 50_000), (512 * 1024, 30_000), (5 * 1024 * 1024, 10_000)];
    for (tier, (max_bytes, min_size)) in tiers.into_iter().enumerate() {
        if let Some(jpeg) = extract_jpeg_from_raw(image_path, max_bytes, min_size)? {
            if let Ok(img) = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg) {
                save_thumbnail(&img, out, size)?;
                debug!("📸 Generated thumbnail (tier {}): {}", tier + 1, out.display());
                return Ok(());
            }
        }
    }

    // Tier 4: every embedded JPEG in the file, largest first
    if let Some(img) = decode_largest_embedded_jpeg(image_path)? {
        save_thumbnail(&img, out, size)?;
        debug!("🔥 Generated thumbnail from full scan: {}", out.display());
        return Ok(());
    }

    warn!("❌ No embedded preview in {}", image_path.display());
    Err(Error::NotFound(format!(
        "embedded preview in {}",
        image_path.display()
    )))
}

/// Resize and write as JPEG (alpha dropped)
fn save_thumbnail(img: &DynamicImage, out: &Path, size: u32) -> Result<()> {
    let thumbnail = img.resize(size, size, FilterType::Lanczos3);
    DynamicImage::ImageRgb8(thumbnail.to_rgb8()).save_with_format(out, ImageFormat::Jpeg)?;
    Ok(())
}

/// Look for an embedded JPEG in the first `max_bytes` of the file
fn extract_jpeg_from_raw(raw_path: &Path, max_bytes: usize, min_size: usize) -> Result<Option<Vec<u8>>> {
    let file = fs::File::open(raw_path)?;
    let mut data = Vec::with_capacity(max_bytes);
    file.take(max_bytes as u64).read_to_end(&mut data)?;

    Ok(extract_jpeg_from_data(&data, min_size))
}

/// Extract the first JPEG larger than `min_size` from already-loaded data
fn extract_jpeg_from_data(data: &[u8], min_size: usize) -> Option<Vec<u8>> {
    let jpeg_start = [0xFF, 0xD8];
    let jpeg_end = [0xFF, 0xD9];

    // Find JPEG start positions - stop after finding a few
    let mut jpeg_starts = Vec::new();
    for (i, window) in data.windows(2).enumerate() {
        if window == jpeg_start {
            jpeg_starts.push(i);
            if jpeg_starts.len() > 5 {
                break;
            }
        }
    }

    for &start in &jpeg_starts {
        if let Some(end_offset) = data[start..]
            .windows(2)
            .position(|window| window == jpeg_end)
        {
            let end = start + end_offset + 1;
            let size = end - start + 1;

            if size > min_size {
                return Some(data[start..=end].to_vec());
            }
        }
    }

    None
}

/// Decode the largest embedded JPEG that actually decodes, no size floor
fn decode_largest_embedded_jpeg(raw_path: &Path) -> Result<Option<DynamicImage>> {
    let data = fs::read(raw_path)?;

    let jpeg_start = [0xFF, 0xD8];
    let jpeg_end = [0xFF, 0xD9];

    let mut candidates: Vec<&[u8]> = Vec::new();
    for (i, window) in data.windows(2).enumerate() {
        if window == jpeg_start {
            if let Some(end_offset) = data[i..].windows(2).position(|w| w == jpeg_end) {
                candidates.push(&data[i..=i + end_offset + 1]);
            }
        }
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));

    for jpeg in candidates {
        if let Ok(img) = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg) {
            debug!("Found {}KB JPEG in {}", jpeg.len() / 1024, raw_path.display());
            return Ok(Some(img));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::io::Cursor;

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Jpeg)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_extract_jpeg_from_data() {
        let jpeg = jpeg_bytes(8, 8);
        let mut data = vec![0u8; 64];
        data.extend_from_slice(&jpeg);
        data.extend_from_slice(&[0u8; 64]);

        let found = extract_jpeg_from_data(&data, 0).unwrap();
        assert_eq!(found, jpeg);
        assert!(extract_jpeg_from_data(&data, jpeg.len() + 1).is_none());
        assert!(extract_jpeg_from_data(&[0u8; 128], 0).is_none());
    }

    #[test]
    fn test_thumbnail_from_rendered_image() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("scan.png");
        RgbImage::from_pixel(64, 32, Rgb([10, 20, 30])).save(&src).unwrap();

        let out = thumbnail_path(&dir.path().join("thumbs"), dir.path(), &src);
        assert_eq!(out, dir.path().join("thumbs/scan.png.jpg"));
        generate_thumbnail(&src, &out, 16).unwrap();

        let thumb = image::open(&out).unwrap();
        assert_eq!(thumb.dimensions(), (16, 8));
    }

    #[test]
    fn test_thumbnail_paths_do_not_collide() {
        let thumbs = Path::new("/cache/thumbs");
        let root = Path::new("/photos/2023");

        let first = thumbnail_path(thumbs, root, &root.join("100CANON/IMG_0001.JPG"));
        let second = thumbnail_path(thumbs, root, &root.join("101CANON/IMG_0001.JPG"));
        let raw = thumbnail_path(thumbs, root, &root.join("100CANON/IMG_0001.CR2"));

        assert_eq!(first, thumbs.join("100CANON/IMG_0001.JPG.jpg"));
        assert_eq!(second, thumbs.join("101CANON/IMG_0001.JPG.jpg"));
        assert_eq!(raw, thumbs.join("100CANON/IMG_0001.CR2.jpg"));

        // Outside the root only the file name is kept
        assert_eq!(
            thumbnail_path(thumbs, root, Path::new("/elsewhere/scan.png")),
            thumbs.join("scan.png.jpg")
        );
    }

    #[test]
    fn test_thumbnail_from_raw_embedded_preview() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("DSC_0001.NEF");
        let mut data = vec![0u8; 1024];
        data.extend_from_slice(&jpeg_bytes(40, 40));
        data.extend_from_slice(&[0u8; 1024]);
        fs::write(&raw, data).unwrap();

        let out = dir.path().join("thumbs/DSC_0001.NEF.jpg");
        generate_thumbnail(&raw, &out, 20).unwrap();
        assert_eq!(image::open(&out).unwrap().dimensions(), (20, 20));
    }

    #[test]
    fn test_raw_without_preview() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("DSC_0002.NEF");
        fs::write(&raw, vec![0u8; 4096]).unwrap();
        assert!(matches!(
            generate_thumbnail(&raw, &dir.path().join("DSC_0002.NEF.jpg"), 20),
            Err(Error::NotFound(_))
        ));
    }
}
