//! Bounded JPEG previews for image uploads.
//!
//! Generation is best-effort: callers log failures and store the record
//! without a thumbnail. Decoding runs in `spawn_blocking` since the image
//! crate is synchronous.

use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{Result, VaultError};

const BOUND: u32 = 300;
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone)]
pub struct Thumbnailer {
    thumb_dir: PathBuf,
}

impl Thumbnailer {
    pub fn new(thumb_dir: PathBuf) -> Self {
        Self { thumb_dir }
    }

    pub fn thumb_dir(&self) -> &Path {
        &self.thumb_dir
    }

    /// Path a thumbnail for `stored_name` would live at.
    pub fn thumbnail_path(&self, thumbnail_ref: &str) -> PathBuf {
        self.thumb_dir.join(thumbnail_ref)
    }

    /// Generate a thumbnail for the image at `source`, returning the
    /// thumbnail file name (the record's `thumbnail_ref`).
    pub async fn generate(&self, source: &Path, stored_name: &str) -> Result<String> {
        let thumb_name = format!("thumb_{stored_name}.jpg");
        let out_path = self.thumb_dir.join(&thumb_name);
        let source = source.to_path_buf();

        tokio::task::spawn_blocking(move || write_thumbnail(&source, &out_path))
            .await
            .map_err(|e| VaultError::Internal(format!("thumbnail task panicked: {e}")))??;

        Ok(thumb_name)
    }

    /// Read pixel dimensions from the image header without a full decode.
    pub async fn probe_dimensions(&self, source: &Path) -> Option<(u32, u32)> {
        let source = source.to_path_buf();
        tokio::task::spawn_blocking(move || image::image_dimensions(&source).ok())
            .await
            .ok()
            .flatten()
    }

    /// Remove a thumbnail if it exists. Missing files are not an error.
    pub async fn remove(&self, thumbnail_ref: &str) -> Result<()> {
        match tokio::fs::remove_file(self.thumbnail_path(thumbnail_ref)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_thumbnail(source: &Path, out_path: &Path) -> Result<()> {
    let img = image::open(source)
        .map_err(|e| VaultError::Internal(format!("cannot decode {}: {e}", source.display())))?;

    let thumb = flatten_to_rgb(img.thumbnail(BOUND, BOUND));

    let file = std::fs::File::create(out_path)?;
    let encoder = JpegEncoder::new_with_quality(std::io::BufWriter::new(file), JPEG_QUALITY);
    DynamicImage::ImageRgb8(thumb)
        .write_with_encoder(encoder)
        .map_err(|e| VaultError::Internal(format!("cannot encode thumbnail: {e}")))?;
    Ok(())
}

/// Composite any alpha channel onto a white background; JPEG has no alpha.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(dir: &Path, w: u32, h: u32) -> PathBuf {
        let mut img = RgbImage::new(w, h);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = if (x + y) % 2 == 0 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            };
        }
        let path = dir.join("source.png");
        img.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn generates_bounded_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let source = checkerboard(dir.path(), 800, 600);
        let thumbs = Thumbnailer::new(dir.path().to_path_buf());

        let thumb_ref = thumbs.generate(&source, "20260830_img.png").await.unwrap();
        assert_eq!(thumb_ref, "thumb_20260830_img.png.jpg");

        let (w, h) = image::image_dimensions(thumbs.thumbnail_path(&thumb_ref)).unwrap();
        assert!(w <= BOUND && h <= BOUND);
        // Aspect ratio preserved: 800x600 -> 300x225.
        assert_eq!((w, h), (300, 225));
    }

    #[tokio::test]
    async fn non_image_payload_fails_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake.png");
        tokio::fs::write(&fake, b"not an image at all").await.unwrap();
        let thumbs = Thumbnailer::new(dir.path().to_path_buf());

        assert!(thumbs.generate(&fake, "fake.png").await.is_err());
        assert!(thumbs.probe_dimensions(&fake).await.is_none());
    }

    #[tokio::test]
    async fn probe_reads_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let source = checkerboard(dir.path(), 64, 32);
        let thumbs = Thumbnailer::new(dir.path().to_path_buf());
        assert_eq!(thumbs.probe_dimensions(&source).await, Some((64, 32)));
    }

    #[tokio::test]
    async fn remove_tolerates_missing_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let thumbs = Thumbnailer::new(dir.path().to_path_buf());
        thumbs.remove("thumb_never_created.jpg").await.unwrap();
    }
}
