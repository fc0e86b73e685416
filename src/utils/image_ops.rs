use anyhow::{Context, Result};
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;

/// Asynchronously load an image from bytes using spawn_blocking.
///
/// Image decoding is CPU-intensive, especially for large images.
pub async fn load_image_from_memory_async(bytes: &[u8]) -> Result<DynamicImage> {
    let bytes = bytes.to_vec(); // Clone to move into blocking task
    tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).context("Failed to load image from memory")
    })
    .await
    .context("Failed to spawn blocking task for image loading")?
}

/// Asynchronously encode an image to JPEG bytes at the given quality.
pub async fn encode_jpeg_async(img: DynamicImage, quality: u8) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut jpeg_bytes = Vec::new();
        let mut cursor = Cursor::new(&mut jpeg_bytes);
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
        img.to_rgb8()
            .write_with_encoder(encoder)
            .context("Failed to encode image as JPEG")?;
        Ok(jpeg_bytes)
    })
    .await
    .context("Failed to spawn blocking task for JPEG encoding")?
}

/// Scale an image so it covers `width` x `height`, then crop the overflow
/// from the center. Used when a stock photo must fill a placeholder box.
pub fn cover_fit(img: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    if width == 0 || height == 0 {
        return RgbaImage::new(1, 1);
    }
    let (src_w, src_h) = (img.width().max(1), img.height().max(1));
    let scale = (width as f32 / src_w as f32).max(height as f32 / src_h as f32);
    let scaled_w = ((src_w as f32 * scale).ceil() as u32).max(width);
    let scaled_h = ((src_h as f32 * scale).ceil() as u32).max(height);

    let resized = img.resize_exact(scaled_w, scaled_h, image::imageops::FilterType::Triangle);
    let off_x = (scaled_w - width) / 2;
    let off_y = (scaled_h - height) / 2;
    resized.crop_imm(off_x, off_y, width, height).to_rgba8()
}

/// Downsample so the longest edge is at most `max_dim`, preserving aspect.
/// Returns the input unchanged when it already fits.
pub fn downsample_for_analysis(img: &image::RgbImage, max_dim: u32) -> image::RgbImage {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if longest <= max_dim || longest == 0 {
        return img.clone();
    }
    let scale = max_dim as f32 / longest as f32;
    let nw = ((w as f32 * scale) as u32).max(1);
    let nh = ((h as f32 * scale) as u32).max(1);
    image::imageops::resize(img, nw, nh, image::imageops::FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba};

    #[tokio::test]
    async fn test_load_image_async() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255])));
        let mut png_bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .unwrap();

        let result = load_image_from_memory_async(&png_bytes).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_encode_jpeg_async() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 128, 0, 255])));
        let bytes = encode_jpeg_async(img, 85).await.unwrap();
        // Alpha input still comes out as a decodable JPEG
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 10);
        assert_eq!(decoded.height(), 10);
    }

    #[test]
    fn cover_fit_fills_exact_box() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 100, Rgba([1, 2, 3, 255])));
        let fitted = cover_fit(&img, 50, 80);
        assert_eq!(fitted.dimensions(), (50, 80));
    }

    #[test]
    fn downsample_preserves_aspect() {
        let img = RgbImage::from_pixel(400, 200, Rgb([10, 10, 10]));
        let small = downsample_for_analysis(&img, 100);
        assert_eq!(small.dimensions(), (100, 50));

        let tiny = RgbImage::from_pixel(40, 20, Rgb([10, 10, 10]));
        assert_eq!(downsample_for_analysis(&tiny, 100).dimensions(), (40, 20));
    }
}
