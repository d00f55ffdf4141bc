use anyhow::Context;
use lapwing_core::{ImageDecoder, Texture, TextureMetadata};

/// Image decoder backed by the `image` crate.
///
/// Keeps the source channel layout: grey, grey+alpha, RGB or RGBA, always at
/// 8 bits per channel. Wider samples (16-bit PNG, HDR floats) are narrowed.
///
/// Handles PNG, JPEG, BMP, HDR, TGA, GIF and PNM (`.pgm`/`.ppm`). PSD and PIC
/// sources are classified as images but fail to decode here.
pub struct StdImageDecoder;

impl ImageDecoder for StdImageDecoder {
    fn name(&self) -> &'static str {
        "image"
    }

    fn decode_image(&self, bytes: &[u8]) -> anyhow::Result<Texture> {
        let img = image::load_from_memory(bytes).context("decoding image")?;
        let (width, height) = (img.width(), img.height());
        let channels = img.color().channel_count();

        let pixels = match channels {
            1 => img.into_luma8().into_raw(),
            2 => img.into_luma_alpha8().into_raw(),
            3 => img.into_rgb8().into_raw(),
            _ => img.into_rgba8().into_raw(),
        };
        let bit_depth = channels.min(4) as i32;

        let metadata = TextureMetadata {
            width: i32::try_from(width).context("image width exceeds i32")?,
            height: i32::try_from(height).context("image height exceeds i32")?,
            bit_depth,
        };
        tracing::debug!(width, height, channels = bit_depth, "decoded image");

        Ok(Texture { metadata, pixels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Luma, LumaA, Rgb, Rgba};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn rgba_png_keeps_four_channels() {
        let img = image::RgbaImage::from_fn(2, 2, |x, y| Rgba([x as u8, y as u8, 7, 255]));
        let expected = img.as_raw().clone();
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let texture = StdImageDecoder.decode_image(&bytes).unwrap();
        assert_eq!(
            texture.metadata,
            TextureMetadata { width: 2, height: 2, bit_depth: 4 }
        );
        assert_eq!(texture.pixels, expected);
    }

    #[test]
    fn rgb_and_grey_pngs_keep_their_channel_count() {
        let rgb = image::RgbImage::from_pixel(3, 1, Rgb([1, 2, 3]));
        let texture = StdImageDecoder
            .decode_image(&encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Png))
            .unwrap();
        assert_eq!(texture.metadata.bit_depth, 3);
        assert_eq!(texture.pixels, vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);

        let grey = image::GrayImage::from_pixel(2, 1, Luma([9]));
        let texture = StdImageDecoder
            .decode_image(&encode(DynamicImage::ImageLuma8(grey), ImageFormat::Png))
            .unwrap();
        assert_eq!(texture.metadata.bit_depth, 1);
        assert_eq!(texture.pixels, vec![9, 9]);

        let grey_alpha = image::GrayAlphaImage::from_pixel(1, 1, LumaA([5, 128]));
        let texture = StdImageDecoder
            .decode_image(&encode(DynamicImage::ImageLumaA8(grey_alpha), ImageFormat::Png))
            .unwrap();
        assert_eq!(texture.metadata.bit_depth, 2);
        assert_eq!(texture.pixels, vec![5, 128]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(StdImageDecoder.decode_image(b"definitely not a png").is_err());
    }
}
