use std::fmt::Debug;
use std::io::Cursor;

use async_trait::async_trait;
use image::DynamicImage;
use image::ImageFormat;
use image::ImageReader;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
  #[error("Unrecognized image format")]
  UnknownFormat,

  #[error("Unsupported source image format: {0:?}")]
  UnsupportedFormat(ImageFormat),

  #[error("{}", .0)]
  Image(#[from] image::ImageError),
}

/// Converts raster image bytes into WebP bytes
#[mockall::automock]
#[async_trait]
pub trait WebpEncoder: Debug + Send + Sync {
  async fn encode(&self, source: Vec<u8>) -> anyhow::Result<Vec<u8>>;
}

/// Encodes with the `image` crate on the blocking thread pool.
///
/// The output is lossless WebP.
#[derive(Debug, Default)]
pub struct ImageWebpEncoder;

#[async_trait]
impl WebpEncoder for ImageWebpEncoder {
  async fn encode(&self, source: Vec<u8>) -> anyhow::Result<Vec<u8>> {
    let encoded = tokio::task::spawn_blocking(move || encode_webp(&source)).await??;
    Ok(encoded)
  }
}

fn image_format(source: &[u8]) -> Result<ImageFormat, EncodeError> {
  let format = image::guess_format(source).map_err(|_| EncodeError::UnknownFormat)?;
  match format {
    ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP => Ok(format),
    _ => Err(EncodeError::UnsupportedFormat(format)),
  }
}

pub fn encode_webp(source: &[u8]) -> Result<Vec<u8>, EncodeError> {
  let format = image_format(source)?;
  let img = ImageReader::with_format(Cursor::new(source), format).decode()?;

  // The WebP encoder only accepts 8-bit RGB(A)
  let img = match img {
    DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
    img if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
    img => DynamicImage::ImageRgb8(img.to_rgb8()),
  };

  let mut bytes: Vec<u8> = Vec::new();
  img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::WebP)?;

  Ok(bytes)
}
