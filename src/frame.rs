// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/frame.rs - 扫描图像定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 MVision Authors

use image::{ImageFormat, RgbImage};
use tracing::debug;

use crate::input::InputError;

/// 支持的上传格式
pub const SUPPORTED_FORMATS: [ImageFormat; 4] = [
  ImageFormat::Jpeg,
  ImageFormat::Png,
  ImageFormat::Bmp,
  ImageFormat::WebP,
];

/// 一次扫描使用的 RGB 图像，创建后不可修改
#[derive(Debug, Clone)]
pub struct ScanImage {
  image: RgbImage,
}

impl ScanImage {
  /// 从已解码的 RGB 图像构造，宽高必须非零
  pub fn from_rgb(image: RgbImage) -> Result<Self, InputError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(InputError::EmptyImage);
    }
    Ok(Self { image })
  }

  /// 解码上传的字节流，统一转换为三通道 RGB（去除透明通道）
  pub fn decode(bytes: &[u8]) -> Result<Self, InputError> {
    let format = image::guess_format(bytes).map_err(|_| InputError::UnknownFormat)?;
    if !SUPPORTED_FORMATS.contains(&format) {
      return Err(InputError::UnsupportedFormat(format!("{:?}", format)));
    }

    let decoded = image::load_from_memory_with_format(bytes, format)?;
    debug!(
      "解码图像: {:?} {}x{} {:?}",
      format,
      decoded.width(),
      decoded.height(),
      decoded.color()
    );
    Self::from_rgb(decoded.to_rgb8())
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  pub fn as_rgb(&self) -> &RgbImage {
    &self.image
  }
}

impl AsRef<[u8]> for ScanImage {
  fn as_ref(&self) -> &[u8] {
    self.image.as_raw()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{DynamicImage, Rgba, RgbaImage};
  use std::io::Cursor;

  fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
  }

  #[test]
  fn decode_png_with_alpha_drops_transparency() {
    let rgba = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 0]));
    let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

    let image = ScanImage::decode(&bytes).unwrap();
    assert_eq!(image.dimensions(), (3, 2));
    assert_eq!(image.as_ref().len(), 3 * 2 * 3);
    assert_eq!(image.as_rgb().get_pixel(0, 0).0, [10, 20, 30]);
  }

  #[test]
  fn decode_bmp_is_accepted() {
    let rgb = RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]));
    let bytes = encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Bmp);
    assert!(ScanImage::decode(&bytes).is_ok());
  }

  #[test]
  fn decode_rejects_garbage() {
    let err = ScanImage::decode(b"definitely not an image").unwrap_err();
    assert!(matches!(err, InputError::UnknownFormat));
  }

  #[test]
  fn decode_rejects_unsupported_format() {
    let rgb = RgbImage::from_pixel(2, 2, image::Rgb([0, 0, 0]));
    let bytes = encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Tiff);
    match ScanImage::decode(&bytes) {
      Err(InputError::UnsupportedFormat(name)) => assert!(name.contains("Tiff")),
      other => panic!("unexpected result: {:?}", other.map(|i| i.dimensions())),
    }
  }

  #[test]
  fn empty_raster_is_rejected() {
    let err = ScanImage::from_rgb(RgbImage::new(0, 5)).unwrap_err();
    assert!(matches!(err, InputError::EmptyImage));
  }
}
