// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出帧编码
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::io::Cursor;

use image::{ImageFormat, RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;

pub mod draw;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("图像编码错误: {0}")]
  Encode(#[from] image::ImageError),
}

/// 能以 RGB8 原样回写的编码格式
const REPLY_FORMATS: [ImageFormat; 8] = [
  ImageFormat::Png,
  ImageFormat::Jpeg,
  ImageFormat::Gif,
  ImageFormat::Bmp,
  ImageFormat::Tiff,
  ImageFormat::Pnm,
  ImageFormat::WebP,
  ImageFormat::Qoi,
];

/// 该格式的帧能否按同一格式回传
pub fn supports_format(format: ImageFormat) -> bool {
  REPLY_FORMATS.contains(&format)
}

/// 按指定格式编码一帧；JPEG 使用给定质量，其余格式使用编码器默认参数
pub fn encode_frame(
  image: &RgbImage,
  format: ImageFormat,
  jpeg_quality: u8,
) -> Result<Vec<u8>, OutputError> {
  let mut buffer = Vec::new();
  match format {
    ImageFormat::Jpeg => {
      let mut encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality);
      encoder.encode_image(image)?;
    }
    _ => image.write_to(&mut Cursor::new(&mut buffer), format)?,
  }
  Ok(buffer)
}
