// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 输入帧解码
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

use image::ImageFormat;
use thiserror::Error;
use tracing::debug;

use crate::{frame::DecodedFrame, output::supports_format};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("输入数据为空")]
  Empty,
  #[error("图像解码错误: {0}")]
  Decode(#[from] image::ImageError),
  #[error("不支持回传的图像格式: {0:?}")]
  UnsupportedFormat(ImageFormat),
}

/// 将一段编码后的图像字节（JPEG、PNG 等）解码为 RGB 帧
pub fn decode_frame(data: &[u8]) -> Result<DecodedFrame, InputError> {
  if data.is_empty() {
    return Err(InputError::Empty);
  }

  let format = image::guess_format(data)?;
  if !supports_format(format) {
    return Err(InputError::UnsupportedFormat(format));
  }
  let image = image::load_from_memory_with_format(data, format)?.to_rgb8();
  debug!(
    "解码输入帧: {:?} {}x{}, {} 字节",
    format,
    image.width(),
    image.height(),
    data.len()
  );

  Ok(DecodedFrame { image, format })
}
