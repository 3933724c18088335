// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 帧与 NCHW 张量定义
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

use image::{ImageFormat, RgbImage};

use crate::{config::ChannelOrder, geometry::Shape};

const RGB_CHANNELS: usize = 3;

/// 解码后的一帧，记住原始编码格式以便按同一格式回传
#[derive(Debug, Clone)]
pub struct DecodedFrame {
  pub image: RgbImage,
  pub format: ImageFormat,
}

impl DecodedFrame {
  pub fn shape(&self) -> Shape {
    Shape::of_image(&self.image)
  }
}

/// 形状为 (1, 3, H, W) 的归一化浮点张量
#[derive(Debug, Clone)]
pub struct RgbNchwTensor {
  data: Box<[f32]>,
  height: usize,
  width: usize,
  order: ChannelOrder,
}

impl RgbNchwTensor {
  pub fn from_image(image: &RgbImage, order: ChannelOrder) -> Self {
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);
    let plane_size = width * height;
    let mut data = vec![0f32; RGB_CHANNELS * plane_size];

    let channel_map: [usize; RGB_CHANNELS] = match order {
      ChannelOrder::Rgb => [0, 1, 2],
      ChannelOrder::Bgr => [2, 1, 0],
    };

    // HWC -> CHW，同时归一化到 [0, 1]
    for (idx, pixel) in image.pixels().enumerate() {
      for (plane, &channel) in channel_map.iter().enumerate() {
        data[plane * plane_size + idx] = pixel[channel] as f32 / 255.0;
      }
    }

    Self {
      data: data.into_boxed_slice(),
      height,
      width,
      order,
    }
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  /// `[batch, channels, height, width]`
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.height, self.width]
  }

  pub fn get(&self, channel: usize, y: usize, x: usize) -> Option<f32> {
    if channel >= RGB_CHANNELS || y >= self.height || x >= self.width {
      return None;
    }
    self
      .data
      .get(channel * self.height * self.width + y * self.width + x)
      .copied()
  }
}

impl AsRef<[f32]> for RgbNchwTensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}
