// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 运行配置
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

use std::{num::NonZeroU32, str::FromStr};

use image::Rgb;
use thiserror::Error;

use crate::geometry::Shape;

pub const DEFAULT_TARGET_SIZE: u32 = 640;
pub const DEFAULT_STRIDE: NonZeroU32 = match NonZeroU32::new(32) {
  Some(stride) => stride,
  None => unreachable!(),
};
pub const DEFAULT_FILL: [u8; 3] = [114, 114, 114];
pub const DEFAULT_JPEG_QUALITY: u8 = 95;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("无效的 {name} 取值: '{value}'")]
  InvalidValue { name: &'static str, value: String },
}

impl ConfigError {
  fn invalid(name: &'static str, value: &str) -> Self {
    ConfigError::InvalidValue {
      name,
      value: value.to_string(),
    }
  }
}

/// 缩放填充模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
  /// 等比缩放，填充量对步长取余，得到最小的步长对齐矩形
  #[default]
  Auto,
  /// 等比缩放，填充到完整目标尺寸
  Fixed,
  /// 各轴独立拉伸到目标尺寸，不填充
  Stretch,
}

impl FromStr for FitMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "auto" => Ok(FitMode::Auto),
      "fixed" => Ok(FitMode::Fixed),
      "stretch" => Ok(FitMode::Stretch),
      _ => Err(ConfigError::invalid("fit", s)),
    }
  }
}

/// 送入检测器的张量通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

impl FromStr for ChannelOrder {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "rgb" => Ok(ChannelOrder::Rgb),
      "bgr" => Ok(ChannelOrder::Bgr),
      _ => Err(ConfigError::invalid("channel-order", s)),
    }
  }
}

/// 类别编号不在标签表中时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownClassPolicy {
  /// 丢弃该检测结果
  #[default]
  Skip,
  /// 保留检测结果，使用占位标签
  Fallback,
}

impl FromStr for UnknownClassPolicy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "skip" => Ok(UnknownClassPolicy::Skip),
      "fallback" => Ok(UnknownClassPolicy::Fallback),
      _ => Err(ConfigError::invalid("unknown-class", s)),
    }
  }
}

/// 单帧处理出错时连接的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
  /// 关闭整个连接
  #[default]
  Terminate,
  /// 丢弃该帧，继续处理后续帧
  Skip,
}

impl FromStr for ErrorPolicy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "terminate" => Ok(ErrorPolicy::Terminate),
      "skip" => Ok(ErrorPolicy::Skip),
      _ => Err(ConfigError::invalid("on-error", s)),
    }
  }
}

/// 解析 `HxW`（如 `480x640`）或单个边长（如 `640`）
impl FromStr for Shape {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parse = |v: &str| {
      v.trim()
        .parse::<u32>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::invalid("target", s))
    };

    match s.split_once(|c: char| c == 'x' || c == 'X') {
      Some((height, width)) => Ok(Shape::new(parse(height)?, parse(width)?)),
      None => {
        let side = parse(s)?;
        Ok(Shape::new(side, side))
      }
    }
  }
}

/// 解析 `R,G,B` 形式的填充颜色
pub fn parse_fill(s: &str) -> Result<Rgb<u8>, ConfigError> {
  let channels = s
    .split(',')
    .map(|v| v.trim().parse::<u8>())
    .collect::<Result<Vec<_>, _>>()
    .map_err(|_| ConfigError::invalid("fill", s))?;

  match channels.as_slice() {
    [r, g, b] => Ok(Rgb([*r, *g, *b])),
    [v] => Ok(Rgb([*v, *v, *v])),
    _ => Err(ConfigError::invalid("fill", s)),
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxConfig {
  pub target: Shape,
  pub stride: NonZeroU32,
  pub allow_upscale: bool,
  pub fit: FitMode,
  pub fill: Rgb<u8>,
}

impl Default for LetterboxConfig {
  fn default() -> Self {
    Self {
      target: Shape::new(DEFAULT_TARGET_SIZE, DEFAULT_TARGET_SIZE),
      stride: DEFAULT_STRIDE,
      allow_upscale: true,
      fit: FitMode::default(),
      fill: Rgb(DEFAULT_FILL),
    }
  }
}

impl LetterboxConfig {
  pub fn with_target(mut self, target: Shape) -> Self {
    self.target = target;
    self
  }

  pub fn with_fit(mut self, fit: FitMode) -> Self {
    self.fit = fit;
    self
  }

  pub fn with_stride(mut self, stride: NonZeroU32) -> Self {
    self.stride = stride;
    self
  }

  pub fn with_upscale(mut self, allow_upscale: bool) -> Self {
    self.allow_upscale = allow_upscale;
    self
  }

  pub fn with_fill(mut self, fill: Rgb<u8>) -> Self {
    self.fill = fill;
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
  pub letterbox: LetterboxConfig,
  pub channel_order: ChannelOrder,
  pub jpeg_quality: u8,
  pub unknown_class: UnknownClassPolicy,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      letterbox: LetterboxConfig::default(),
      channel_order: ChannelOrder::default(),
      jpeg_quality: DEFAULT_JPEG_QUALITY,
      unknown_class: UnknownClassPolicy::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
  pub on_error: ErrorPolicy,
  pub max_frame_bytes: usize,
}

impl Default for StreamConfig {
  fn default() -> Self {
    Self {
      on_error: ErrorPolicy::default(),
      max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
    }
  }
}
