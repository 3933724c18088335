// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::{net::SocketAddr, num::NonZeroU32};

use clap::Parser;
use image::Rgb;
use url::Url;

use shanan_stream::{
  config::{
    ChannelOrder, ErrorPolicy, FitMode, LetterboxConfig, PipelineConfig, StreamConfig,
    UnknownClassPolicy, parse_fill,
  },
  geometry::Shape,
};

/// Shanan 流式检测服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, env = "SHANAN_LISTEN", default_value = "0.0.0.0:8000")]
  pub listen: SocketAddr,

  /// 检测器来源
  /// 支持:
  /// - empty: 不产生任何检测结果
  /// - fixed:///path/to/detections.json 回放固定检测结果
  #[arg(long, env = "SHANAN_MODEL", default_value = "empty:", value_name = "MODEL")]
  pub model: Url,

  /// 标签表来源（coco: 或 labels:///path/to/labels.txt）
  #[arg(long, env = "SHANAN_LABELS", default_value = "coco:", value_name = "LABELS")]
  pub labels: Url,

  /// 检测器输入尺寸，HxW 或单个边长
  #[arg(long, env = "SHANAN_TARGET", default_value = "640x640")]
  pub target: Shape,

  /// 填充后尺寸需满足的步长倍数（仅 auto 模式）
  #[arg(long, env = "SHANAN_STRIDE", default_value = "32")]
  pub stride: NonZeroU32,

  /// 禁止放大小于目标尺寸的图像
  #[arg(long, env = "SHANAN_NO_UPSCALE")]
  pub no_upscale: bool,

  /// 缩放填充模式: auto, fixed, stretch
  #[arg(long, env = "SHANAN_FIT", default_value = "auto")]
  pub fit: FitMode,

  /// 填充颜色 R,G,B
  #[arg(long, env = "SHANAN_FILL", default_value = "114,114,114", value_parser = parse_fill)]
  pub fill: Rgb<u8>,

  /// 送入检测器的通道顺序: rgb, bgr
  #[arg(long, env = "SHANAN_CHANNEL_ORDER", default_value = "rgb")]
  pub channel_order: ChannelOrder,

  /// JPEG 回传质量 (1 - 100)
  #[arg(long, env = "SHANAN_JPEG_QUALITY", default_value = "95",
        value_parser = clap::value_parser!(u8).range(1..=100))]
  pub jpeg_quality: u8,

  /// 单帧出错时的处理方式: terminate, skip
  #[arg(long, env = "SHANAN_ON_ERROR", default_value = "terminate")]
  pub on_error: ErrorPolicy,

  /// 未知类别的处理方式: skip, fallback
  #[arg(long, env = "SHANAN_UNKNOWN_CLASS", default_value = "skip")]
  pub unknown_class: UnknownClassPolicy,

  /// 单帧最大字节数
  #[arg(long, env = "SHANAN_MAX_FRAME_BYTES", default_value = "16777216")]
  pub max_frame_bytes: usize,
}

impl Args {
  pub fn pipeline_config(&self) -> PipelineConfig {
    PipelineConfig {
      letterbox: LetterboxConfig::default()
        .with_target(self.target)
        .with_stride(self.stride)
        .with_upscale(!self.no_upscale)
        .with_fit(self.fit)
        .with_fill(self.fill),
      channel_order: self.channel_order,
      jpeg_quality: self.jpeg_quality,
      unknown_class: self.unknown_class,
    }
  }

  pub fn stream_config(&self) -> StreamConfig {
    StreamConfig {
      on_error: self.on_error,
      max_frame_bytes: self.max_frame_bytes,
    }
  }
}
