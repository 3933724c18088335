// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/annotate_oneshot.rs - 单张图像标注
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shanan_stream::{
  FromUrl,
  config::{FitMode, LetterboxConfig, PipelineConfig},
  geometry::Shape,
  input::decode_frame,
  model::{LabelTable, ModelWrapper},
  pipeline::FramePipeline,
};

/// 对单张图像运行一次完整流水线
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测器来源
  #[arg(long, value_name = "MODEL", default_value = "empty:")]
  pub model: Url,
  /// 标签表来源
  #[arg(long, value_name = "LABELS", default_value = "coco:")]
  pub labels: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: PathBuf,
  /// 输出图像（与输入同一编码格式）
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
  /// 检测器输入尺寸
  #[arg(long, default_value = "640x640")]
  pub target: Shape,
  /// 缩放填充模式: auto, fixed, stretch
  #[arg(long, default_value = "auto")]
  pub fit: FitMode,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测器来源: {}", args.model);
  info!("输入图像: {}", args.input.display());
  info!("输出路径: {}", args.output.display());

  let config = PipelineConfig {
    letterbox: LetterboxConfig::default()
      .with_target(args.target)
      .with_fit(args.fit),
    ..PipelineConfig::default()
  };
  let model = ModelWrapper::from_url(&args.model)?;
  let labels = LabelTable::from_url(&args.labels)?;
  let pipeline = FramePipeline::new(model, labels, config)?;

  let frame = decode_frame(&std::fs::read(&args.input)?)?;
  let now = std::time::Instant::now();
  let rendered = pipeline.render(frame)?;
  info!("处理完成，耗时: {:.2?}", now.elapsed());

  if let Some(parent) = args.output.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(&args.output, &rendered.encoded)?;

  println!("{}", serde_json::to_string_pretty(&rendered.detections)?);
  Ok(())
}
