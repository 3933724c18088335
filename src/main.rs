// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 流式检测服务主程序
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

mod args;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

use shanan_stream::{
  FromUrl,
  model::{LabelTable, ModelWrapper},
  pipeline::FramePipeline,
  server::{self, AppState},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("检测器来源: {}", args.model);
  info!("标签表来源: {}", args.labels);
  info!(
    "目标尺寸: {}, 步长: {}, 模式: {:?}, 允许放大: {}",
    args.target, args.stride, args.fit, !args.no_upscale
  );
  info!("单帧错误处理: {:?}", args.on_error);

  let model = ModelWrapper::from_url(&args.model)?;
  let labels = LabelTable::from_url(&args.labels)?;
  let pipeline = Arc::new(FramePipeline::new(model, labels, args.pipeline_config())?);

  let (tx, rx) = watch::channel(false);
  ctrlc::set_handler(move || {
    warn!("收到中断信号，准备退出...");
    let _ = tx.send(true);
  })?;

  let state = Arc::new(AppState::new(pipeline, args.stream_config(), rx));

  let runtime = tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()?;

  runtime.block_on(async move {
    let listener = TcpListener::bind(args.listen).await?;
    server::serve(listener, state).await
  })?;

  Ok(())
}
