// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/common/mod.rs - 集成测试公共工具
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

#![allow(dead_code)]

use std::{
  io::Cursor,
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use tokio::sync::mpsc;

use shanan_stream::{
  frame::RgbNchwTensor,
  model::{DetectResult, Model},
  stream::{FrameTransport, Inbound},
};

/// 渐变色测试图像
pub fn gradient(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
  })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
  let mut buf = Cursor::new(Vec::new());
  image.write_to(&mut buf, format).unwrap();
  buf.into_inner()
}

pub fn png(width: u32, height: u32) -> Bytes {
  Bytes::from(encode(&gradient(width, height), ImageFormat::Png))
}

pub fn jpeg(width: u32, height: u32) -> Bytes {
  Bytes::from(encode(&gradient(width, height), ImageFormat::Jpeg))
}

/// 解码回复帧，返回 (格式, 宽, 高)
pub fn inspect(data: &[u8]) -> (ImageFormat, u32, u32) {
  let format = image::guess_format(data).unwrap();
  let image = image::load_from_memory_with_format(data, format).unwrap();
  (format, image.width(), image.height())
}

#[derive(thiserror::Error, Debug)]
#[error("检测器不可用")]
pub struct DetectorDown;

/// 每次推理都失败的检测器
pub struct FailingModel;

impl Model for FailingModel {
  type Error = DetectorDown;

  fn infer(&self, _input: &RgbNchwTensor) -> Result<DetectResult, Self::Error> {
    Err(DetectorDown)
  }
}

/// 前 `failures` 次推理失败，之后返回空结果
pub struct FlakyModel {
  failures: usize,
  calls: AtomicUsize,
}

impl FlakyModel {
  pub fn new(failures: usize) -> Self {
    Self {
      failures,
      calls: AtomicUsize::new(0),
    }
  }
}

impl Model for FlakyModel {
  type Error = DetectorDown;

  fn infer(&self, _input: &RgbNchwTensor) -> Result<DetectResult, Self::Error> {
    if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
      Err(DetectorDown)
    } else {
      Ok(DetectResult::default())
    }
  }
}

/// 每次推理阻塞一段时间
pub struct SlowModel(pub Duration);

impl Model for SlowModel {
  type Error = DetectorDown;

  fn infer(&self, _input: &RgbNchwTensor) -> Result<DetectResult, Self::Error> {
    std::thread::sleep(self.0);
    Ok(DetectResult::default())
  }
}

/// 推理时直接崩溃
pub struct PanickingModel;

impl Model for PanickingModel {
  type Error = DetectorDown;

  fn infer(&self, _input: &RgbNchwTensor) -> Result<DetectResult, Self::Error> {
    panic!("检测器崩溃");
  }
}

/// 基于 mpsc 通道的内存传输，用于驱动流式循环
pub struct ChannelTransport {
  inbound: mpsc::Receiver<Result<Inbound, String>>,
  outbound: mpsc::UnboundedSender<Bytes>,
  closed: Arc<AtomicBool>,
}

/// 测试端持有的另一半
pub struct Peer {
  pub inbound: mpsc::Sender<Result<Inbound, String>>,
  pub outbound: mpsc::UnboundedReceiver<Bytes>,
  pub closed: Arc<AtomicBool>,
}

impl Peer {
  pub async fn frame(&self, data: Bytes) {
    self.inbound.send(Ok(Inbound::Binary(data))).await.unwrap();
  }

  pub async fn text(&self, text: &str) {
    self
      .inbound
      .send(Ok(Inbound::Text(text.to_string())))
      .await
      .unwrap();
  }

  pub fn was_closed(&self) -> bool {
    self.closed.load(Ordering::SeqCst)
  }
}

pub fn channel_transport() -> (ChannelTransport, Peer) {
  let (in_tx, in_rx) = mpsc::channel(16);
  let (out_tx, out_rx) = mpsc::unbounded_channel();
  let closed = Arc::new(AtomicBool::new(false));
  (
    ChannelTransport {
      inbound: in_rx,
      outbound: out_tx,
      closed: Arc::clone(&closed),
    },
    Peer {
      inbound: in_tx,
      outbound: out_rx,
      closed,
    },
  )
}

impl FrameTransport for ChannelTransport {
  type Error = String;

  async fn recv(&mut self) -> Option<Result<Inbound, Self::Error>> {
    self.inbound.recv().await
  }

  async fn send(&mut self, frame: Bytes) -> Result<(), Self::Error> {
    self.outbound.send(frame).map_err(|e| e.to_string())
  }

  async fn close(&mut self) -> Result<(), Self::Error> {
    self.closed.store(true, Ordering::SeqCst);
    Ok(())
  }
}
