// 该文件是 Shanan （山南西风） 项目的一部分。
// src/stream.rs - 单连接流式处理循环
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

use std::{fmt::Display, future::Future, sync::Arc, time::Instant};

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
  config::ErrorPolicy,
  model::Model,
  pipeline::{FramePipeline, PipelineError},
};

/// 从对端收到的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
  /// 一帧编码图像
  Binary(Bytes),
  Text(String),
  /// 对端主动结束
  Close,
}

/// 双工传输通道。
///
/// `recv` 返回 `None` 表示连接已断开。处理帧期间 `recv` 会与推理任务竞争，
/// 因此必须可以安全取消，未完成时被丢弃不能丢失消息。
pub trait FrameTransport: Send {
  type Error: Display + Send;

  fn recv(&mut self) -> impl Future<Output = Option<Result<Inbound, Self::Error>>> + Send;
  fn send(&mut self, frame: Bytes) -> impl Future<Output = Result<(), Self::Error>> + Send;
  fn close(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
  Connecting,
  Open,
  Closing,
  Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
  /// 对端关闭或结束流
  PeerClosed,
  /// 按 `ErrorPolicy::Terminate` 因单帧错误关闭
  FrameError,
  /// 变换不变量被破坏或处理任务崩溃
  Fatal,
  /// 收发失败
  Transport,
  /// 服务关闭
  Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
  pub received: u64,
  pub replied: u64,
  pub skipped: u64,
  pub reason: CloseReason,
}

pub struct StreamLoop<M> {
  pipeline: Arc<FramePipeline<M>>,
  policy: ErrorPolicy,
  shutdown: Option<watch::Receiver<bool>>,
  state: StreamState,
  /// 处理上一帧期间已经收到的下一条消息
  pending: Option<Inbound>,
  received: u64,
  replied: u64,
  skipped: u64,
}

enum FrameOutcome {
  Replied,
  Skipped,
  Close(CloseReason),
}

enum Processing<R, E> {
  Finished(R),
  Shutdown,
  Message(Option<Result<Inbound, E>>),
}

impl<M: Model + 'static> StreamLoop<M> {
  pub fn new(pipeline: Arc<FramePipeline<M>>, policy: ErrorPolicy) -> Self {
    Self {
      pipeline,
      policy,
      shutdown: None,
      state: StreamState::Connecting,
      pending: None,
      received: 0,
      replied: 0,
      skipped: 0,
    }
  }

  pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
    self.shutdown = Some(shutdown);
    self
  }

  pub fn state(&self) -> StreamState {
    self.state
  }

  fn transition(&mut self, next: StreamState) {
    debug!("连接状态: {:?} -> {:?}", self.state, next);
    self.state = next;
  }

  /// 严格按 接收 → 处理 → 回复 的顺序循环，直到连接结束
  pub async fn run<T: FrameTransport>(mut self, mut transport: T) -> StreamSummary {
    self.transition(StreamState::Open);

    let reason = loop {
      let message = match self.pending.take() {
        Some(inbound) => Some(Some(Ok(inbound))),
        None => tokio::select! {
          message = transport.recv() => Some(message),
          _ = shutdown_requested(&mut self.shutdown) => None,
        },
      };
      let Some(message) = message else {
        break CloseReason::Shutdown;
      };

      let outcome = match message {
        None | Some(Ok(Inbound::Close)) => {
          info!("对端关闭连接");
          FrameOutcome::Close(CloseReason::PeerClosed)
        }
        Some(Err(e)) => {
          warn!("接收失败: {}", e);
          FrameOutcome::Close(CloseReason::Transport)
        }
        Some(Ok(Inbound::Text(text))) => {
          self.received += 1;
          let e = PipelineError::UnsupportedMessage(text.len());
          warn!("第 {} 帧处理失败: {}", self.received, e);
          self.on_frame_error()
        }
        Some(Ok(Inbound::Binary(data))) => {
          self.received += 1;
          self.process(&mut transport, data).await
        }
      };

      match outcome {
        FrameOutcome::Replied => self.replied += 1,
        FrameOutcome::Skipped => self.skipped += 1,
        FrameOutcome::Close(reason) => break reason,
      }
    };

    if reason != CloseReason::PeerClosed && reason != CloseReason::Transport {
      self.transition(StreamState::Closing);
      if let Err(e) = transport.close().await {
        debug!("关闭连接失败: {}", e);
      }
    }
    self.transition(StreamState::Closed);

    let summary = StreamSummary {
      received: self.received,
      replied: self.replied,
      skipped: self.skipped,
      reason,
    };
    info!(
      "连接结束: 收到 {} 帧, 回复 {} 帧, 跳过 {} 帧, 原因 {:?}",
      summary.received, summary.replied, summary.skipped, summary.reason
    );
    summary
  }

  async fn process<T: FrameTransport>(&mut self, transport: &mut T, data: Bytes) -> FrameOutcome {
    let index = self.received;
    let started = Instant::now();

    // 推理是阻塞调用，放到阻塞线程池里执行
    let pipeline = Arc::clone(&self.pipeline);
    let mut task = tokio::task::spawn_blocking(move || pipeline.process_frame(&data));

    // 处理期间仍监听对端：连接关闭时放弃本帧，提前到达的下一条消息留到回复之后
    let joined = loop {
      let listening = self.pending.is_none();
      let event = tokio::select! {
        joined = &mut task => Processing::Finished(joined),
        _ = shutdown_requested(&mut self.shutdown) => Processing::Shutdown,
        message = transport.recv(), if listening => Processing::Message(message),
      };

      match event {
        Processing::Finished(joined) => break joined,
        Processing::Shutdown => {
          info!("服务关闭，放弃第 {} 帧", index);
          return FrameOutcome::Close(CloseReason::Shutdown);
        }
        Processing::Message(None | Some(Ok(Inbound::Close))) => {
          info!("对端在处理期间关闭连接，放弃第 {} 帧", index);
          return FrameOutcome::Close(CloseReason::PeerClosed);
        }
        Processing::Message(Some(Err(e))) => {
          warn!("接收失败: {}", e);
          return FrameOutcome::Close(CloseReason::Transport);
        }
        Processing::Message(Some(Ok(inbound))) => self.pending = Some(inbound),
      }
    };

    match joined {
      Ok(Ok(reply)) => {
        debug!("第 {} 帧处理完成，耗时: {:.2?}", index, started.elapsed());
        match transport.send(Bytes::from(reply)).await {
          Ok(()) => FrameOutcome::Replied,
          Err(e) => {
            warn!("发送第 {} 帧失败: {}", index, e);
            FrameOutcome::Close(CloseReason::Transport)
          }
        }
      }
      Ok(Err(e)) if e.is_fatal() => {
        error!("第 {} 帧处理出现致命错误: {}", index, e);
        FrameOutcome::Close(CloseReason::Fatal)
      }
      Ok(Err(e)) => {
        warn!("第 {} 帧处理失败: {}", index, e);
        self.on_frame_error()
      }
      Err(e) => {
        error!("第 {} 帧处理任务异常退出: {}", index, e);
        FrameOutcome::Close(CloseReason::Fatal)
      }
    }
  }

  fn on_frame_error(&self) -> FrameOutcome {
    match self.policy {
      ErrorPolicy::Skip => FrameOutcome::Skipped,
      ErrorPolicy::Terminate => FrameOutcome::Close(CloseReason::FrameError),
    }
  }
}

async fn shutdown_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
  match shutdown {
    Some(rx) => wait_for_shutdown(rx).await,
    None => std::future::pending().await,
  }
}

/// 等待关闭信号；发送端已释放时永远挂起
pub(crate) async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
  loop {
    let stop = *rx.borrow_and_update();
    if stop {
      return;
    }
    if rx.changed().await.is_err() {
      return std::future::pending().await;
    }
  }
}
