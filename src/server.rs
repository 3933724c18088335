// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server.rs - WebSocket 服务
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

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use axum::{
  Json, Router,
  extract::{
    State,
    ws::{Message, WebSocket, WebSocketUpgrade},
  },
  response::Response,
  routing::get,
};
use bytes::Bytes;
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::watch};
use tracing::{Instrument, info, info_span};

use crate::{
  config::StreamConfig,
  model::Model,
  pipeline::FramePipeline,
  stream::{FrameTransport, Inbound, StreamLoop, wait_for_shutdown},
};

/// 所有连接共享的只读状态
pub struct AppState<M> {
  pipeline: Arc<FramePipeline<M>>,
  stream: StreamConfig,
  shutdown: watch::Receiver<bool>,
  /// 累计接入的连接数，同时用作连接编号
  accepted: AtomicU64,
  /// 当前存活的连接数
  active: AtomicU64,
}

impl<M> AppState<M> {
  pub fn new(
    pipeline: Arc<FramePipeline<M>>,
    stream: StreamConfig,
    shutdown: watch::Receiver<bool>,
  ) -> Self {
    Self {
      pipeline,
      stream,
      shutdown,
      accepted: AtomicU64::new(0),
      active: AtomicU64::new(0),
    }
  }
}

/// 将 axum 的 WebSocket 适配为帧传输通道，Ping/Pong 由 axum 处理后在此忽略
pub struct WebSocketTransport {
  socket: WebSocket,
}

impl WebSocketTransport {
  pub fn new(socket: WebSocket) -> Self {
    Self { socket }
  }
}

impl FrameTransport for WebSocketTransport {
  type Error = axum::Error;

  async fn recv(&mut self) -> Option<Result<Inbound, Self::Error>> {
    loop {
      let message = match self.socket.recv().await? {
        Ok(message) => message,
        Err(e) => return Some(Err(e)),
      };
      let inbound = match message {
        Message::Binary(data) => Inbound::Binary(data),
        Message::Text(text) => Inbound::Text(text.as_str().to_owned()),
        Message::Close(_) => Inbound::Close,
        Message::Ping(_) | Message::Pong(_) => continue,
      };
      return Some(Ok(inbound));
    }
  }

  async fn send(&mut self, frame: Bytes) -> Result<(), Self::Error> {
    self.socket.send(Message::Binary(frame)).await
  }

  async fn close(&mut self) -> Result<(), Self::Error> {
    self.socket.send(Message::Close(None)).await
  }
}

pub fn router<M: Model + 'static>(state: Arc<AppState<M>>) -> Router {
  Router::new()
    .route("/health", get(health::<M>))
    .route("/ws", get(ws_handler::<M>))
    .with_state(state)
}

async fn health<M: Model + 'static>(State(state): State<Arc<AppState<M>>>) -> Json<Value> {
  Json(json!({
    "status": "ok",
    "connections": state.active.load(Ordering::Relaxed),
    "accepted": state.accepted.load(Ordering::Relaxed),
  }))
}

async fn ws_handler<M: Model + 'static>(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState<M>>>,
) -> Response {
  let id = state.accepted.fetch_add(1, Ordering::Relaxed);
  ws.max_message_size(state.stream.max_frame_bytes)
    .on_upgrade(move |socket| handle_socket(socket, state, id))
}

async fn handle_socket<M: Model + 'static>(socket: WebSocket, state: Arc<AppState<M>>, id: u64) {
  let span = info_span!("connection", id);
  async move {
    info!("新连接已建立");
    state.active.fetch_add(1, Ordering::Relaxed);
    StreamLoop::new(Arc::clone(&state.pipeline), state.stream.on_error)
      .with_shutdown(state.shutdown.clone())
      .run(WebSocketTransport::new(socket))
      .await;
    state.active.fetch_sub(1, Ordering::Relaxed);
  }
  .instrument(span)
  .await
}

/// 运行服务直到关闭信号到来
pub async fn serve<M: Model + 'static>(
  listener: TcpListener,
  state: Arc<AppState<M>>,
) -> std::io::Result<()> {
  let mut shutdown = state.shutdown.clone();
  info!("服务监听于 ws://{}/ws", listener.local_addr()?);

  axum::serve(listener, router(state))
    .with_graceful_shutdown(async move { wait_for_shutdown(&mut shutdown).await })
    .await?;

  info!("服务已停止");
  Ok(())
}
