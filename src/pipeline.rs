// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 单帧处理流水线
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  config::{PipelineConfig, UnknownClassPolicy},
  frame::{DecodedFrame, RgbNchwTensor},
  geometry::{GeometryError, Letterbox, Shape, apply_letterbox, compute_letterbox},
  input::{InputError, decode_frame},
  model::{AnnotatedDetection, DetectResult, LabelTable, Model},
  output::{OutputError, draw::Draw, encode_frame},
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("输入帧解码失败: {0}")]
  Decode(#[from] InputError),
  #[error("几何变换错误: {0}")]
  Geometry(#[from] GeometryError),
  #[error("检测器错误: {0}")]
  Detector(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("输出帧编码失败: {0}")]
  Encode(#[from] OutputError),
  #[error("字体加载失败: {0}")]
  Font(#[from] ab_glyph::InvalidFont),
  #[error("收到非二进制消息（{0} 字节），无法作为图像帧处理")]
  UnsupportedMessage(usize),
}

impl PipelineError {
  /// 变换结果尺寸不符说明变换本身有缺陷，不能当作普通输入错误跳过
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      PipelineError::Geometry(GeometryError::ShapeMismatch { .. }) | PipelineError::Font(_)
    )
  }
}

pub struct RenderedFrame {
  pub encoded: Vec<u8>,
  pub detections: Vec<AnnotatedDetection>,
}

/// 解码 → letterbox → 张量 → 推理 → 逆变换 → 标注 → 编码
pub struct FramePipeline<M> {
  model: M,
  labels: LabelTable,
  config: PipelineConfig,
  draw: Draw,
}

impl<M: Model> FramePipeline<M> {
  pub fn new(model: M, labels: LabelTable, config: PipelineConfig) -> Result<Self, PipelineError> {
    Ok(Self {
      model,
      labels,
      config,
      draw: Draw::new()?,
    })
  }

  /// 处理一帧编码图像，返回同一编码格式、同一尺寸的标注结果
  pub fn process_frame(&self, data: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let frame = decode_frame(data)?;
    Ok(self.render(frame)?.encoded)
  }

  /// 检测并在原图上绘制结果，同时返回检测结果本身
  pub fn render(&self, frame: DecodedFrame) -> Result<RenderedFrame, PipelineError> {
    let DecodedFrame { mut image, format } = frame;

    let detections = self.detect(&image)?;
    self.draw.draw_detections(&mut image, &detections);

    let encoded = encode_frame(&image, format, self.config.jpeg_quality)?;
    Ok(RenderedFrame {
      encoded,
      detections,
    })
  }

  /// 在原图上运行检测，返回原图坐标下的检测结果
  pub fn detect(&self, image: &RgbImage) -> Result<Vec<AnnotatedDetection>, PipelineError> {
    let letterbox_config = &self.config.letterbox;
    let letterbox = compute_letterbox(Shape::of_image(image), letterbox_config)?;

    // 填充后的图像只用于推理，转换为张量后即释放
    let tensor = {
      let padded = apply_letterbox(image, &letterbox, letterbox_config.fill)?;
      RgbNchwTensor::from_image(&padded, self.config.channel_order)
    };
    debug!(
      "letterbox: {} -> {}, ratio=({:.4}, {:.4}), pad=({}, {})",
      letterbox.source,
      letterbox.final_shape,
      letterbox.ratio.x,
      letterbox.ratio.y,
      letterbox.pad.dw,
      letterbox.pad.dh
    );

    let result = self
      .model
      .infer(&tensor)
      .map_err(|e| PipelineError::Detector(Box::new(e)))?;

    let detections = self.annotate(&letterbox, &result);
    debug!(
      "检测到 {} 个对象，保留 {} 个",
      result.items.len(),
      detections.len()
    );
    Ok(detections)
  }

  fn annotate(&self, letterbox: &Letterbox, result: &DetectResult) -> Vec<AnnotatedDetection> {
    let max_x = letterbox.source.width as i32 - 1;
    let max_y = letterbox.source.height as i32 - 1;

    result
      .items
      .iter()
      .filter_map(|item| {
        let label = match (self.labels.resolve(item.class_id), self.config.unknown_class) {
          (Ok(label), _) => label.to_string(),
          (Err(e), UnknownClassPolicy::Skip) => {
            warn!("跳过检测结果: {}", e);
            return None;
          }
          (Err(_), UnknownClassPolicy::Fallback) => format!("unknown-{}", item.class_id),
        };

        // 先截断为整数，再裁剪到原图范围
        let [x1, y1, x2, y2] = letterbox.invert(item.bbox.map(f64::from)).map(|v| v as i32);
        Some(AnnotatedDetection {
          x1: x1.clamp(0, max_x),
          y1: y1.clamp(0, max_y),
          x2: x2.clamp(0, max_x),
          y2: y2.clamp(0, max_y),
          class_id: item.class_id,
          score: item.score,
          label,
        })
      })
      .collect()
  }
}
