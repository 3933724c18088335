// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 检测模型接口
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbNchwTensor};

/// 检测器能力。
///
/// 输入为 (1, 3, H, W) 的归一化张量，输出坐标位于该张量自身的坐标系（填充后坐标）。
/// 置信度过滤由实现自行负责。
pub trait Model: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, input: &RgbNchwTensor) -> Result<DetectResult, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectItem {
  pub class_id: u32,
  #[serde(default = "DetectItem::default_score")]
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

impl DetectItem {
  fn default_score() -> f32 {
    1.0
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 映射回原图并解析出标签的检测结果，坐标为原图整数像素
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedDetection {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
  pub class_id: u32,
  pub score: f32,
  pub label: String,
}

mod fixed;
mod label;
pub use self::fixed::{EmptyModel, FixedModel, FixedModelError};
pub use self::label::{COCO_CLASSES, LabelError, LabelTable};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("固定检测器错误: {0}")]
  FixedModelError(#[from] FixedModelError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum ModelWrapper {
  Fixed(FixedModel),
  Empty(EmptyModel),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      FixedModel::SCHEME => Ok(ModelWrapper::Fixed(FixedModel::from_url(url)?)),
      EmptyModel::SCHEME => Ok(ModelWrapper::Empty(EmptyModel)),
      other => Err(ModelError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Model for ModelWrapper {
  type Error = ModelError;

  fn infer(&self, input: &RgbNchwTensor) -> Result<DetectResult, Self::Error> {
    match self {
      ModelWrapper::Fixed(model) => model.infer(input).map_err(ModelError::from),
      ModelWrapper::Empty(model) => match model.infer(input) {
        Ok(result) => Ok(result),
        Err(never) => match never {},
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dispatches_on_scheme() {
    let empty = ModelWrapper::from_url(&Url::parse("empty:").unwrap()).unwrap();
    assert!(matches!(empty, ModelWrapper::Empty(_)));

    let err = ModelWrapper::from_url(&Url::parse("onnx:///model.onnx").unwrap());
    assert!(matches!(err, Err(ModelError::SchemeMismatch(s)) if s == "onnx"));
  }

  #[test]
  fn detect_item_score_defaults_to_one() {
    let item: DetectItem = serde_json::from_str(r#"{"class_id": 3, "bbox": [1, 2, 3, 4]}"#).unwrap();
    assert_eq!(item.score, 1.0);
    assert_eq!(item.bbox, [1.0, 2.0, 3.0, 4.0]);
  }
}
