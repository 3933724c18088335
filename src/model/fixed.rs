// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/fixed.rs - 固定输出检测器
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

use std::{convert::Infallible, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNchwTensor,
  model::{DetectItem, DetectResult, Model},
};

#[derive(Error, Debug)]
pub enum FixedModelError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测结果文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("输入张量尺寸不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  InputShape {
    expected: [usize; 2],
    actual: [usize; 2],
  },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayFile {
  Detections(Vec<DetectItem>),
  WithInput {
    input: Option<[usize; 2]>,
    detections: Vec<DetectItem>,
  },
}

/// 每次推理都返回同一组检测结果（填充后坐标）。
///
/// 若设定了输入尺寸 `[H, W]`，尺寸不符的张量会被拒绝，用来模拟固定输入尺寸的检测器。
#[derive(Debug, Clone, Default)]
pub struct FixedModel {
  items: Vec<DetectItem>,
  input: Option<[usize; 2]>,
}

impl FixedModel {
  pub fn new(items: Vec<DetectItem>) -> Self {
    Self { items, input: None }
  }

  pub fn with_input(mut self, height: usize, width: usize) -> Self {
    self.input = Some([height, width]);
    self
  }

  pub fn from_json(data: &str) -> Result<Self, FixedModelError> {
    let model = match serde_json::from_str::<ReplayFile>(data)? {
      ReplayFile::Detections(items) => Self { items, input: None },
      ReplayFile::WithInput { input, detections } => Self {
        items: detections,
        input,
      },
    };
    Ok(model)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, FixedModelError> {
    let path = path.as_ref();
    info!("加载固定检测结果: {}", path.display());
    let model = Self::from_json(&std::fs::read_to_string(path)?)?;
    debug!("固定检测结果数量: {}", model.items.len());
    Ok(model)
  }

  pub fn items(&self) -> &[DetectItem] {
    &self.items
  }
}

impl FromUrlWithScheme for FixedModel {
  const SCHEME: &'static str = "fixed";
}

impl FromUrl for FixedModel {
  type Error = FixedModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FixedModelError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Self::load(url.path())
  }
}

impl Model for FixedModel {
  type Error = FixedModelError;

  fn infer(&self, input: &RgbNchwTensor) -> Result<DetectResult, Self::Error> {
    let actual = [input.height(), input.width()];
    if let Some(expected) = self.input
      && expected != actual
    {
      return Err(FixedModelError::InputShape { expected, actual });
    }
    Ok(DetectResult::from(self.items.clone()))
  }
}

/// 不产生任何检测结果
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyModel;

impl FromUrlWithScheme for EmptyModel {
  const SCHEME: &'static str = "empty";
}

impl FromUrl for EmptyModel {
  type Error = FixedModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FixedModelError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(EmptyModel)
  }
}

impl Model for EmptyModel {
  type Error = Infallible;

  fn infer(&self, _input: &RgbNchwTensor) -> Result<DetectResult, Self::Error> {
    Ok(DetectResult::default())
  }
}

#[cfg(test)]
mod tests {
  use image::{Rgb, RgbImage};

  use super::*;
  use crate::config::ChannelOrder;

  fn tensor(height: u32, width: u32) -> RgbNchwTensor {
    RgbNchwTensor::from_image(&RgbImage::from_pixel(width, height, Rgb([1, 2, 3])), ChannelOrder::Rgb)
  }

  #[test]
  fn parses_both_replay_layouts() {
    let bare = FixedModel::from_json(r#"[{"class_id": 1, "score": 0.5, "bbox": [0, 0, 4, 4]}]"#).unwrap();
    assert_eq!(bare.items().len(), 1);
    assert!(bare.input.is_none());

    let full = FixedModel::from_json(
      r#"{"input": [8, 8], "detections": [{"class_id": 2, "bbox": [1, 1, 2, 2]}]}"#,
    )
    .unwrap();
    assert_eq!(full.input, Some([8, 8]));
    assert_eq!(full.items()[0].class_id, 2);

    assert!(matches!(
      FixedModel::from_json("{\"nope\": true}"),
      Err(FixedModelError::ParseError(_))
    ));
  }

  #[test]
  fn rejects_tensors_of_the_wrong_size() {
    let model = FixedModel::new(vec![]).with_input(8, 8);
    assert!(model.infer(&tensor(8, 8)).is_ok());
    assert!(matches!(
      model.infer(&tensor(4, 8)),
      Err(FixedModelError::InputShape {
        expected: [8, 8],
        actual: [4, 8]
      })
    ));
  }

  #[test]
  fn loads_from_url_path() {
    let path = std::env::temp_dir().join(format!("shanan-fixed-{}.json", std::process::id()));
    std::fs::write(&path, r#"[{"class_id": 0, "bbox": [1, 2, 3, 4]}]"#).unwrap();

    let url = Url::parse(&format!("fixed://{}", path.display())).unwrap();
    let model = FixedModel::from_url(&url).unwrap();
    let result = model.infer(&tensor(2, 2)).unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].bbox, [1.0, 2.0, 3.0, 4.0]);

    std::fs::remove_file(path).unwrap();
  }

  #[test]
  fn empty_model_returns_nothing() {
    assert!(EmptyModel.infer(&tensor(2, 2)).unwrap().items.is_empty());
  }
}
