// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/label.rs - 类别标签表
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

use std::{collections::HashMap, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("未知类别: {0}")]
  UnknownClass(u32),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("无效的类别编号: '{0}'")]
  InvalidClassId(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelFile {
  Names(Vec<String>),
  Indexed(HashMap<String, String>),
}

/// 类别编号到标签名的只读映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
  labels: HashMap<u32, String>,
}

const LABEL_FILE_SCHEME: &str = "labels";

impl LabelTable {
  pub fn coco() -> Self {
    Self::from_names(COCO_CLASSES)
  }

  /// 按顺序编号，第 i 个名字对应类别 i
  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let labels = names
      .into_iter()
      .enumerate()
      .map(|(id, name)| (id as u32, name.into()))
      .collect();
    Self { labels }
  }

  /// `.json` 文件可以是名字数组或 `{"id": "name"}` 对象；其他文件每行一个标签，空行留空编号
  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)?;

    let table = if path.extension().is_some_and(|ext| ext == "json") {
      match serde_json::from_str::<LabelFile>(&data)? {
        LabelFile::Names(names) => Self::from_names(names),
        LabelFile::Indexed(indexed) => {
          let labels = indexed
            .into_iter()
            .map(|(id, name)| {
              id.trim()
                .parse::<u32>()
                .map(|id| (id, name))
                .map_err(|_| LabelError::InvalidClassId(id))
            })
            .collect::<Result<_, _>>()?;
          Self { labels }
        }
      }
    } else {
      let labels = data
        .lines()
        .enumerate()
        .filter_map(|(id, line)| {
          let name = line.trim();
          (!name.is_empty()).then(|| (id as u32, name.to_string()))
        })
        .collect();
      Self { labels }
    };

    info!("加载标签文件 {}: {} 个类别", path.display(), table.len());
    Ok(table)
  }

  pub fn resolve(&self, class_id: u32) -> Result<&str, LabelError> {
    self
      .labels
      .get(&class_id)
      .map(String::as_str)
      .ok_or(LabelError::UnknownClass(class_id))
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

impl FromUrlWithScheme for LabelTable {
  const SCHEME: &'static str = "coco";
}

impl FromUrl for LabelTable {
  type Error = LabelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      Self::SCHEME => Ok(Self::coco()),
      LABEL_FILE_SCHEME => Self::load(url.path()),
      other => Err(LabelError::SchemeMismatch(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_file(name: &str, content: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("shanan-{}-{}", std::process::id(), name));
    std::fs::write(&path, content).unwrap();
    path
  }

  #[test]
  fn coco_table_resolves_known_ids() {
    let table = LabelTable::coco();
    assert_eq!(table.len(), 80);
    assert_eq!(table.resolve(0).unwrap(), "person");
    assert_eq!(table.resolve(79).unwrap(), "toothbrush");
    // 重复解析结果一致
    assert_eq!(table.resolve(2).unwrap(), table.resolve(2).unwrap());
    assert!(matches!(table.resolve(80), Err(LabelError::UnknownClass(80))));
  }

  #[test]
  fn loads_line_based_files_with_gaps() {
    let path = temp_file("labels.txt", "cat\n\n dog \n");
    let table = LabelTable::load(&path).unwrap();
    assert_eq!(table.resolve(0).unwrap(), "cat");
    assert!(table.resolve(1).is_err());
    assert_eq!(table.resolve(2).unwrap(), "dog");
    std::fs::remove_file(path).unwrap();
  }

  #[test]
  fn loads_json_arrays_and_objects() {
    let array = temp_file("array.json", r#"["a", "b"]"#);
    assert_eq!(LabelTable::load(&array).unwrap().resolve(1).unwrap(), "b");
    std::fs::remove_file(array).unwrap();

    let object = temp_file("object.json", r#"{"7": "seven", "12": "twelve"}"#);
    let table = LabelTable::load(&object).unwrap();
    assert_eq!(table.resolve(12).unwrap(), "twelve");
    assert!(table.resolve(0).is_err());
    std::fs::remove_file(object).unwrap();

    let bad = temp_file("bad.json", r#"{"seven": "7"}"#);
    assert!(matches!(LabelTable::load(&bad), Err(LabelError::InvalidClassId(s)) if s == "seven"));
    std::fs::remove_file(bad).unwrap();
  }

  #[test]
  fn builds_from_url() {
    let coco = LabelTable::from_url(&Url::parse("coco:").unwrap()).unwrap();
    assert_eq!(coco, LabelTable::coco());

    let err = LabelTable::from_url(&Url::parse("voc:").unwrap());
    assert!(matches!(err, Err(LabelError::SchemeMismatch(s)) if s == "voc"));
  }
}
