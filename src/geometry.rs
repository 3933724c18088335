// 该文件是 Shanan （山南西风） 项目的一部分。
// src/geometry.rs - Letterbox 缩放填充与坐标逆变换
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

use std::{borrow::Cow, fmt};

use image::{
  Rgb, RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;

use crate::config::{FitMode, LetterboxConfig};

/// 图像尺寸，高在前、宽在后
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
  pub height: u32,
  pub width: u32,
}

impl Shape {
  pub const fn new(height: u32, width: u32) -> Self {
    Self { height, width }
  }

  pub fn of_image(image: &RgbImage) -> Self {
    Self::new(image.height(), image.width())
  }

  pub fn is_empty(&self) -> bool {
    self.height == 0 || self.width == 0
  }
}

impl fmt::Display for Shape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}", self.height, self.width)
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
  #[error("图像尺寸为空: {0}")]
  EmptyShape(Shape),
  #[error("图像尺寸不匹配: 期望 {expected}, 实际 {actual}")]
  ShapeMismatch { expected: Shape, actual: Shape },
}

/// 宽、高方向的缩放比例
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratio {
  pub x: f64,
  pub y: f64,
}

/// 每一侧的填充量（取整前，已折半）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
  pub dw: f64,
  pub dh: f64,
}

/// 取整后的实际边框像素数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
  pub top: u32,
  pub bottom: u32,
  pub left: u32,
  pub right: u32,
}

/// 一次 letterbox 变换的全部参数。
///
/// `ratio` 与 `pad` 是正向变换实际使用的值，逆变换必须使用同一组值，
/// 不能根据填充后图像的尺寸重新推算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub source: Shape,
  pub unpadded: Shape,
  pub final_shape: Shape,
  pub ratio: Ratio,
  pub pad: Padding,
}

pub fn compute_letterbox(
  source: Shape,
  config: &LetterboxConfig,
) -> Result<Letterbox, GeometryError> {
  let target = config.target;
  if source.is_empty() {
    return Err(GeometryError::EmptyShape(source));
  }
  if target.is_empty() {
    return Err(GeometryError::EmptyShape(target));
  }

  let (src_h, src_w) = (source.height as f64, source.width as f64);
  let (dst_h, dst_w) = (target.height as f64, target.width as f64);

  if config.fit == FitMode::Stretch {
    return Ok(Letterbox {
      source,
      unpadded: target,
      final_shape: target,
      ratio: Ratio {
        x: dst_w / src_w,
        y: dst_h / src_h,
      },
      pad: Padding { dw: 0.0, dh: 0.0 },
    });
  }

  let mut r = (dst_h / src_h).min(dst_w / src_w);
  if !config.allow_upscale {
    r = r.min(1.0);
  }

  // 极端长宽比下短边可能被舍入为 0，至少保留 1 像素
  let unpadded = Shape::new(
    ((src_h * r).round_ties_even() as u32).clamp(1, target.height),
    ((src_w * r).round_ties_even() as u32).clamp(1, target.width),
  );

  let mut dw = target.width - unpadded.width;
  let mut dh = target.height - unpadded.height;
  if config.fit == FitMode::Auto {
    let stride = config.stride.get();
    dw %= stride;
    dh %= stride;
  }

  Ok(Letterbox {
    source,
    unpadded,
    final_shape: Shape::new(unpadded.height + dh, unpadded.width + dw),
    ratio: Ratio { x: r, y: r },
    pad: Padding {
      dw: dw as f64 / 2.0,
      dh: dh as f64 / 2.0,
    },
  })
}

impl Letterbox {
  /// 奇数填充量的多出一像素固定落在下侧与右侧
  pub fn border(&self) -> Border {
    let split = |half: f64| ((half - 0.1).round() as u32, (half + 0.1).round() as u32);
    let (top, bottom) = split(self.pad.dh);
    let (left, right) = split(self.pad.dw);
    Border {
      top,
      bottom,
      left,
      right,
    }
  }

  /// 原图坐标 `[x1, y1, x2, y2]` 映射到填充后坐标
  pub fn forward(&self, bbox: [f64; 4]) -> [f64; 4] {
    let [x1, y1, x2, y2] = bbox;
    [
      x1 * self.ratio.x + self.pad.dw,
      y1 * self.ratio.y + self.pad.dh,
      x2 * self.ratio.x + self.pad.dw,
      y2 * self.ratio.y + self.pad.dh,
    ]
  }

  /// 填充后坐标 `[x1, y1, x2, y2]` 映射回原图坐标
  pub fn invert(&self, bbox: [f64; 4]) -> [f64; 4] {
    let [x1, y1, x2, y2] = bbox;
    [
      (x1 - self.pad.dw) / self.ratio.x,
      (y1 - self.pad.dh) / self.ratio.y,
      (x2 - self.pad.dw) / self.ratio.x,
      (y2 - self.pad.dh) / self.ratio.y,
    ]
  }
}

pub fn apply_letterbox(
  source: &RgbImage,
  letterbox: &Letterbox,
  fill: Rgb<u8>,
) -> Result<RgbImage, GeometryError> {
  let actual = Shape::of_image(source);
  if actual != letterbox.source {
    return Err(GeometryError::ShapeMismatch {
      expected: letterbox.source,
      actual,
    });
  }

  let Shape { height, width } = letterbox.unpadded;
  let resized: Cow<'_, RgbImage> = if letterbox.unpadded == actual {
    Cow::Borrowed(source)
  } else {
    Cow::Owned(imageops::resize(source, width, height, FilterType::Triangle))
  };

  let border = letterbox.border();
  let mut padded = RgbImage::from_pixel(
    border.left + width + border.right,
    border.top + height + border.bottom,
    fill,
  );
  imageops::replace(&mut padded, &*resized, border.left as i64, border.top as i64);

  let produced = Shape::of_image(&padded);
  if produced != letterbox.final_shape {
    return Err(GeometryError::ShapeMismatch {
      expected: letterbox.final_shape,
      actual: produced,
    });
  }

  Ok(padded)
}

#[cfg(test)]
mod tests {
  use std::num::NonZeroU32;

  use super::*;

  const GRAY: Rgb<u8> = Rgb([114, 114, 114]);
  const RED: Rgb<u8> = Rgb([255, 0, 0]);

  fn config(fit: FitMode) -> LetterboxConfig {
    LetterboxConfig::default().with_fit(fit)
  }

  fn assert_close(actual: [f64; 4], expected: [f64; 4], tolerance: f64) {
    for (a, e) in actual.iter().zip(expected) {
      assert!((a - e).abs() <= tolerance, "{actual:?} != {expected:?}");
    }
  }

  #[test]
  fn fixed_mode_pads_landscape_frame_vertically() {
    let lb = compute_letterbox(Shape::new(480, 640), &config(FitMode::Fixed)).unwrap();

    assert_eq!(lb.ratio, Ratio { x: 1.0, y: 1.0 });
    assert_eq!(lb.pad, Padding { dw: 0.0, dh: 80.0 });
    assert_eq!(lb.final_shape, Shape::new(640, 640));

    let padded = lb.forward([100.0, 50.0, 200.0, 150.0]);
    assert_eq!(padded, [100.0, 130.0, 200.0, 230.0]);
    assert_eq!(lb.invert(padded), [100.0, 50.0, 200.0, 150.0]);
  }

  #[test]
  fn auto_mode_trims_padding_to_stride_remainder() {
    let lb = compute_letterbox(Shape::new(480, 640), &config(FitMode::Auto)).unwrap();
    assert_eq!(lb.pad, Padding { dw: 0.0, dh: 0.0 });
    assert_eq!(lb.final_shape, Shape::new(480, 640));

    let lb = compute_letterbox(Shape::new(720, 1280), &config(FitMode::Auto)).unwrap();
    assert_eq!(lb.ratio, Ratio { x: 0.5, y: 0.5 });
    assert_eq!(lb.unpadded, Shape::new(360, 640));
    // 280 mod 32 = 24
    assert_eq!(lb.pad, Padding { dw: 0.0, dh: 12.0 });
    assert_eq!(lb.final_shape, Shape::new(384, 640));
  }

  #[test]
  fn odd_padding_lands_on_bottom_edge() {
    let source = RgbImage::from_pixel(640, 427, RED);
    let lb = compute_letterbox(Shape::of_image(&source), &config(FitMode::Fixed)).unwrap();
    assert_eq!(lb.pad.dh, 106.5);
    assert_eq!(
      lb.border(),
      Border {
        top: 106,
        bottom: 107,
        left: 0,
        right: 0
      }
    );

    let padded = apply_letterbox(&source, &lb, GRAY).unwrap();
    assert_eq!(Shape::of_image(&padded), Shape::new(640, 640));
    assert_eq!(*padded.get_pixel(10, 105), GRAY);
    assert_eq!(*padded.get_pixel(10, 106), RED);
    assert_eq!(*padded.get_pixel(10, 532), RED);
    assert_eq!(*padded.get_pixel(10, 533), GRAY);
  }

  #[test]
  fn no_upscale_clamps_ratio_to_one() {
    let cfg = config(FitMode::Fixed).with_upscale(false);
    let lb = compute_letterbox(Shape::new(100, 200), &cfg).unwrap();
    assert_eq!(lb.ratio, Ratio { x: 1.0, y: 1.0 });
    assert_eq!(lb.unpadded, Shape::new(100, 200));
    assert_eq!(lb.pad, Padding { dw: 220.0, dh: 270.0 });

    let upscaled = compute_letterbox(Shape::new(100, 200), &config(FitMode::Fixed)).unwrap();
    assert!(upscaled.ratio.x > 1.0);
  }

  #[test]
  fn stretch_uses_independent_ratios_without_padding() {
    let lb = compute_letterbox(Shape::new(480, 1280), &config(FitMode::Stretch)).unwrap();
    assert_eq!(lb.ratio.x, 0.5);
    assert!((lb.ratio.y - 640.0 / 480.0).abs() < 1e-12);
    assert_eq!(lb.pad, Padding { dw: 0.0, dh: 0.0 });
    assert_eq!(lb.final_shape, Shape::new(640, 640));

    let bbox = [100.0, 50.0, 300.0, 400.0];
    assert_close(lb.invert(lb.forward(bbox)), bbox, 1.0);

    let source = RgbImage::from_pixel(1280, 480, RED);
    let padded = apply_letterbox(&source, &lb, GRAY).unwrap();
    assert_eq!(Shape::of_image(&padded), Shape::new(640, 640));
  }

  #[test]
  fn padded_frame_always_matches_final_shape() {
    let sources = [(1, 1), (7, 13), (64, 64), (100, 30), (33, 200), (250, 251)];
    let stride = NonZeroU32::new(8).unwrap();

    for fit in [FitMode::Auto, FitMode::Fixed, FitMode::Stretch] {
      let cfg = config(fit)
        .with_target(Shape::new(64, 64))
        .with_stride(stride);
      for (h, w) in sources {
        let source = RgbImage::from_pixel(w, h, RED);
        let lb = compute_letterbox(Shape::new(h, w), &cfg).unwrap();
        let padded = apply_letterbox(&source, &lb, GRAY).unwrap();
        let produced = Shape::of_image(&padded);

        assert_eq!(produced, lb.final_shape, "{fit:?} {h}x{w}");
        match fit {
          FitMode::Auto => {
            assert!(produced.height <= 64 && produced.width <= 64);
            assert_eq!((64 - produced.height) % 8, 0);
            assert_eq!((64 - produced.width) % 8, 0);
          }
          FitMode::Fixed | FitMode::Stretch => assert_eq!(produced, Shape::new(64, 64)),
        }
      }
    }
  }

  #[test]
  fn round_trip_recovers_source_boxes() {
    let cfg = config(FitMode::Fixed);
    for (h, w) in [(480, 640), (1080, 1920), (333, 777), (1000, 10)] {
      let lb = compute_letterbox(Shape::new(h, w), &cfg).unwrap();
      let bbox = [0.0, 0.0, w as f64 - 1.0, h as f64 - 1.0];
      assert_close(lb.invert(lb.forward(bbox)), bbox, 1.0);
    }
  }

  #[test]
  fn rejects_mismatched_and_empty_sources() {
    let lb = compute_letterbox(Shape::new(10, 10), &LetterboxConfig::default()).unwrap();
    let wrong = RgbImage::from_pixel(10, 12, RED);
    assert_eq!(
      apply_letterbox(&wrong, &lb, GRAY),
      Err(GeometryError::ShapeMismatch {
        expected: Shape::new(10, 10),
        actual: Shape::new(12, 10),
      })
    );

    assert_eq!(
      compute_letterbox(Shape::new(0, 10), &LetterboxConfig::default()),
      Err(GeometryError::EmptyShape(Shape::new(0, 10)))
    );
  }
}
