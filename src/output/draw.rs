// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::model::AnnotatedDetection;

static FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HORIZONTAL_PADDING: i32 = 4;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const TEXT_COLOR: [u8; 3] = [255, 255, 255]; // 白色

pub struct Draw {
  font: FontRef<'static>,
  font_size: f32,
  box_color: Rgb<u8>,
  text_color: Rgb<u8>,
}

impl Draw {
  pub fn new() -> Result<Self, InvalidFont> {
    let font = FontRef::try_from_slice(FONT_DATA)?;
    Ok(Self {
      font,
      font_size: LABEL_FONT_SIZE,
      box_color: Rgb(BOX_COLOR),
      text_color: Rgb(TEXT_COLOR),
    })
  }

  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[AnnotatedDetection]) {
    for detection in detections {
      self.draw_bbox_with_label(image, detection);
    }
  }

  // 坐标已是原图像素坐标，且已被裁剪到图像范围内
  fn draw_bbox_with_label(&self, image: &mut RgbImage, detection: &AnnotatedDetection) {
    let AnnotatedDetection { x1, y1, x2, y2, .. } = *detection;
    if x1 >= x2 || y1 >= y2 {
      return;
    }

    // 边框加粗为 BOX_THICKNESS 像素，逐层向内收缩
    for t in 0..BOX_THICKNESS {
      let w = x2 - x1 - 2 * t + 1;
      let h = y2 - y1 - 2 * t + 1;
      if w <= 0 || h <= 0 {
        break;
      }
      let rect = Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32);
      draw_hollow_rect_mut(image, rect, self.box_color);
    }

    let label = format!("{} {:.2}", detection.label, detection.score);
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, &self.font, &label);

    let label_height = text_height as i32 + 2 * LABEL_TEXT_VERTICAL_PADDING;
    let label_x = x1.max(0);
    // 优先放在边框上方，空间不足时贴着图像顶端
    let label_y = (y1 - label_height).max(0);

    let max_width = (image.width() as i32 - label_x).max(0);
    let label_width = (text_width as i32 + 2 * LABEL_TEXT_HORIZONTAL_PADDING).min(max_width);

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width as u32, label_height as u32);
      draw_filled_rect_mut(image, rect, self.box_color);

      draw_text_mut(
        image,
        self.text_color,
        label_x + LABEL_TEXT_HORIZONTAL_PADDING,
        label_y + LABEL_TEXT_VERTICAL_PADDING,
        scale,
        &self.font,
        &label,
      );
    }
  }
}
