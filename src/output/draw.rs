// 该文件是 MVision （目标识别报告） 项目的一部分。
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
// Copyright (C) 2026 MVision Authors

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::model::{ClassTable, RawDetection};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const LABEL_TEXT_HORIZONTAL_PADDING: i32 = 4;
const BOX_THICKNESS: i32 = 2;
const PALETTE_SIZE: u32 = 20;

pub struct Draw<'a> {
  font_size: f32,
  label_text_vertical_padding: i32,
  font: FontRef<'a>,
  palette: Vec<Rgb<u8>>,
}

impl Default for Draw<'static> {
  fn default() -> Self {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontRef::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    let palette = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.8, 0.9))
      .collect();

    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      font,
      palette,
    }
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

impl<'a> Draw<'a> {
  pub fn color_of(&self, class_id: u32) -> Rgb<u8> {
    self.palette[class_id as usize % self.palette.len()]
  }

  /// 复制源图并绘制所有检测框，输出尺寸与源图一致
  pub fn annotate(
    &self,
    image: &RgbImage,
    items: &[RawDetection],
    classes: &ClassTable,
  ) -> RgbImage {
    let mut canvas = image.clone();
    for item in items {
      let name = classes
        .get(item.class_id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", item.class_id));
      let label = format!("{} {:.2}", name, item.confidence);
      self.draw_bbox_with_label(&mut canvas, item, &label);
    }
    canvas
  }

  // bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &RawDetection, label: &str) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let color = self.color_of(item.class_id);

    let x_min = ((item.bbox[0] * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((item.bbox[1] * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((item.bbox[2] * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((item.bbox[3] * h).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 边框按厚度向内收缩绘制
    for t in 0..BOX_THICKNESS {
      let (left, top) = (x_min + t, y_min + t);
      let (right, bottom) = (x_max - t, y_max - t);
      if left > right || top > bottom {
        break;
      }
      for x in left..=right {
        image.put_pixel(x as u32, top as u32, color);
        image.put_pixel(x as u32, bottom as u32, color);
      }
      for y in top..=bottom {
        image.put_pixel(left as u32, y as u32, color);
        image.put_pixel(right as u32, y as u32, color);
      }
    }

    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, &self.font, label);
    let label_width = text_width as i32 + 2 * LABEL_TEXT_HORIZONTAL_PADDING;
    let label_height = text_height as i32 + 2 * self.label_text_vertical_padding;

    // 标签放在边框上方，空间不足时放进框内
    let label_y = if y_min >= label_height {
      y_min - label_height
    } else {
      y_min
    };
    let label_width = label_width.min(w as i32 - x_min);
    if label_width <= 0 || label_height <= 0 {
      return;
    }

    let rect = Rect::at(x_min, label_y).of_size(label_width as u32, label_height as u32);
    draw_filled_rect_mut(image, rect, color);
    draw_text_mut(
      image,
      Rgb([255u8, 255u8, 255u8]),
      x_min + LABEL_TEXT_HORIZONTAL_PADDING,
      label_y + self.label_text_vertical_padding,
      scale,
      &self.font,
      label,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(class_id: u32, bbox: [f32; 4]) -> RawDetection {
    RawDetection {
      class_id,
      confidence: 0.87,
      bbox,
    }
  }

  #[test]
  fn annotate_keeps_dimensions_and_leaves_source_untouched() {
    let source = RgbImage::from_pixel(120, 80, Rgb([0, 0, 0]));
    let draw = Draw::default();
    let annotated = draw.annotate(
      &source,
      &[item(0, [0.25, 0.5, 0.75, 0.95])],
      &ClassTable::coco(),
    );

    assert_eq!(annotated.dimensions(), source.dimensions());
    assert!(source.pixels().all(|p| p.0 == [0, 0, 0]));

    // 左边框上的像素被着色
    let x = (0.25f32 * 120.0).floor() as u32;
    let y = (0.75f32 * 80.0) as u32;
    assert_eq!(*annotated.get_pixel(x, y), draw.color_of(0));
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let source = RgbImage::from_pixel(40, 40, Rgb([9, 9, 9]));
    let annotated = Draw::default().annotate(
      &source,
      &[item(3, [0.5, 0.5, 0.5, 0.9])],
      &ClassTable::coco(),
    );
    assert_eq!(annotated, source);
  }

  #[test]
  fn unknown_class_still_draws() {
    let source = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
    let annotated = Draw::default().annotate(
      &source,
      &[item(500, [0.1, 0.1, 0.9, 0.9])],
      &ClassTable::default(),
    );
    assert_ne!(annotated, source);
  }

  #[test]
  fn palette_colors_differ_between_neighbouring_classes() {
    let draw = Draw::default();
    assert_ne!(draw.color_of(0), draw.color_of(1));
    assert_eq!(draw.color_of(0), draw.color_of(PALETTE_SIZE));
  }
}
