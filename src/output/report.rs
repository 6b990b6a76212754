// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/output/report.rs - PDF 任务报告
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

use chrono::{Local, NaiveDateTime};
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use lopdf::{
  Document, Object, Stream,
  content::{Content, Operation},
  dictionary,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{frame::ScanImage, normalize::DetectionRecord};

pub const REPORT_MIME: &str = "application/pdf";

// A4，单位为 pt
const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 72.0;
const INCH: f32 = 72.0;

const TITLE: &str = "CONFIDENTIAL - MISSION REPORT";
const TITLE_SIZE: f32 = 18.0;
const HEADING: &str = "Surveillance Imagery:";
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 10.0;

const TABLE_HEADER: [&str; 3] = ["Class", "Confidence", "Status"];
const STATUS_DETECTED: &str = "Detected";
const COLUMN_WIDTH: f32 = 2.0 * INCH;
const ROW_HEIGHT: f32 = 18.0;

const IMAGE_WIDTH: f32 = 6.0 * INCH;
const IMAGE_HEIGHT: f32 = 4.0 * INCH;
const JPEG_QUALITY: u8 = 85;

// Courier 系列字体每个字形宽度均为 600/1000 em
const COURIER_ADVANCE: f32 = 0.6;

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("标注图像尺寸 {annotated:?} 与源图像尺寸 {image:?} 不一致")]
  DimensionMismatch {
    image: (u32, u32),
    annotated: (u32, u32),
  },
  #[error("图像编码错误: {0}")]
  Encoding(String),
  #[error("PDF 生成错误: {0}")]
  Pdf(#[from] lopdf::Error),
}

/// 生成完毕的报告，调用方负责保存或传输
#[derive(Debug, Clone)]
pub struct Report {
  pub bytes: Vec<u8>,
  pub file_name: String,
  pub page_count: usize,
}

impl Report {
  pub fn mime(&self) -> &'static str {
    REPORT_MIME
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
  Regular,
  Bold,
}

impl Font {
  fn resource(&self) -> &'static str {
    match self {
      Font::Regular => "F1",
      Font::Bold => "F2",
    }
  }
}

fn text_width(text: &str, size: f32) -> f32 {
  text.chars().count() as f32 * size * COURIER_ADVANCE
}

/// WinAnsi 编码，Latin-1 以外的字符替换为 '?'
fn encode_text(text: &str) -> Vec<u8> {
  text
    .chars()
    .map(|c| match c as u32 {
      0x20..=0x7e | 0xa0..=0xff => c as u8,
      _ => b'?',
    })
    .collect()
}

/// 超出宽度的文本截断并以 "..." 结尾
fn fit_text(text: &str, size: f32, max_width: f32) -> String {
  let max_chars = (max_width / (size * COURIER_ADVANCE)).floor() as usize;
  if text.chars().count() <= max_chars {
    return text.to_string();
  }
  let keep = max_chars.saturating_sub(3);
  let mut fitted: String = text.chars().take(keep).collect();
  fitted.push_str("...");
  fitted
}

fn format_confidence(confidence: f32) -> String {
  format!("{:.2}%", confidence * 100.0)
}

/// 逐页累积绘制指令，y 坐标自页面顶部向下推进
struct PageLayout {
  pages: Vec<Vec<Operation>>,
  cursor: f32,
}

impl PageLayout {
  fn new() -> Self {
    Self {
      pages: vec![Vec::new()],
      cursor: PAGE_HEIGHT - MARGIN,
    }
  }

  fn ops(&mut self) -> &mut Vec<Operation> {
    // pages 至少包含一页
    let last = self.pages.len() - 1;
    &mut self.pages[last]
  }

  fn new_page(&mut self) {
    self.pages.push(Vec::new());
    self.cursor = PAGE_HEIGHT - MARGIN;
  }

  fn ensure_space(&mut self, height: f32) -> bool {
    if self.cursor - height < MARGIN {
      self.new_page();
      true
    } else {
      false
    }
  }

  fn space(&mut self, height: f32) {
    self.cursor -= height;
  }

  fn text_at(&mut self, font: Font, size: f32, x: f32, baseline: f32, gray: f32, text: &str) {
    let ops = self.ops();
    ops.push(Operation::new("g", vec![gray.into()]));
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.resource().into(), size.into()]));
    ops.push(Operation::new("Td", vec![x.into(), baseline.into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(encode_text(text))]));
    ops.push(Operation::new("ET", vec![]));
  }

  fn line(&mut self, font: Font, size: f32, text: &str, centered: bool) {
    let leading = size * 1.2;
    self.ensure_space(leading);
    self.cursor -= leading;
    let x = if centered {
      (PAGE_WIDTH - text_width(text, size)) / 2.0
    } else {
      MARGIN
    };
    let baseline = self.cursor + size * 0.2;
    self.text_at(font, size, x, baseline, 0.0, text);
  }

  fn table_row(&mut self, cells: &[String; 3], header: bool) {
    let left = (PAGE_WIDTH - COLUMN_WIDTH * cells.len() as f32) / 2.0;
    let bottom = self.cursor - ROW_HEIGHT;
    let (font, text_gray) = if header {
      (Font::Bold, 1.0)
    } else {
      (Font::Regular, 0.0)
    };

    if header {
      let ops = self.ops();
      ops.push(Operation::new("g", vec![0.5f32.into()]));
      ops.push(Operation::new(
        "re",
        vec![
          left.into(),
          bottom.into(),
          (COLUMN_WIDTH * cells.len() as f32).into(),
          ROW_HEIGHT.into(),
        ],
      ));
      ops.push(Operation::new("f", vec![]));
    }

    for (i, cell) in cells.iter().enumerate() {
      let x = left + COLUMN_WIDTH * i as f32;
      let ops = self.ops();
      ops.push(Operation::new("G", vec![0.0f32.into()]));
      ops.push(Operation::new("w", vec![1.0f32.into()]));
      ops.push(Operation::new(
        "re",
        vec![x.into(), bottom.into(), COLUMN_WIDTH.into(), ROW_HEIGHT.into()],
      ));
      ops.push(Operation::new("S", vec![]));

      let text = fit_text(cell, BODY_SIZE, COLUMN_WIDTH - 8.0);
      let text_x = x + (COLUMN_WIDTH - text_width(&text, BODY_SIZE)) / 2.0;
      let baseline = bottom + (ROW_HEIGHT - BODY_SIZE) / 2.0 + 2.0;
      self.text_at(font, BODY_SIZE, text_x, baseline, text_gray, &text);
    }

    self.cursor = bottom;
  }

  /// 表格跨页时在新页重复表头
  fn table(&mut self, rows: &[[String; 3]]) {
    let header = TABLE_HEADER.map(str::to_string);
    self.ensure_space(ROW_HEIGHT * 2.0);
    self.table_row(&header, true);
    for row in rows {
      if self.ensure_space(ROW_HEIGHT) {
        self.table_row(&header, true);
      }
      self.table_row(row, false);
    }
  }

  fn image(&mut self, resource: &str, width: f32, height: f32) {
    self.ensure_space(height);
    let x = (PAGE_WIDTH - width) / 2.0;
    let y = self.cursor - height;
    let ops = self.ops();
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
      "cm",
      vec![
        width.into(),
        0.into(),
        0.into(),
        height.into(),
        x.into(),
        y.into(),
      ],
    ));
    ops.push(Operation::new("Do", vec![resource.into()]));
    ops.push(Operation::new("Q", vec![]));
    self.cursor = y;
  }
}

/// 任务报告生成器：标题、检测清单表格、标注图像
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer;

impl ReportRenderer {
  pub fn new() -> Self {
    Self
  }

  pub fn render(
    &self,
    image: &ScanImage,
    annotated: &RgbImage,
    records: &[DetectionRecord],
  ) -> Result<Report, ReportError> {
    self.render_at(image, annotated, records, Local::now().naive_local())
  }

  /// 全部内容在内存中生成，任一步骤失败都不会返回部分文档
  pub fn render_at(
    &self,
    image: &ScanImage,
    annotated: &RgbImage,
    records: &[DetectionRecord],
    generated_at: NaiveDateTime,
  ) -> Result<Report, ReportError> {
    if annotated.dimensions() != image.dimensions() {
      return Err(ReportError::DimensionMismatch {
        image: image.dimensions(),
        annotated: annotated.dimensions(),
      });
    }
    let jpeg = encode_jpeg(annotated)?;
    debug!("标注图像 JPEG 编码完成: {} 字节", jpeg.len());

    let mut layout = PageLayout::new();
    layout.line(Font::Bold, TITLE_SIZE, TITLE, true);
    layout.space(12.0);
    layout.line(
      Font::Regular,
      BODY_SIZE,
      &format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
      false,
    );
    layout.line(
      Font::Regular,
      BODY_SIZE,
      &format!("Source: {} x {} px", image.width(), image.height()),
      false,
    );
    layout.space(24.0);

    let rows: Vec<[String; 3]> = records
      .iter()
      .map(|r| {
        [
          r.class_name.clone(),
          format_confidence(r.confidence),
          STATUS_DETECTED.to_string(),
        ]
      })
      .collect();
    layout.table(&rows);
    layout.space(24.0);

    layout.ensure_space(HEADING_SIZE * 1.2 + 6.0 + IMAGE_HEIGHT);
    layout.line(Font::Bold, HEADING_SIZE, HEADING, false);
    layout.space(6.0);
    layout.image("Im1", IMAGE_WIDTH, IMAGE_HEIGHT);

    let page_count = layout.pages.len();
    let bytes = build_document(layout.pages, annotated.dimensions(), jpeg)?;
    info!(
      "报告生成完成: {} 条记录, {} 页, {} 字节",
      records.len(),
      page_count,
      bytes.len()
    );

    Ok(Report {
      bytes,
      file_name: format!("Mission_Report_{}.pdf", generated_at.format("%H%M%S")),
      page_count,
    })
  }
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, ReportError> {
  if image.width() == 0 || image.height() == 0 {
    return Err(ReportError::Encoding("图像尺寸为空".to_string()));
  }
  let mut jpeg = Vec::new();
  JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
    .encode_image(image)
    .map_err(|e| ReportError::Encoding(e.to_string()))?;
  Ok(jpeg)
}

fn build_document(
  pages: Vec<Vec<Operation>>,
  (width, height): (u32, u32),
  jpeg: Vec<u8>,
) -> Result<Vec<u8>, ReportError> {
  let mut doc = Document::with_version("1.5");
  let pages_id = doc.new_object_id();

  let regular_id = doc.add_object(dictionary! {
    "Type" => "Font",
    "Subtype" => "Type1",
    "BaseFont" => "Courier",
    "Encoding" => "WinAnsiEncoding",
  });
  let bold_id = doc.add_object(dictionary! {
    "Type" => "Font",
    "Subtype" => "Type1",
    "BaseFont" => "Courier-Bold",
    "Encoding" => "WinAnsiEncoding",
  });

  let image_stream = Stream::new(
    dictionary! {
      "Type" => "XObject",
      "Subtype" => "Image",
      "Width" => width,
      "Height" => height,
      "ColorSpace" => "DeviceRGB",
      "BitsPerComponent" => 8,
      "Filter" => "DCTDecode",
    },
    jpeg,
  )
  .with_compression(false);
  let image_id = doc.add_object(image_stream);

  let resources_id = doc.add_object(dictionary! {
    "Font" => dictionary! {
      Font::Regular.resource() => regular_id,
      Font::Bold.resource() => bold_id,
    },
    "XObject" => dictionary! {
      "Im1" => image_id,
    },
  });

  let mut kids = Vec::with_capacity(pages.len());
  for operations in pages {
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    let page_id = doc.add_object(dictionary! {
      "Type" => "Page",
      "Parent" => pages_id,
      "Contents" => content_id,
    });
    kids.push(Object::from(page_id));
  }

  let count = kids.len() as i64;
  doc.objects.insert(
    pages_id,
    Object::Dictionary(dictionary! {
      "Type" => "Pages",
      "Kids" => kids,
      "Count" => count,
      "Resources" => resources_id,
      "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    }),
  );

  let catalog_id = doc.add_object(dictionary! {
    "Type" => "Catalog",
    "Pages" => pages_id,
  });
  doc.trailer.set("Root", catalog_id);
  doc.compress();

  let mut bytes = Vec::new();
  doc.save_to(&mut bytes).map_err(lopdf::Error::from)?;
  Ok(bytes)
}
