// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/model.rs - 检测模型
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

use std::{fmt, path::PathBuf, str::FromStr};

use image::RgbImage;
use thiserror::Error;
use tracing::warn;

use crate::frame::ScanImage;

mod labels;
pub use self::labels::{ClassTable, LabelError};

mod registry;
pub use self::registry::{LoadDetector, ModelRegistry, WeightsLoader};

pub mod yolov8;

pub const DEFAULT_CONFIDENCE: f32 = 0.40;
pub const DEFAULT_IOU: f32 = 0.45;

/// 单个检测结果，bbox 为相对源图的归一化坐标
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
  pub class_id: u32,
  pub confidence: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

impl RawDetection {
  pub fn area(&self) -> f32 {
    (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
  }

  pub fn iou(&self, other: &RawDetection) -> f32 {
    let x_min = self.bbox[0].max(other.bbox[0]);
    let y_min = self.bbox[1].max(other.bbox[1]);
    let x_max = self.bbox[2].min(other.bbox[2]);
    let y_max = self.bbox[3].min(other.bbox[3]);

    let intersection = (x_max - x_min).max(0.0) * (y_max - y_min).max(0.0);
    let union = self.area() + other.area() - intersection;
    if union <= 0.0 {
      0.0
    } else {
      intersection / union
    }
  }
}

/// 检测器一次调用的输出
#[derive(Debug, Clone)]
pub struct DetectOutput {
  pub items: Box<[RawDetection]>,
  /// 绘制了检测框和标签的图像，与输入尺寸相同
  pub annotated: RgbImage,
  pub latency_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  pub confidence: f32,
  pub iou: f32,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE,
      iou: DEFAULT_IOU,
    }
  }
}

impl Thresholds {
  /// 超出 [0, 1] 的阈值会被截断
  pub fn new(confidence: f32, iou: f32) -> Self {
    Self {
      confidence: clamp_unit("置信度", confidence),
      iou: clamp_unit("IoU", iou),
    }
  }
}

fn clamp_unit(name: &str, value: f32) -> f32 {
  if (0.0..=1.0).contains(&value) {
    value
  } else {
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    warn!("{}阈值 {} 超出范围，已截断为 {}", name, value, clamped);
    clamped
  }
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("推理错误: {0}")]
  Inference(String),
  #[error("模型输出形状错误: {0:?}")]
  OutputShape(Vec<usize>),
}

/// 目标检测能力，检测器实现负责推理、后处理以及结果绘制
pub trait Detector {
  fn detect(
    &mut self,
    image: &ScanImage,
    thresholds: &Thresholds,
  ) -> Result<DetectOutput, DetectError>;

  /// 与模型权重对应的类别表
  fn class_table(&self) -> &ClassTable;
}

/// 可选的模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
  Custom,
  YoloV8Nano,
  YoloV8Medium,
}

impl ModelKind {
  pub fn weights_file(&self) -> &'static str {
    match self {
      ModelKind::Custom => "best.onnx",
      ModelKind::YoloV8Nano => "yolov8n.onnx",
      ModelKind::YoloV8Medium => "yolov8m.onnx",
    }
  }

  /// 自定义模型需要同名的类别表文件，预训练模型使用内置 COCO 类别
  pub fn labels_file(&self) -> Option<&'static str> {
    match self {
      ModelKind::Custom => Some("best.json"),
      _ => None,
    }
  }
}

impl fmt::Display for ModelKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ModelKind::Custom => "Custom Model (best.onnx)",
      ModelKind::YoloV8Nano => "YOLOv8 Nano (Fast)",
      ModelKind::YoloV8Medium => "YOLOv8 Medium (Accurate)",
    };
    f.write_str(name)
  }
}

impl FromStr for ModelKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "custom" => Ok(ModelKind::Custom),
      "nano" | "yolov8n" => Ok(ModelKind::YoloV8Nano),
      "medium" | "yolov8m" => Ok(ModelKind::YoloV8Medium),
      other => Err(format!("未知模型: {} (可选 custom, nano, medium)", other)),
    }
  }
}

/// 模型加载失败，对当前进程是终态，缓存后不再重试
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelLoadError {
  #[error("模型权重文件不存在: {0}")]
  MissingWeights(PathBuf),
  #[error("类别表文件不存在: {0}")]
  MissingLabels(PathBuf),
  #[error("类别表无效 {path}: {reason}")]
  InvalidLabels { path: PathBuf, reason: String },
  #[error("不支持的模型格式: {0}")]
  Unsupported(String),
  #[error("模型加载错误: {0}")]
  Runtime(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(bbox: [f32; 4]) -> RawDetection {
    RawDetection {
      class_id: 0,
      confidence: 0.5,
      bbox,
    }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = det([0.1, 0.1, 0.5, 0.5]);
    assert!((a.iou(&a) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = det([0.0, 0.0, 0.2, 0.2]);
    let b = det([0.5, 0.5, 0.9, 0.9]);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn iou_of_half_overlap() {
    let a = det([0.0, 0.0, 0.4, 0.2]);
    let b = det([0.2, 0.0, 0.6, 0.2]);
    // 交集 0.04，并集 0.12
    assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-5);
  }

  #[test]
  fn thresholds_are_clamped() {
    let t = Thresholds::new(1.5, -0.2);
    assert_eq!(t.confidence, 1.0);
    assert_eq!(t.iou, 0.0);
    assert_eq!(Thresholds::new(0.3, 0.7), Thresholds { confidence: 0.3, iou: 0.7 });
  }

  #[test]
  fn model_kind_parses_selector_names() {
    assert_eq!("nano".parse::<ModelKind>().unwrap(), ModelKind::YoloV8Nano);
    assert_eq!("Medium".parse::<ModelKind>().unwrap(), ModelKind::YoloV8Medium);
    assert_eq!("custom".parse::<ModelKind>().unwrap(), ModelKind::Custom);
    assert!("large".parse::<ModelKind>().is_err());
    assert_eq!(ModelKind::Custom.labels_file(), Some("best.json"));
    assert_eq!(ModelKind::YoloV8Nano.weights_file(), "yolov8n.onnx");
  }
}
