// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 前后处理与推理
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

use std::time::Instant;

use image::{Rgb, RgbImage, imageops::FilterType};
use tracing::debug;

use crate::{
  frame::ScanImage,
  model::{ClassTable, DetectError, DetectOutput, Detector, RawDetection, Thresholds},
  output::draw::Draw,
};

pub const YOLOV8_INPUT_SIZE: u32 = 640;
const YOLOV8_BOX_CHANNELS: usize = 4;
const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);

/// letterbox 缩放参数，用于把模型坐标映射回源图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub source_width: u32,
  pub source_height: u32,
  resized_width: u32,
  resized_height: u32,
}

impl Letterbox {
  pub fn new(source_width: u32, source_height: u32, target: u32) -> Self {
    let scale = target as f32 / source_width.max(source_height) as f32;
    let new_width = ((source_width as f32 * scale).round() as u32).clamp(1, target);
    let new_height = ((source_height as f32 * scale).round() as u32).clamp(1, target);
    Self {
      scale,
      pad_x: ((target - new_width) / 2) as f32,
      pad_y: ((target - new_height) / 2) as f32,
      source_width,
      source_height,
      resized_width: new_width,
      resized_height: new_height,
    }
  }

  /// 模型输入像素坐标转换为源图归一化坐标
  pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
    let sx = (x - self.pad_x) / self.scale;
    let sy = (y - self.pad_y) / self.scale;
    (
      (sx / self.source_width as f32).clamp(0.0, 1.0),
      (sy / self.source_height as f32).clamp(0.0, 1.0),
    )
  }
}

/// 缩放并填充到 target x target，返回 NCHW 排列、归一化到 [0, 1] 的输入
pub fn letterbox(image: &RgbImage, target: u32) -> (Vec<f32>, Letterbox) {
  let (width, height) = image.dimensions();
  let lb = Letterbox::new(width, height, target);
  let resized = image::imageops::resize(
    image,
    lb.resized_width,
    lb.resized_height,
    FilterType::Triangle,
  );
  let mut canvas = RgbImage::from_pixel(target, target, LETTERBOX_FILL);
  image::imageops::replace(&mut canvas, &resized, lb.pad_x as i64, lb.pad_y as i64);

  let plane = (target * target) as usize;
  let mut data = vec![0f32; 3 * plane];
  for (x, y, pixel) in canvas.enumerate_pixels() {
    let idx = (y * target + x) as usize;
    for c in 0..3 {
      data[c * plane + idx] = pixel[c] as f32 / 255.0;
    }
  }

  (data, lb)
}

/// 解析形状为 [1, 4 + nc, N] 的输出，框为模型输入像素下的中心点与宽高
pub fn decode(
  output: &[f32],
  shape: &[usize],
  confidence: f32,
  lb: &Letterbox,
) -> Result<Vec<RawDetection>, DetectError> {
  let (channels, boxes) = match shape {
    [1, channels, boxes] | [channels, boxes]
      if *channels > YOLOV8_BOX_CHANNELS && output.len() == channels * boxes =>
    {
      (*channels, *boxes)
    }
    _ => return Err(DetectError::OutputShape(shape.to_vec())),
  };
  let num_classes = channels - YOLOV8_BOX_CHANNELS;
  debug!("YOLOv8 输出: {} 个类别, {} 个候选框", num_classes, boxes);

  let at = |c: usize, i: usize| output[c * boxes + i];
  let mut items = Vec::new();
  for i in 0..boxes {
    let (class_id, score) = (0..num_classes)
      .map(|c| (c, at(YOLOV8_BOX_CHANNELS + c, i)))
      .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if score < confidence {
      continue;
    }

    let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
    let (x_min, y_min) = lb.to_source(cx - w / 2.0, cy - h / 2.0);
    let (x_max, y_max) = lb.to_source(cx + w / 2.0, cy + h / 2.0);
    if x_max <= x_min || y_max <= y_min {
      continue;
    }

    items.push(RawDetection {
      class_id: class_id as u32,
      confidence: score.clamp(0.0, 1.0),
      bbox: [x_min, y_min, x_max, y_max],
    });
  }

  Ok(items)
}

/// 按类别的非极大值抑制，结果按置信度降序
pub fn nms(mut items: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
  items.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut keep: Vec<RawDetection> = Vec::with_capacity(items.len());
  for item in items {
    let suppressed = keep
      .iter()
      .any(|kept| kept.class_id == item.class_id && kept.iou(&item) > iou_threshold);
    if !suppressed {
      keep.push(item);
    }
  }
  keep
}

/// 推理后端：把 letterbox 输入转换为后端张量，执行推理，再取出扁平输出与形状
pub trait InferenceBackend {
  type Input;
  type Output;

  fn prepare(&mut self, data: Vec<f32>, size: usize) -> Result<Self::Input, DetectError>;
  fn run(&mut self, input: Self::Input) -> Result<Self::Output, DetectError>;
  fn extract(&self, output: &Self::Output) -> Result<(Vec<f32>, Vec<usize>), DetectError>;
}

/// YOLOv8 检测器，推理交给后端，前后处理与绘制在此完成
pub struct Yolov8<B> {
  backend: B,
  classes: ClassTable,
  draw: Draw<'static>,
}

impl<B: InferenceBackend> Yolov8<B> {
  pub fn new(backend: B, classes: ClassTable) -> Self {
    Self {
      backend,
      classes,
      draw: Draw::default(),
    }
  }
}

impl<B: InferenceBackend> Detector for Yolov8<B> {
  fn detect(
    &mut self,
    image: &ScanImage,
    thresholds: &Thresholds,
  ) -> Result<DetectOutput, DetectError> {
    let preprocess = Instant::now();
    let (data, lb) = letterbox(image.as_rgb(), YOLOV8_INPUT_SIZE);
    let input = self.backend.prepare(data, YOLOV8_INPUT_SIZE as usize)?;
    debug!("预处理耗时: {:.2?}", preprocess.elapsed());

    // 延迟只统计模型推理本身
    let run = Instant::now();
    let output = self.backend.run(input)?;
    let latency_ms = run.elapsed().as_secs_f64() * 1000.0;

    let postprocess = Instant::now();
    let (flat, shape) = self.backend.extract(&output)?;
    let candidates = decode(&flat, &shape, thresholds.confidence, &lb)?;
    let items = nms(candidates, thresholds.iou);
    debug!(
      "检测到 {} 个物体，推理 {:.1} ms，后处理 {:.2?}",
      items.len(),
      latency_ms,
      postprocess.elapsed()
    );

    let annotated = self.draw.annotate(image.as_rgb(), &items, &self.classes);
    Ok(DetectOutput {
      items: items.into_boxed_slice(),
      annotated,
      latency_ms,
    })
  }

  fn class_table(&self) -> &ClassTable {
    &self.classes
  }
}

#[cfg(feature = "onnx")]
mod onnx {
  use std::path::Path;

  use ndarray::{Array, IxDyn};
  use ort::{
    session::Session,
    value::{DynValue, Tensor},
  };
  use tracing::{debug, info};

  use super::{InferenceBackend, Yolov8};
  use crate::model::{DetectError, ModelLoadError};

  fn inference(e: ort::Error) -> DetectError {
    DetectError::Inference(e.to_string())
  }

  /// ONNX Runtime 会话
  pub struct OnnxBackend {
    session: Session,
    input_name: String,
    output_name: String,
  }

  pub type Yolov8Onnx = Yolov8<OnnxBackend>;

  impl OnnxBackend {
    pub fn load(weights: &Path) -> Result<Self, ModelLoadError> {
      info!("加载模型文件: {}", weights.display());
      let runtime = |e: ort::Error| ModelLoadError::Runtime(e.to_string());
      let session = Session::builder()
        .map_err(runtime)?
        .commit_from_file(weights)
        .map_err(runtime)?;
      debug!("模型输入数量: {}", session.inputs.len());
      debug!("模型输出数量: {}", session.outputs.len());

      let input_name = session
        .inputs
        .first()
        .map(|i| i.name.clone())
        .ok_or_else(|| ModelLoadError::Runtime("模型没有输入".to_string()))?;
      let output_name = session
        .outputs
        .first()
        .map(|o| o.name.clone())
        .ok_or_else(|| ModelLoadError::Runtime("模型没有输出".to_string()))?;

      Ok(Self {
        session,
        input_name,
        output_name,
      })
    }
  }

  impl InferenceBackend for OnnxBackend {
    type Input = Tensor<f32>;
    type Output = DynValue;

    fn prepare(&mut self, data: Vec<f32>, size: usize) -> Result<Self::Input, DetectError> {
      let input = Array::from_shape_vec(IxDyn(&[1, 3, size, size]), data)
        .map_err(|e| DetectError::Inference(e.to_string()))?;
      Tensor::from_array(input).map_err(inference)
    }

    fn run(&mut self, input: Self::Input) -> Result<Self::Output, DetectError> {
      let mut outputs = self
        .session
        .run(ort::inputs![self.input_name.as_str() => input])
        .map_err(inference)?;
      outputs
        .remove(&self.output_name)
        .ok_or_else(|| DetectError::Inference(format!("缺少模型输出 {}", self.output_name)))
    }

    fn extract(&self, output: &Self::Output) -> Result<(Vec<f32>, Vec<usize>), DetectError> {
      let view = output.try_extract_array::<f32>().map_err(inference)?;
      Ok((view.iter().copied().collect(), view.shape().to_vec()))
    }
  }
}

#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxBackend, Yolov8Onnx};
