// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/task.rs - 单次扫描任务
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  frame::ScanImage,
  model::{
    DetectError, Detector, LoadDetector, ModelKind, ModelLoadError, ModelRegistry, Thresholds,
  },
  normalize::{DetectionRecord, NormalizeError, ScanMetrics, normalize, summarize},
  output::{Report, ReportError, ReportRenderer},
};

#[derive(Error, Debug)]
pub enum ScanError {
  #[error("模型加载失败: {0}")]
  ModelLoad(#[from] ModelLoadError),
  #[error("检测失败: {0}")]
  Detect(#[from] DetectError),
  #[error("检测结果整理失败: {0}")]
  Normalize(#[from] NormalizeError),
}

/// 一次扫描的完整结果
#[derive(Debug)]
pub struct ScanResult {
  pub records: Vec<DetectionRecord>,
  pub metrics: ScanMetrics,
  pub annotated: RgbImage,
  pub source_dimensions: (u32, u32),
  /// 未请求导出或没有检测到目标时为 None；报告生成失败不影响扫描结果本身
  pub report: Option<Result<Report, ReportError>>,
}

impl ScanResult {
  /// 形如 `1. TANK (90.0%)` 的清单行
  pub fn manifest_lines(&self) -> Vec<String> {
    self
      .records
      .iter()
      .enumerate()
      .map(|(i, r)| {
        format!(
          "{}. {} ({:.1}%)",
          i + 1,
          r.class_name.to_uppercase(),
          r.confidence * 100.0
        )
      })
      .collect()
  }
}

#[derive(Debug, Clone, Default)]
pub struct ScanTask {
  renderer: ReportRenderer,
}

impl ScanTask {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn handle_scan_request(
    &self,
    detector: &mut dyn Detector,
    image: &ScanImage,
    thresholds: &Thresholds,
    export: bool,
  ) -> Result<ScanResult, ScanError> {
    info!("开始扫描: {} x {} px", image.width(), image.height());
    let now = std::time::Instant::now();
    let output = detector.detect(image, thresholds)?;
    info!(
      "推理完成，耗时: {:.2?}（模型报告 {:.2} ms）",
      now.elapsed(),
      output.latency_ms
    );

    let records = normalize(&output.items, detector.class_table())?;
    let metrics = summarize(&records).with_latency(output.latency_ms);
    debug!(
      "检测到 {} 个目标，平均置信度 {:.4}",
      metrics.target_count, metrics.mean_confidence
    );

    let report = if !export {
      None
    } else if records.is_empty() {
      warn!("未检测到目标，跳过报告生成");
      None
    } else {
      let now = std::time::Instant::now();
      let report = self.renderer.render(image, &output.annotated, &records);
      match &report {
        Ok(r) => info!("报告生成完成，耗时: {:.2?}，{} 页", now.elapsed(), r.page_count),
        Err(e) => warn!("报告生成失败: {}", e),
      }
      Some(report)
    };

    Ok(ScanResult {
      records,
      metrics,
      annotated: output.annotated,
      source_dimensions: image.dimensions(),
      report,
    })
  }

  /// 从模型缓存取出检测器后执行扫描
  pub fn scan_with<L: LoadDetector>(
    &self,
    registry: &mut ModelRegistry<L>,
    kind: ModelKind,
    image: &ScanImage,
    thresholds: &Thresholds,
    export: bool,
  ) -> Result<ScanResult, ScanError> {
    let detector = registry.get(kind)?;
    self.handle_scan_request(detector, image, thresholds, export)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{ClassTable, DetectOutput, RawDetection};
  use image::Rgb;

  /// 返回预设结果的检测器，标注图像尺寸可单独指定
  struct Scripted {
    classes: ClassTable,
    items: Vec<RawDetection>,
    annotated_size: Option<(u32, u32)>,
  }

  impl Scripted {
    fn new(items: Vec<(u32, f32)>) -> Self {
      Self {
        classes: [(0u32, "tank"), (1, "truck"), (2, "helicopter")]
          .into_iter()
          .collect(),
        items: items
          .into_iter()
          .map(|(class_id, confidence)| RawDetection {
            class_id,
            confidence,
            bbox: [0.1, 0.1, 0.5, 0.5],
          })
          .collect(),
        annotated_size: None,
      }
    }
  }

  impl Detector for Scripted {
    fn detect(
      &mut self,
      image: &ScanImage,
      _thresholds: &Thresholds,
    ) -> Result<DetectOutput, DetectError> {
      let annotated = match self.annotated_size {
        Some((w, h)) => RgbImage::new(w, h),
        None => image.as_rgb().clone(),
      };
      Ok(DetectOutput {
        items: self.items.clone().into_boxed_slice(),
        annotated,
        latency_ms: 4.5,
      })
    }

    fn class_table(&self) -> &ClassTable {
      &self.classes
    }
  }

  fn image() -> ScanImage {
    ScanImage::from_rgb(RgbImage::from_pixel(32, 24, Rgb([10, 20, 30]))).unwrap()
  }

  #[test]
  fn three_targets_with_export() {
    let mut detector = Scripted::new(vec![(0, 0.9), (1, 0.4), (2, 0.6)]);
    let result = ScanTask::new()
      .handle_scan_request(&mut detector, &image(), &Thresholds::default(), true)
      .unwrap();

    assert_eq!(result.metrics.target_count, 3);
    assert!((result.metrics.mean_confidence - 0.6333).abs() < 0.001);
    assert_eq!(result.metrics.inference_latency_ms, 4.5);
    assert_eq!(result.source_dimensions, (32, 24));
    let report = result.report.unwrap().unwrap();
    assert!(report.bytes.starts_with(b"%PDF"));
    assert_eq!(
      ScanTask::new()
        .handle_scan_request(&mut detector, &image(), &Thresholds::default(), false)
        .unwrap()
        .manifest_lines(),
      vec!["1. TANK (90.0%)", "2. TRUCK (40.0%)", "3. HELICOPTER (60.0%)"]
    );
  }

  #[test]
  fn empty_scan_produces_no_report() {
    let mut detector = Scripted::new(vec![]);
    let result = ScanTask::new()
      .handle_scan_request(&mut detector, &image(), &Thresholds::default(), true)
      .unwrap();
    assert_eq!(result.metrics.target_count, 0);
    assert_eq!(result.metrics.mean_confidence, 0.0);
    assert!(result.report.is_none());
  }

  #[test]
  fn report_failure_keeps_scan_result() {
    let mut detector = Scripted::new(vec![(0, 0.7)]);
    detector.annotated_size = Some((5, 5));
    let result = ScanTask::new()
      .handle_scan_request(&mut detector, &image(), &Thresholds::default(), true)
      .unwrap();
    assert_eq!(result.records.len(), 1);
    assert!(matches!(
      result.report,
      Some(Err(ReportError::DimensionMismatch { .. }))
    ));
  }

  #[test]
  fn unknown_class_aborts_scan() {
    let mut detector = Scripted::new(vec![(0, 0.7), (9, 0.8)]);
    let err = ScanTask::new()
      .handle_scan_request(&mut detector, &image(), &Thresholds::default(), true)
      .unwrap_err();
    assert!(matches!(
      err,
      ScanError::Normalize(NormalizeError::ClassLookupMismatch {
        class_id: 9,
        index: 1
      })
    ));
  }
}
