// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/normalize.rs - 检测结果整理与统计
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

use thiserror::Error;

use crate::model::{ClassTable, RawDetection};

/// 报告使用的检测记录
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
  pub class_name: String,
  pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScanMetrics {
  pub target_count: usize,
  pub mean_confidence: f32,
  pub inference_latency_ms: f64,
}

impl ScanMetrics {
  pub fn with_latency(mut self, latency_ms: f64) -> Self {
    self.inference_latency_ms = latency_ms.max(0.0);
    self
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
  /// 类别表与模型权重不一致
  #[error("第 {index} 个检测结果的类别编号 {class_id} 不在类别表中")]
  ClassLookupMismatch { class_id: u32, index: usize },
}

/// 逐条映射类别名称，保持输入顺序；任一编号缺失则整体失败
pub fn normalize(
  raw: &[RawDetection],
  classes: &ClassTable,
) -> Result<Vec<DetectionRecord>, NormalizeError> {
  raw
    .iter()
    .enumerate()
    .map(|(index, det)| {
      classes
        .get(det.class_id)
        .map(|name| DetectionRecord {
          class_name: name.to_string(),
          confidence: det.confidence,
        })
        .ok_or(NormalizeError::ClassLookupMismatch {
          class_id: det.class_id,
          index,
        })
    })
    .collect()
}

pub fn summarize(records: &[DetectionRecord]) -> ScanMetrics {
  let target_count = records.len();
  let mean_confidence = if target_count == 0 {
    0.0
  } else {
    records.iter().map(|r| r.confidence).sum::<f32>() / target_count as f32
  };

  ScanMetrics {
    target_count,
    mean_confidence,
    inference_latency_ms: 0.0,
  }
}
