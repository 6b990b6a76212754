// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/model/registry.rs - 模型缓存
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

use std::{collections::HashMap, path::PathBuf};

use tracing::{error, info};

use crate::model::{ClassTable, Detector, ModelKind, ModelLoadError};

/// 根据模型种类构造检测器
pub trait LoadDetector {
  fn load(&self, kind: ModelKind) -> Result<Box<dyn Detector>, ModelLoadError>;
}

/// 按模型种类惰性创建检测器，每种模型只加载一次，
/// 加载失败的结果同样被缓存，不会自动重试
pub struct ModelRegistry<L> {
  loader: L,
  slots: HashMap<ModelKind, Result<Box<dyn Detector>, ModelLoadError>>,
}

impl<L: LoadDetector> ModelRegistry<L> {
  pub fn new(loader: L) -> Self {
    Self {
      loader,
      slots: HashMap::new(),
    }
  }

  pub fn get(&mut self, kind: ModelKind) -> Result<&mut dyn Detector, ModelLoadError> {
    let loader = &self.loader;
    let slot = self.slots.entry(kind).or_insert_with(|| {
      info!("加载模型: {}", kind);
      let outcome = loader.load(kind);
      match &outcome {
        Ok(_) => info!("模型加载完成: {}", kind),
        Err(e) => error!("模型加载失败: {}: {}", kind, e),
      }
      outcome
    });

    match slot {
      Ok(detector) => Ok(detector.as_mut()),
      Err(e) => Err(e.clone()),
    }
  }

  /// 已尝试加载（无论成功与否）的模型数量
  pub fn attempted(&self) -> usize {
    self.slots.len()
  }
}

/// 从本地目录加载 ONNX 权重
#[derive(Debug, Clone)]
pub struct WeightsLoader {
  model_dir: PathBuf,
}

impl WeightsLoader {
  pub fn new(model_dir: impl Into<PathBuf>) -> Self {
    Self {
      model_dir: model_dir.into(),
    }
  }

  pub fn weights_path(&self, kind: ModelKind) -> PathBuf {
    self.model_dir.join(kind.weights_file())
  }

  pub fn class_table(&self, kind: ModelKind) -> Result<ClassTable, ModelLoadError> {
    match kind.labels_file() {
      Some(file) => ClassTable::load(&self.model_dir.join(file)),
      None => Ok(ClassTable::coco()),
    }
  }
}

impl LoadDetector for WeightsLoader {
  fn load(&self, kind: ModelKind) -> Result<Box<dyn Detector>, ModelLoadError> {
    let weights = self.weights_path(kind);
    if !weights.is_file() {
      return Err(ModelLoadError::MissingWeights(weights));
    }
    let classes = self.class_table(kind)?;

    #[cfg(feature = "onnx")]
    {
      use crate::model::yolov8::{OnnxBackend, Yolov8};
      let backend = OnnxBackend::load(&weights)?;
      Ok(Box::new(Yolov8::new(backend, classes)))
    }
    #[cfg(not(feature = "onnx"))]
    {
      let _ = classes;
      Err(ModelLoadError::Unsupported(format!(
        "{}: 编译时未启用 onnx 特性",
        weights.display()
      )))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::ScanImage,
    model::{DetectError, DetectOutput, Thresholds},
  };
  use std::cell::Cell;

  struct Blank {
    classes: ClassTable,
  }

  impl Detector for Blank {
    fn detect(
      &mut self,
      image: &ScanImage,
      _thresholds: &Thresholds,
    ) -> Result<DetectOutput, DetectError> {
      Ok(DetectOutput {
        items: Box::new([]),
        annotated: image.as_rgb().clone(),
        latency_ms: 0.0,
      })
    }

    fn class_table(&self) -> &ClassTable {
      &self.classes
    }
  }

  /// 记录调用次数，Custom 模型总是加载失败
  #[derive(Default)]
  struct CountingLoader {
    calls: Cell<usize>,
  }

  impl LoadDetector for CountingLoader {
    fn load(&self, kind: ModelKind) -> Result<Box<dyn Detector>, ModelLoadError> {
      self.calls.set(self.calls.get() + 1);
      match kind {
        ModelKind::Custom => Err(ModelLoadError::MissingWeights(PathBuf::from("best.onnx"))),
        _ => Ok(Box::new(Blank {
          classes: ClassTable::coco(),
        })),
      }
    }
  }

  #[test]
  fn each_kind_is_loaded_once() {
    let mut registry = ModelRegistry::new(CountingLoader::default());
    for _ in 0..3 {
      assert!(registry.get(ModelKind::YoloV8Nano).is_ok());
    }
    assert_eq!(registry.loader.calls.get(), 1);

    assert!(registry.get(ModelKind::YoloV8Medium).is_ok());
    assert_eq!(registry.loader.calls.get(), 2);
    assert_eq!(registry.attempted(), 2);
  }

  #[test]
  fn load_failure_is_cached_and_not_retried() {
    let mut registry = ModelRegistry::new(CountingLoader::default());
    let first = registry.get(ModelKind::Custom).err().unwrap();
    let second = registry.get(ModelKind::Custom).err().unwrap();
    assert_eq!(first, second);
    assert_eq!(registry.loader.calls.get(), 1);
  }

  #[test]
  fn weights_loader_reports_missing_weights() {
    let dir = tempfile::tempdir().unwrap();
    let loader = WeightsLoader::new(dir.path());
    let err = loader.load(ModelKind::YoloV8Nano).err().unwrap();
    assert_eq!(
      err,
      ModelLoadError::MissingWeights(dir.path().join("yolov8n.onnx"))
    );
  }

  #[test]
  fn custom_model_requires_label_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("best.onnx"), b"not a real model").unwrap();
    let loader = WeightsLoader::new(dir.path());
    let err = loader.load(ModelKind::Custom).err().unwrap();
    assert_eq!(err, ModelLoadError::MissingLabels(dir.path().join("best.json")));
  }

  #[test]
  fn stock_models_use_coco_labels() {
    let loader = WeightsLoader::new("models");
    assert_eq!(loader.class_table(ModelKind::YoloV8Medium).unwrap().len(), 80);
  }
}
