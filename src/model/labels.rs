// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/model/labels.rs - 类别表
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

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::model::ModelLoadError;

const COCO_LABELS: &str = include_str!("../../labels/coco.json");

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("JSON 解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("类别编号不是整数: {0:?}")]
  InvalidId(String),
}

/// 类别表文件支持数组（下标即类别编号）或 `{"0": "person"}` 形式的对象
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelFile {
  List(Vec<String>),
  Map(BTreeMap<String, String>),
}

/// 模型的类别编号到名称的映射
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassTable {
  names: BTreeMap<u32, String>,
}

impl ClassTable {
  pub fn coco() -> Self {
    // 内置文件在编译期固定，解析失败属于打包错误
    Self::from_json(COCO_LABELS).expect("内置 COCO 类别表无效")
  }

  pub fn from_json(text: &str) -> Result<Self, LabelError> {
    let file: LabelFile = serde_json::from_str(text)?;
    let names = match file {
      LabelFile::List(list) => list
        .into_iter()
        .enumerate()
        .map(|(id, name)| (id as u32, name))
        .collect(),
      LabelFile::Map(map) => map
        .into_iter()
        .map(|(id, name)| {
          id.trim()
            .parse::<u32>()
            .map(|id| (id, name))
            .map_err(|_| LabelError::InvalidId(id.clone()))
        })
        .collect::<Result<_, _>>()?,
    };
    Ok(Self { names })
  }

  pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
    if !path.exists() {
      return Err(ModelLoadError::MissingLabels(path.to_path_buf()));
    }
    let invalid = |reason: String| ModelLoadError::InvalidLabels {
      path: path.to_path_buf(),
      reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let table = Self::from_json(&text).map_err(|e| invalid(e.to_string()))?;
    if table.is_empty() {
      return Err(invalid("类别表为空".to_string()));
    }
    debug!("从 {} 加载 {} 个类别", path.display(), table.len());
    Ok(table)
  }

  pub fn get(&self, class_id: u32) -> Option<&str> {
    self.names.get(&class_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

impl<S: Into<String>> FromIterator<(u32, S)> for ClassTable {
  fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
    Self {
      names: iter.into_iter().map(|(id, name)| (id, name.into())).collect(),
    }
  }
}
