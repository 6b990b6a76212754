// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/output/directory.rs - 目录输出
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

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use image::RgbImage;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::url_to_path,
  output::{OutputError, Report},
};

/// 将标注图像和报告保存到同一目录，目录不存在时自动创建
#[derive(Debug, Clone)]
pub struct DirectoryOutput {
  directory: PathBuf,
}

impl FromUrlWithScheme for DirectoryOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }
    Ok(Self::new(url_to_path(url)?))
  }
}

impl DirectoryOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn ensure_directory(&self) -> Result<(), OutputError> {
    if !self.directory.as_os_str().is_empty() && !self.directory.exists() {
      std::fs::create_dir_all(&self.directory)?;
    }
    Ok(())
  }

  pub fn save_annotated(&self, image: &RgbImage) -> Result<PathBuf, OutputError> {
    self.save_annotated_at(image, Local::now().naive_local())
  }

  pub fn save_annotated_at(
    &self,
    image: &RgbImage,
    at: NaiveDateTime,
  ) -> Result<PathBuf, OutputError> {
    self.ensure_directory()?;
    let path = self
      .directory
      .join(format!("annotated_{}.png", at.format("%H%M%S")));
    image.save(&path)?;
    info!("保存标注图像到文件: {}", path.display());
    Ok(path)
  }

  pub fn save_report(&self, report: &Report) -> Result<PathBuf, OutputError> {
    self.ensure_directory()?;
    let path = self.directory.join(&report.file_name);
    std::fs::write(&path, &report.bytes)?;
    info!("保存报告到文件: {} ({} 页)", path.display(), report.page_count);
    Ok(path)
  }
}
