// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/input.rs - 图像输入
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

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

mod read_image_file;
pub use self::read_image_file::ImageFileInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch {
    expected: &'static str,
    found: String,
  },
  #[error("路径编码错误: {0}")]
  PathEncoding(#[from] std::string::FromUtf8Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法识别的图像格式")]
  UnknownFormat,
  #[error("不支持的图像格式: {0}")]
  UnsupportedFormat(String),
  #[error("图像解码错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("图像尺寸为空")]
  EmptyImage,
}

/// 将 `scheme://host/path` 形式的 URL 还原为本地路径，
/// 主机部分视为相对路径的第一段（例如 `image://./a.jpg`）
pub(crate) fn url_to_path(url: &Url) -> Result<PathBuf, std::string::FromUtf8Error> {
  let path = urlencoding::decode(url.path())?.into_owned();
  match url.host_str() {
    Some(host) if !host.is_empty() => Ok(PathBuf::from(format!("{}{}", host, path))),
    _ => Ok(PathBuf::from(path)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn absolute_path_without_host() {
    let url = Url::parse("image:///tmp/feed/frame.png").unwrap();
    assert_eq!(url_to_path(&url).unwrap(), PathBuf::from("/tmp/feed/frame.png"));
  }

  #[test]
  fn percent_encoded_spaces_are_decoded() {
    let url = Url::parse("image:///assets/Dassault%20Rafale.jpg").unwrap();
    assert_eq!(
      url_to_path(&url).unwrap(),
      PathBuf::from("/assets/Dassault Rafale.jpg")
    );
  }

  #[test]
  fn host_is_treated_as_relative_prefix() {
    let url = Url::parse("image://feed/frame.png").unwrap();
    assert_eq!(url_to_path(&url).unwrap(), PathBuf::from("feed/frame.png"));
  }
}
