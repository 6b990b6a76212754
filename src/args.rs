// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Parser;
use url::Url;

use mvision::{model::ModelKind, theme::Theme};

/// MVision 目标识别与任务报告
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///data/feed.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 模型: custom, nano, medium
  #[arg(long, default_value = "nano", value_name = "MODEL")]
  pub model: ModelKind,

  /// 模型权重所在目录
  #[arg(long, env = "MVISION_MODEL_DIR", default_value = ".", value_name = "DIR")]
  pub model_dir: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = mvision::model::DEFAULT_CONFIDENCE, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = mvision::model::DEFAULT_IOU, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 输出目录，例如 folder:///data/out
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 同时生成 PDF 任务报告
  #[arg(long)]
  pub report: bool,

  /// 主题: army, iaf
  #[arg(long, default_value = "army", value_name = "THEME")]
  pub theme: Theme,
}
