// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use mvision::{
  FromUrl,
  input::ImageFileInput,
  model::{ModelRegistry, Thresholds, WeightsLoader},
  output::DirectoryOutput,
  task::ScanTask,
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  println!("MVision-AI");
  println!("{}", args.theme.subtitle());
  println!("==================");
  info!("模型: {}", args.model);
  info!("模型目录: {}", args.model_dir.display());
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let image = ImageFileInput::from_url(&args.input)?.into_image();
  let output = DirectoryOutput::from_url(&args.output)?;
  let thresholds = Thresholds::new(args.confidence, args.iou);

  let mut registry = ModelRegistry::new(WeightsLoader::new(&args.model_dir));
  let result = ScanTask::new().scan_with(
    &mut registry,
    args.model,
    &image,
    &thresholds,
    args.report,
  )?;

  println!();
  println!("检测目标数: {}", result.metrics.target_count);
  println!("平均置信度: {:.1}%", result.metrics.mean_confidence * 100.0);
  println!("推理延迟: {:.0} ms", result.metrics.inference_latency_ms);
  if result.records.is_empty() {
    println!("未检测到目标");
  } else {
    println!("目标清单:");
    for line in result.manifest_lines() {
      println!("  {}", line);
    }
  }

  let annotated = output.save_annotated(&result.annotated)?;
  println!("标注图像: {}", annotated.display());

  match result.report {
    Some(Ok(report)) => {
      let path = output.save_report(&report)?;
      println!("任务报告: {} ({})", path.display(), report.mime());
    }
    Some(Err(e)) => warn!("报告生成失败: {}", e),
    None if args.report => warn!("未检测到目标，未生成报告"),
    None => {}
  }

  println!();
  println!("参考资料 ({}):", args.theme);
  for asset in args.theme.intel_assets() {
    println!("  {} [{}]", asset.caption, asset.image_file);
  }

  Ok(())
}
