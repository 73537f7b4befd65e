// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/bin/score_offline.rs - 离线重评分
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use shuofeng::annotations::CocoGroundTruth;
use shuofeng::record::load_predictions;
use shuofeng::scorer::{self, EvalParams};

/// 对已落盘的检测结果重新评分，不经过推理服务
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测结果（交换格式 JSON）路径
  #[arg(short = 'p', long, value_name = "FILE")]
  pub predictions: PathBuf,

  /// 标注文件路径
  #[arg(short = 'a', long, value_name = "FILE")]
  pub annotations: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测结果: {}", args.predictions.display());
  info!("标注文件: {}", args.annotations.display());

  let predictions = load_predictions(&args.predictions)
    .with_context(|| format!("无法加载检测结果 {}", args.predictions.display()))?;
  let ground_truth = CocoGroundTruth::load(&args.annotations)
    .with_context(|| format!("无法加载标注 {}", args.annotations.display()))?;

  // 评估图像集取标注中的全部图像，标注缺失时退回检测覆盖的图像
  let mut image_ids = ground_truth.image_ids();
  if image_ids.is_empty() {
    image_ids = predictions.iter().map(|record| record.image_id).collect();
  }
  info!("评估图像集: {} 张, 检测 {} 条", image_ids.len(), predictions.len());

  let summary = scorer::evaluate(
    &ground_truth,
    &predictions,
    &image_ids,
    &EvalParams::default(),
  )?;

  println!("{summary}");
  println!("{}", "=".repeat(60));
  println!("mAP@0.5:0.95: {:.3}", summary.map);
  println!("mAP@0.5:      {:.3}", summary.map50);
  println!("mAP@0.75:     {:.3}", summary.map75);
  println!("{}", "=".repeat(60));

  Ok(())
}
