// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
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
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

mod args;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use image::ImageReader;
use indicatif::ProgressBar;
use tracing::info;
use url::Url;

use shuofeng::annotations::CocoGroundTruth;
use shuofeng::backend::{BackendOptions, InferenceBackend, create_backend};
use shuofeng::category::CategoryMap;
use shuofeng::dataset::{DatasetManifest, image_id_from_path};
use shuofeng::decoder::DetectionDecoder;
use shuofeng::letterbox::Letterbox;
use shuofeng::record::{DetectionAggregator, ImageRecord, save_predictions};
use shuofeng::scorer::{self, EvalParams};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("数据集描述: {}", args.data.display());
  info!("推理模型: {}", args.model);
  info!("推理服务: {}", args.url);

  // 数据集清单与类别映射
  let manifest = DatasetManifest::load(&args.data)
    .with_context(|| format!("无法加载数据集描述 {}", args.data.display()))?;
  let categories = CategoryMap::coco80_to_coco91();
  manifest.validate_class_count(categories.len())?;
  let images = manifest.val_images().context("验证集图像列表不完整")?;
  info!("待评估图像: {} 张", images.len());

  // 连接推理服务并完成健康检查
  let url = Url::parse(&args.url).context("推理服务地址无法解析")?;
  let mut backend = create_backend(
    &url,
    BackendOptions {
      model: args.model.clone(),
      input_width: args.width,
      input_height: args.height,
      timeout: args.client_timeout.map(Duration::from_secs_f64),
    },
  )?;
  backend.ensure_ready().context("推理服务健康检查失败")?;
  info!("推理服务健康检查通过");

  let letterbox = Letterbox::new(args.width, args.height);
  let decoder = DetectionDecoder::new(letterbox, categories);
  let mut aggregator = DetectionAggregator::new();

  // 逐图推理。任何一张图像解码或聚合失败都会终止整次评估：
  // 单张图像的畸形输出会使数据集级指标失去意义
  let progress = ProgressBar::new(images.len() as u64);
  for path in &images {
    let image_id = image_id_from_path(path)?;
    let image = ImageReader::open(path)
      .with_context(|| format!("无法打开图像 {}", path.display()))?
      .decode()
      .with_context(|| format!("无法解码图像 {}", path.display()))?
      .into_rgb8();
    let (src_w, src_h) = image.dimensions();

    let tensor = letterbox.preprocess(&image);
    let raw = backend
      .infer(&tensor)
      .with_context(|| format!("图像 {} 推理失败", path.display()))?;
    let detections = decoder
      .decode(&raw, src_w, src_h)
      .with_context(|| format!("图像 {} 的输出无法解码", path.display()))?;

    aggregator.push(ImageRecord {
      image_id,
      detections,
    })?;
    progress.inc(1);
  }
  progress.finish_and_clear();
  info!(
    "推理完成: {} 张图像, {} 个检测",
    aggregator.image_count(),
    aggregator.detection_count()
  );

  // 先落盘交换格式，再进入评分阶段
  let interchange = aggregator.to_interchange();
  save_predictions(&args.predictions, &interchange)
    .with_context(|| format!("无法写入检测结果 {}", args.predictions.display()))?;
  info!("检测结果已写入 {}", args.predictions.display());

  let annotations_path = args
    .annotations
    .clone()
    .unwrap_or_else(|| manifest.default_annotations());
  let ground_truth = CocoGroundTruth::load(&annotations_path)
    .with_context(|| format!("无法加载标注 {}", annotations_path.display()))?;

  let image_ids = aggregator.image_ids();
  let summary = scorer::evaluate(
    &ground_truth,
    &interchange,
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
