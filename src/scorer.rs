// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/scorer.rs - COCO 风格评估器
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

mod accumulate;
mod matching;

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::annotations::CocoGroundTruth;
use crate::record::PredictionRecord;
use accumulate::Accumulated;
use matching::{DtEntry, GtEntry};

/// 评估参数。默认值即 COCO 检测协议：
/// 交并比阶梯 0.50..0.95（步长 0.05）、101 个召回采样点、
/// all/small/medium/large 四个面积档与 1/10/100 三个检测上限。
#[derive(Debug, Clone)]
pub struct EvalParams {
  pub iou_thresholds: Vec<f64>,
  pub recall_thresholds: Vec<f64>,
  pub max_detections: Vec<usize>,
  pub area_ranges: Vec<[f64; 2]>,
  pub area_labels: Vec<&'static str>,
}

impl Default for EvalParams {
  fn default() -> Self {
    Self {
      iou_thresholds: (0..10).map(|i| 0.5 + 0.05 * i as f64).collect(),
      recall_thresholds: (0..=100).map(|i| i as f64 / 100.0).collect(),
      max_detections: vec![1, 10, 100],
      area_ranges: vec![
        [0.0, 1e10],
        [0.0, 32.0 * 32.0],
        [32.0 * 32.0, 96.0 * 96.0],
        [96.0 * 96.0, 1e10],
      ],
      area_labels: vec!["all", "small", "medium", "large"],
    }
  }
}

impl EvalParams {
  fn threshold_index(&self, threshold: f64) -> Option<usize> {
    self
      .iou_thresholds
      .iter()
      .position(|&t| (t - threshold).abs() < 1e-9)
  }

  fn area_index(&self, label: &str) -> Option<usize> {
    self.area_labels.iter().position(|&l| l == label)
  }

  fn max_det_index(&self, max_det: usize) -> Option<usize> {
    self.max_detections.iter().position(|&m| m == max_det)
  }
}

#[derive(Error, Debug)]
pub enum ScoringError {
  #[error("没有可评估的数据: 评估图像集内检测与标注均为空")]
  NoData,
}

/// 汇总指标。未定义的项（对应桶没有任何标注）取 -1。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStats {
  pub map: f64,
  pub map50: f64,
  pub map75: f64,
  pub map_small: f64,
  pub map_medium: f64,
  pub map_large: f64,
  pub ar_max1: f64,
  pub ar_max10: f64,
  pub ar_max100: f64,
  pub ar_small: f64,
  pub ar_medium: f64,
  pub ar_large: f64,
}

impl fmt::Display for SummaryStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let row = |metric: &str, short: &str, iou: &str, area: &str, dets: &str, value: f64| {
      format!(
        " {metric} ({short}) @[ IoU={iou:<9} | area={area:>6} | maxDets={dets:>3} ] = {value:.3}"
      )
    };
    writeln!(f, "{}", row("Average Precision ", "AP", "0.50:0.95", "all", "100", self.map))?;
    writeln!(f, "{}", row("Average Precision ", "AP", "0.50", "all", "100", self.map50))?;
    writeln!(f, "{}", row("Average Precision ", "AP", "0.75", "all", "100", self.map75))?;
    writeln!(f, "{}", row("Average Precision ", "AP", "0.50:0.95", "small", "100", self.map_small))?;
    writeln!(f, "{}", row("Average Precision ", "AP", "0.50:0.95", "medium", "100", self.map_medium))?;
    writeln!(f, "{}", row("Average Precision ", "AP", "0.50:0.95", "large", "100", self.map_large))?;
    writeln!(f, "{}", row("Average Recall    ", "AR", "0.50:0.95", "all", "1", self.ar_max1))?;
    writeln!(f, "{}", row("Average Recall    ", "AR", "0.50:0.95", "all", "10", self.ar_max10))?;
    writeln!(f, "{}", row("Average Recall    ", "AR", "0.50:0.95", "all", "100", self.ar_max100))?;
    writeln!(f, "{}", row("Average Recall    ", "AR", "0.50:0.95", "small", "100", self.ar_small))?;
    writeln!(f, "{}", row("Average Recall    ", "AR", "0.50:0.95", "medium", "100", self.ar_medium))?;
    write!(f, "{}", row("Average Recall    ", "AR", "0.50:0.95", "large", "100", self.ar_large))
  }
}

/// 对一个评估图像集计算汇总指标。
/// 纯函数：输入为只读的标注与检测快照，输出只由输入决定。
pub fn evaluate(
  ground_truth: &CocoGroundTruth,
  predictions: &[PredictionRecord],
  image_ids: &[i64],
  params: &EvalParams,
) -> Result<SummaryStats, ScoringError> {
  let mut images: Vec<i64> = image_ids.to_vec();
  images.sort_unstable();
  images.dedup();
  let image_set: HashSet<i64> = images.iter().copied().collect();

  let categories = ground_truth.category_ids();

  // 按（图像 × 类别）归类，保持输入顺序以保证并列分数的确定性
  let mut gt_index: HashMap<(i64, u32), Vec<GtEntry>> = HashMap::new();
  let mut gt_total = 0usize;
  for ann in &ground_truth.annotations {
    if !image_set.contains(&ann.image_id) {
      continue;
    }
    gt_index
      .entry((ann.image_id, ann.category_id))
      .or_default()
      .push(GtEntry {
        bbox: ann.bbox,
        area: ann.area_or_bbox(),
        crowd: ann.is_crowd(),
      });
    gt_total += 1;
  }

  let mut dt_index: HashMap<(i64, u32), Vec<DtEntry>> = HashMap::new();
  let mut dt_total = 0usize;
  for prediction in predictions {
    if !image_set.contains(&prediction.image_id) {
      continue;
    }
    dt_index
      .entry((prediction.image_id, prediction.category_id))
      .or_default()
      .push(DtEntry {
        bbox: prediction.bbox,
        score: prediction.score as f64,
      });
    dt_total += 1;
  }

  if gt_total == 0 && dt_total == 0 {
    return Err(ScoringError::NoData);
  }
  debug!(
    "评估 {} 张图像, {} 个类别, {} 条标注, {} 个检测",
    images.len(),
    categories.len(),
    gt_total,
    dt_total
  );

  // 逐（类别 × 面积 × 图像）匹配；桶之间互不依赖
  let final_max_det = params.max_detections.last().copied().unwrap_or(100);
  let num_areas = params.area_ranges.len();
  let mut eval_imgs = Vec::with_capacity(categories.len() * num_areas * images.len());

  for &category_id in &categories {
    for &area_range in &params.area_ranges {
      for &image_id in &images {
        let gts = gt_index
          .get(&(image_id, category_id))
          .map(Vec::as_slice)
          .unwrap_or(&[]);
        let dts = dt_index
          .get(&(image_id, category_id))
          .map(Vec::as_slice)
          .unwrap_or(&[]);
        eval_imgs.push(matching::evaluate_image(
          gts,
          dts,
          &params.iou_thresholds,
          area_range,
          final_max_det,
        ));
      }
    }
  }

  let accumulated = accumulate::accumulate(&eval_imgs, params, images.len(), categories.len());
  Ok(summarize(&accumulated, params))
}

fn summarize(accumulated: &Accumulated, params: &EvalParams) -> SummaryStats {
  let ap = |iou: Option<f64>, area: &str, max_det: usize| {
    mean_precision(accumulated, params, iou, area, max_det)
  };
  let ar = |area: &str, max_det: usize| mean_recall(accumulated, params, area, max_det);
  let top_det = params.max_detections.last().copied().unwrap_or(100);

  SummaryStats {
    map: ap(None, "all", top_det),
    map50: ap(Some(0.5), "all", top_det),
    map75: ap(Some(0.75), "all", top_det),
    map_small: ap(None, "small", top_det),
    map_medium: ap(None, "medium", top_det),
    map_large: ap(None, "large", top_det),
    ar_max1: ar("all", *params.max_detections.first().unwrap_or(&1)),
    ar_max10: ar("all", params.max_detections.get(1).copied().unwrap_or(10)),
    ar_max100: ar("all", top_det),
    ar_small: ar("small", top_det),
    ar_medium: ar("medium", top_det),
    ar_large: ar("large", top_det),
  }
}

/// 对给定（阈值选择 × 面积档 × 检测上限）求有效查准率均值；
/// 没有任何有效桶时为 -1
fn mean_precision(
  accumulated: &Accumulated,
  params: &EvalParams,
  iou: Option<f64>,
  area_label: &str,
  max_det: usize,
) -> f64 {
  let Some(a) = params.area_index(area_label) else {
    return -1.0;
  };
  let Some(m) = params.max_det_index(max_det) else {
    return -1.0;
  };
  let thresholds: Vec<usize> = match iou {
    Some(threshold) => match params.threshold_index(threshold) {
      Some(t) => vec![t],
      None => return -1.0,
    },
    None => (0..params.iou_thresholds.len()).collect(),
  };

  let mut total = 0.0;
  let mut count = 0usize;
  for &t in &thresholds {
    for r in 0..params.recall_thresholds.len() {
      for k in 0..num_categories(accumulated, params) {
        let value = accumulated.precision[accumulated.precision_idx(t, r, k, a, m)];
        if value >= 0.0 {
          total += value;
          count += 1;
        }
      }
    }
  }

  if count == 0 { -1.0 } else { total / count as f64 }
}

fn mean_recall(
  accumulated: &Accumulated,
  params: &EvalParams,
  area_label: &str,
  max_det: usize,
) -> f64 {
  let Some(a) = params.area_index(area_label) else {
    return -1.0;
  };
  let Some(m) = params.max_det_index(max_det) else {
    return -1.0;
  };

  let mut total = 0.0;
  let mut count = 0usize;
  for t in 0..params.iou_thresholds.len() {
    for k in 0..num_categories(accumulated, params) {
      let value = accumulated.recall[accumulated.recall_idx(t, k, a, m)];
      if value >= 0.0 {
        total += value;
        count += 1;
      }
    }
  }

  if count == 0 { -1.0 } else { total / count as f64 }
}

fn num_categories(accumulated: &Accumulated, params: &EvalParams) -> usize {
  let per_category =
    params.iou_thresholds.len() * params.area_ranges.len() * params.max_detections.len();
  if per_category == 0 {
    0
  } else {
    accumulated.recall.len() / per_category
  }
}
