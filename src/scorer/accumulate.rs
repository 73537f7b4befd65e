// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/scorer/accumulate.rs - 精度累积与积分
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

use std::cmp::Ordering;

use crate::scorer::EvalParams;
use crate::scorer::matching::ImageEval;

/// 累积结果。precision 按 [阈值][召回点][类别][面积][检测上限] 展平，
/// recall 按 [阈值][类别][面积][检测上限] 展平；-1 表示该桶没有标注。
#[derive(Debug)]
pub(crate) struct Accumulated {
  pub precision: Vec<f64>,
  pub recall: Vec<f64>,
  num_thresholds: usize,
  num_recall_points: usize,
  num_categories: usize,
  num_areas: usize,
  num_max_dets: usize,
}

impl Accumulated {
  pub fn precision_idx(&self, t: usize, r: usize, k: usize, a: usize, m: usize) -> usize {
    (((t * self.num_recall_points + r) * self.num_categories + k) * self.num_areas + a)
      * self.num_max_dets
      + m
  }

  pub fn recall_idx(&self, t: usize, k: usize, a: usize, m: usize) -> usize {
    ((t * self.num_categories + k) * self.num_areas + a) * self.num_max_dets + m
  }
}

/// 把逐图匹配结果累积为各桶的查准/查全曲线。
/// `eval_imgs` 按 [类别][面积][图像] 展平，与 `Evaluator` 的排布一致。
pub(crate) fn accumulate(
  eval_imgs: &[Option<ImageEval>],
  params: &EvalParams,
  num_images: usize,
  num_categories: usize,
) -> Accumulated {
  let num_thresholds = params.iou_thresholds.len();
  let num_recall_points = params.recall_thresholds.len();
  let num_areas = params.area_ranges.len();
  let num_max_dets = params.max_detections.len();

  let mut acc = Accumulated {
    precision: vec![-1.0; num_thresholds * num_recall_points * num_categories * num_areas * num_max_dets],
    recall: vec![-1.0; num_thresholds * num_categories * num_areas * num_max_dets],
    num_thresholds,
    num_recall_points,
    num_categories,
    num_areas,
    num_max_dets,
  };

  for k in 0..num_categories {
    for a in 0..num_areas {
      for (m, &max_det) in params.max_detections.iter().enumerate() {
        // 汇总该桶内所有图像的检测，每张图最多取 max_det 个
        let mut scores: Vec<f64> = Vec::new();
        let mut matched: Vec<Vec<bool>> = vec![Vec::new(); num_thresholds];
        let mut ignored: Vec<Vec<bool>> = vec![Vec::new(); num_thresholds];
        let mut gt_total = 0usize;

        for i in 0..num_images {
          let Some(eval) = &eval_imgs[(k * num_areas + a) * num_images + i] else {
            continue;
          };
          let take = eval.dt_scores.len().min(max_det);
          scores.extend_from_slice(&eval.dt_scores[..take]);
          for t in 0..num_thresholds {
            matched[t].extend_from_slice(&eval.dt_matched[t][..take]);
            ignored[t].extend_from_slice(&eval.dt_ignored[t][..take]);
          }
          gt_total += eval.gt_count;
        }

        // 没有标注的桶不参与任何均值
        if gt_total == 0 {
          continue;
        }

        // 全桶范围内按置信度降序，图像间的并列保持拼接顺序
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&x, &y| scores[y].partial_cmp(&scores[x]).unwrap_or(Ordering::Equal));
        let num_dt = order.len();

        for t in 0..num_thresholds {
          let mut tp = 0.0f64;
          let mut fp = 0.0f64;
          let mut recall_curve = Vec::with_capacity(num_dt);
          let mut precision_curve = Vec::with_capacity(num_dt);

          for &idx in &order {
            if !ignored[t][idx] {
              if matched[t][idx] {
                tp += 1.0;
              } else {
                fp += 1.0;
              }
            }
            recall_curve.push(tp / gt_total as f64);
            precision_curve.push(if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 });
          }

          let recall_idx = acc.recall_idx(t, k, a, m);
          acc.recall[recall_idx] =
            recall_curve.last().copied().unwrap_or(0.0);

          // 查准包络：每个点替换为等于或更高召回处的最大查准率
          for d in (0..num_dt.saturating_sub(1)).rev() {
            precision_curve[d] = precision_curve[d].max(precision_curve[d + 1]);
          }

          // 101 点插值采样，超出最大召回的采样点取 0
          let mut cursor = 0usize;
          for (r, &recall_point) in params.recall_thresholds.iter().enumerate() {
            while cursor < num_dt && recall_curve[cursor] < recall_point {
              cursor += 1;
            }
            let idx = acc.precision_idx(t, r, k, a, m);
            acc.precision[idx] = if cursor < num_dt {
              precision_curve[cursor]
            } else {
              0.0
            };
          }
        }
      }
    }
  }

  acc
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params() -> EvalParams {
    EvalParams {
      iou_thresholds: vec![0.5],
      max_detections: vec![100],
      area_ranges: vec![[0.0, 1e10]],
      area_labels: vec!["all"],
      ..EvalParams::default()
    }
  }

  fn eval(scores: &[f64], matched: &[bool], gt_count: usize) -> ImageEval {
    ImageEval {
      dt_scores: scores.to_vec(),
      dt_matched: vec![matched.to_vec()],
      dt_ignored: vec![vec![false; matched.len()]],
      gt_count,
    }
  }

  #[test]
  fn perfect_bucket_reaches_full_precision() {
    let imgs = vec![Some(eval(&[0.9], &[true], 1))];
    let acc = accumulate(&imgs, &params(), 1, 1);

    for r in 0..101 {
      let p = acc.precision[acc.precision_idx(0, r, 0, 0, 0)];
      assert_eq!(p, 1.0, "召回点 {r} 的查准率应为 1.0");
    }
    assert_eq!(acc.recall[acc.recall_idx(0, 0, 0, 0)], 1.0);
  }

  #[test]
  fn no_detections_gives_zero_precision() {
    let imgs = vec![Some(eval(&[], &[], 2))];
    let acc = accumulate(&imgs, &params(), 1, 1);

    for r in 0..101 {
      assert_eq!(acc.precision[acc.precision_idx(0, r, 0, 0, 0)], 0.0);
    }
    assert_eq!(acc.recall[acc.recall_idx(0, 0, 0, 0)], 0.0);
  }

  #[test]
  fn bucket_without_ground_truth_is_excluded() {
    let imgs = vec![Some(eval(&[0.9], &[false], 0))];
    let acc = accumulate(&imgs, &params(), 1, 1);

    for r in 0..101 {
      assert_eq!(acc.precision[acc.precision_idx(0, r, 0, 0, 0)], -1.0);
    }
    assert_eq!(acc.recall[acc.recall_idx(0, 0, 0, 0)], -1.0);
  }

  #[test]
  fn precision_envelope_removes_sawtooth() {
    // TP, FP, TP：原始查准率 1, 1/2, 2/3，包络后为 1, 2/3, 2/3
    let imgs = vec![Some(eval(&[0.9, 0.8, 0.7], &[true, false, true], 2))];
    let acc = accumulate(&imgs, &params(), 1, 1);

    // 召回 0.5 及以内包络保持 1.0，之后回落到 2/3
    let halfway = acc.precision[acc.precision_idx(0, 50, 0, 0, 0)];
    assert!((halfway - 1.0).abs() < 1e-9);
    let full = acc.precision[acc.precision_idx(0, 100, 0, 0, 0)];
    assert!((full - 2.0 / 3.0).abs() < 1e-9);
  }

  #[test]
  fn ignored_detections_are_neither_tp_nor_fp() {
    let mut img = eval(&[0.9, 0.8], &[true, true], 1);
    img.dt_ignored = vec![vec![false, true]];
    let imgs = vec![Some(img)];
    let acc = accumulate(&imgs, &params(), 1, 1);

    // 第二个检测被忽略，查准率保持 1.0
    for r in 0..101 {
      assert_eq!(acc.precision[acc.precision_idx(0, r, 0, 0, 0)], 1.0);
    }
  }
}
