// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/scorer/matching.rs - 逐图贪心匹配
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

/// 一条参与匹配的标注，bbox 为 [x, y, w, h]
#[derive(Debug, Clone)]
pub(crate) struct GtEntry {
  pub bbox: [f64; 4],
  pub area: f64,
  pub crowd: bool,
}

/// 一条参与匹配的检测，bbox 为 [x, y, w, h]
#[derive(Debug, Clone)]
pub(crate) struct DtEntry {
  pub bbox: [f64; 4],
  pub score: f64,
}

/// 一张图像在单个（类别 × 面积范围）桶内的匹配结果
#[derive(Debug, Clone)]
pub(crate) struct ImageEval {
  /// 按置信度降序排列的检测分数
  pub dt_scores: Vec<f64>,
  /// [阈值][检测] 是否匹配到了标注（含忽略标注）
  pub dt_matched: Vec<Vec<bool>>,
  /// [阈值][检测] 是否被排除在统计之外
  pub dt_ignored: Vec<Vec<bool>>,
  /// 非忽略标注数，即召回分母
  pub gt_count: usize,
}

/// 轴对齐框的交并比。
/// 人群标注的分母取检测框面积，使人群区域吸收检测而不放大并集；
/// 零面积的框与任何框的交并比都是 0。
pub(crate) fn bbox_iou(dt: &[f64; 4], gt: &[f64; 4], crowd: bool) -> f64 {
  let ix1 = dt[0].max(gt[0]);
  let iy1 = dt[1].max(gt[1]);
  let ix2 = (dt[0] + dt[2]).min(gt[0] + gt[2]);
  let iy2 = (dt[1] + dt[3]).min(gt[1] + gt[3]);

  let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
  let dt_area = dt[2] * dt[3];
  let gt_area = gt[2] * gt[3];
  let union = if crowd {
    dt_area
  } else {
    dt_area + gt_area - intersection
  };

  if union > 0.0 { intersection / union } else { 0.0 }
}

/// 在一张图像的单个桶内做贪心匹配。
///
/// 检测按置信度降序处理（相同分数保持输入顺序），在每个阈值下
/// 独立地选取交并比最大的未匹配标注；人群标注可以被重复匹配但
/// 不计入召回，匹配到忽略标注的检测既不算 TP 也不算 FP。
pub(crate) fn evaluate_image(
  gts: &[GtEntry],
  dts: &[DtEntry],
  iou_thresholds: &[f64],
  area_range: [f64; 2],
  max_det: usize,
) -> Option<ImageEval> {
  if gts.is_empty() && dts.is_empty() {
    return None;
  }

  let ignore_base: Vec<bool> = gts
    .iter()
    .map(|gt| gt.crowd || gt.area < area_range[0] || gt.area > area_range[1])
    .collect();

  // 非忽略标注排在前面，排序稳定
  let mut gt_order: Vec<usize> = (0..gts.len()).collect();
  gt_order.sort_by_key(|&i| ignore_base[i]);

  // 置信度降序，分数相同保持输入顺序（sort_by 是稳定排序）
  let mut dt_order: Vec<usize> = (0..dts.len()).collect();
  dt_order.sort_by(|&a, &b| {
    dts[b]
      .score
      .partial_cmp(&dts[a].score)
      .unwrap_or(Ordering::Equal)
  });
  dt_order.truncate(max_det);

  let gt_ignored: Vec<bool> = gt_order.iter().map(|&i| ignore_base[i]).collect();
  let gt_crowd: Vec<bool> = gt_order.iter().map(|&i| gts[i].crowd).collect();

  let num_thresholds = iou_thresholds.len();
  let num_dt = dt_order.len();
  let num_gt = gt_order.len();

  let ious: Vec<Vec<f64>> = dt_order
    .iter()
    .map(|&di| {
      gt_order
        .iter()
        .map(|&gi| bbox_iou(&dts[di].bbox, &gts[gi].bbox, gts[gi].crowd))
        .collect()
    })
    .collect();

  let mut dt_matched = vec![vec![false; num_dt]; num_thresholds];
  let mut dt_ignored = vec![vec![false; num_dt]; num_thresholds];
  let mut gt_matched = vec![vec![false; num_gt]; num_thresholds];

  for (ti, &threshold) in iou_thresholds.iter().enumerate() {
    for di in 0..num_dt {
      let mut best = threshold.min(1.0 - 1e-10);
      let mut matched: Option<usize> = None;

      for gi in 0..num_gt {
        // 已被占用的非人群标注不再参与，人群标注可重复匹配
        if gt_matched[ti][gi] && !gt_crowd[gi] {
          continue;
        }
        // 已有非忽略匹配时走到忽略标注即可停止（忽略标注在队尾）
        if let Some(m) = matched {
          if !gt_ignored[m] && gt_ignored[gi] {
            break;
          }
        }
        if ious[di][gi] < best {
          continue;
        }
        best = ious[di][gi];
        matched = Some(gi);
      }

      if let Some(m) = matched {
        gt_matched[ti][m] = true;
        dt_matched[ti][di] = true;
        dt_ignored[ti][di] = gt_ignored[m];
      }
    }

    // 未匹配且面积在范围之外的检测不参与统计
    for di in 0..num_dt {
      if !dt_matched[ti][di] {
        let bbox = &dts[dt_order[di]].bbox;
        let area = bbox[2] * bbox[3];
        if area < area_range[0] || area > area_range[1] {
          dt_ignored[ti][di] = true;
        }
      }
    }
  }

  Some(ImageEval {
    dt_scores: dt_order.iter().map(|&i| dts[i].score).collect(),
    dt_matched,
    dt_ignored,
    gt_count: gt_ignored.iter().filter(|&&ignored| !ignored).count(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL_AREAS: [f64; 2] = [0.0, 1e10];

  fn gt(bbox: [f64; 4]) -> GtEntry {
    GtEntry {
      area: bbox[2] * bbox[3],
      bbox,
      crowd: false,
    }
  }

  fn dt(bbox: [f64; 4], score: f64) -> DtEntry {
    DtEntry { bbox, score }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = [10.0, 10.0, 40.0, 40.0];
    assert_eq!(bbox_iou(&a, &a, false), 1.0);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = [0.0, 0.0, 10.0, 10.0];
    let b = [100.0, 100.0, 10.0, 10.0];
    assert_eq!(bbox_iou(&a, &b, false), 0.0);
  }

  #[test]
  fn iou_is_symmetric() {
    let a = [0.0, 0.0, 20.0, 20.0];
    let b = [10.0, 10.0, 20.0, 20.0];
    assert_eq!(bbox_iou(&a, &b, false), bbox_iou(&b, &a, false));
  }

  #[test]
  fn iou_guards_zero_area() {
    let degenerate = [10.0, 10.0, 0.0, 0.0];
    let b = [0.0, 0.0, 20.0, 20.0];
    assert_eq!(bbox_iou(&degenerate, &b, false), 0.0);
    assert_eq!(bbox_iou(&b, &degenerate, false), 0.0);
    assert_eq!(bbox_iou(&degenerate, &degenerate, false), 0.0);
  }

  #[test]
  fn exact_match_is_true_positive_at_every_threshold() {
    let gts = [gt([10.0, 10.0, 40.0, 40.0])];
    let dts = [dt([10.0, 10.0, 40.0, 40.0], 1.0)];
    let thresholds: Vec<f64> = (0..10).map(|i| 0.5 + 0.05 * i as f64).collect();

    let eval = evaluate_image(&gts, &dts, &thresholds, ALL_AREAS, 100).unwrap();
    assert_eq!(eval.gt_count, 1);
    for ti in 0..thresholds.len() {
      assert!(eval.dt_matched[ti][0]);
      assert!(!eval.dt_ignored[ti][0]);
    }
  }

  #[test]
  fn best_iou_candidate_wins() {
    // 两个标注，检测与第二个重合
    let gts = [gt([0.0, 0.0, 40.0, 40.0]), gt([100.0, 100.0, 40.0, 40.0])];
    let dts = [dt([100.0, 100.0, 40.0, 40.0], 0.9)];

    let eval = evaluate_image(&gts, &dts, &[0.5], ALL_AREAS, 100).unwrap();
    assert!(eval.dt_matched[0][0]);
    assert_eq!(eval.gt_count, 2);
  }

  #[test]
  fn matched_ground_truth_is_not_reused() {
    let gts = [gt([10.0, 10.0, 40.0, 40.0])];
    let dts = [
      dt([10.0, 10.0, 40.0, 40.0], 0.9),
      dt([10.0, 10.0, 40.0, 40.0], 0.8),
    ];

    let eval = evaluate_image(&gts, &dts, &[0.5], ALL_AREAS, 100).unwrap();
    assert!(eval.dt_matched[0][0]);
    // 第二个检测找不到未占用的标注，成为 FP
    assert!(!eval.dt_matched[0][1]);
    assert!(!eval.dt_ignored[0][1]);
  }

  #[test]
  fn crowd_absorbs_multiple_detections_without_counting() {
    let gts = [GtEntry {
      bbox: [0.0, 0.0, 100.0, 100.0],
      area: 10000.0,
      crowd: true,
    }];
    let dts = [
      dt([10.0, 10.0, 30.0, 30.0], 0.9),
      dt([50.0, 50.0, 30.0, 30.0], 0.8),
    ];

    let eval = evaluate_image(&gts, &dts, &[0.5], ALL_AREAS, 100).unwrap();
    // 人群标注不计入召回分母
    assert_eq!(eval.gt_count, 0);
    // 两个检测都匹配到了人群标注，都被排除在统计之外
    for di in 0..2 {
      assert!(eval.dt_matched[0][di]);
      assert!(eval.dt_ignored[0][di]);
    }
  }

  #[test]
  fn equal_scores_keep_input_order() {
    let gts = [gt([10.0, 10.0, 40.0, 40.0])];
    let dts = [
      dt([0.0, 0.0, 5.0, 5.0], 0.7),
      dt([10.0, 10.0, 40.0, 40.0], 0.7),
    ];

    let eval = evaluate_image(&gts, &dts, &[0.5], ALL_AREAS, 100).unwrap();
    // 稳定排序下第一个检测仍排在前面，且它不与标注重合
    assert_eq!(eval.dt_scores, vec![0.7, 0.7]);
    assert!(!eval.dt_matched[0][0]);
    assert!(eval.dt_matched[0][1]);
  }

  #[test]
  fn max_det_truncates_low_scores() {
    let gts = [gt([10.0, 10.0, 40.0, 40.0])];
    let dts = [
      dt([200.0, 200.0, 10.0, 10.0], 0.9),
      dt([10.0, 10.0, 40.0, 40.0], 0.3),
    ];

    let eval = evaluate_image(&gts, &dts, &[0.5], ALL_AREAS, 1).unwrap();
    assert_eq!(eval.dt_scores.len(), 1);
    assert!(!eval.dt_matched[0][0]);
  }

  #[test]
  fn out_of_range_ground_truth_is_ignored() {
    // 小目标范围内评估大标注：标注被忽略，匹配它的检测也被排除
    let gts = [gt([0.0, 0.0, 100.0, 100.0])];
    let dts = [dt([0.0, 0.0, 100.0, 100.0], 0.9)];
    let small = [0.0, 32.0 * 32.0];

    let eval = evaluate_image(&gts, &dts, &[0.5], small, 100).unwrap();
    assert_eq!(eval.gt_count, 0);
    assert!(eval.dt_matched[0][0]);
    assert!(eval.dt_ignored[0][0]);
  }

  #[test]
  fn empty_bucket_yields_none() {
    assert!(evaluate_image(&[], &[], &[0.5], ALL_AREAS, 100).is_none());
  }
}
