// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// tests/pipeline.rs - 端到端管线测试（内存后端，零网络依赖）
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

use std::collections::VecDeque;

use image::RgbImage;

use shuofeng::annotations::CocoGroundTruth;
use shuofeng::backend::{BackendError, InferenceBackend, RawDetections};
use shuofeng::category::CategoryMap;
use shuofeng::decoder::DetectionDecoder;
use shuofeng::letterbox::Letterbox;
use shuofeng::record::{DetectionAggregator, ImageRecord, load_predictions, save_predictions};
use shuofeng::scorer::{self, EvalParams};

/// 回放预置响应的内存后端
struct FakeBackend {
  responses: VecDeque<RawDetections>,
}

impl InferenceBackend for FakeBackend {
  fn ensure_ready(&mut self) -> Result<(), BackendError> {
    Ok(())
  }

  fn infer(&mut self, _tensor: &[f32]) -> Result<RawDetections, BackendError> {
    self
      .responses
      .pop_front()
      .ok_or(BackendError::Inference("没有预置响应".to_string()))
  }
}

const GROUND_TRUTH: &str = r#"{
  "images": [
    {"id": 1, "file_name": "000000000001.jpg", "width": 640, "height": 480},
    {"id": 2, "file_name": "000000000002.jpg", "width": 640, "height": 480}
  ],
  "annotations": [
    {"id": 1, "image_id": 1, "category_id": 1, "bbox": [10.0, 10.0, 40.0, 40.0], "area": 1600.0, "iscrowd": 0}
  ],
  "categories": [{"id": 1, "name": "person"}]
}"#;

/// 画布上的检测响应：一条与标注重合的检测加上三个填充槽位。
/// 640x480 的原图在 640x640 画布里上下各留 80 像素填充，
/// 原图角点 (10,10)-(50,50) 对应画布 (10,90)-(50,130)。
fn hit_response() -> RawDetections {
  RawDetections {
    num_dets: 1,
    boxes: vec![
      10.0, 90.0, 50.0, 130.0, // 有效槽位
      -1e9, -1e9, 1e9, 1e9, // 以下都是后端遗留的填充垃圾
      0.0, 0.0, 0.0, 0.0,
      7.0, 7.0, 3.0, 3.0,
    ],
    scores: vec![0.9, f32::NAN, 0.0, 0.5],
    classes: vec![0, 9999, -3, 42],
  }
}

fn empty_response() -> RawDetections {
  RawDetections {
    num_dets: 0,
    boxes: vec![0.0; 16],
    scores: vec![0.0; 4],
    classes: vec![0; 4],
  }
}

#[test]
fn perfect_run_scores_full_map() {
  let letterbox = Letterbox::new(640, 640);
  let decoder = DetectionDecoder::new(letterbox, CategoryMap::coco80_to_coco91());
  let mut backend = FakeBackend {
    responses: VecDeque::from([hit_response(), empty_response()]),
  };
  backend.ensure_ready().unwrap();

  let mut aggregator = DetectionAggregator::new();
  for image_id in [1i64, 2] {
    let image = RgbImage::new(640, 480);
    let (src_w, src_h) = image.dimensions();
    let tensor = letterbox.preprocess(&image);
    assert_eq!(tensor.len(), 3 * 640 * 640);

    let raw = backend.infer(&tensor).unwrap();
    let detections = decoder.decode(&raw, src_w, src_h).unwrap();
    aggregator
      .push(ImageRecord {
        image_id,
        detections,
      })
      .unwrap();
  }

  assert_eq!(aggregator.image_count(), 2);
  assert_eq!(aggregator.detection_count(), 1);

  // 交换格式：[x, y, w, h]，两位小数，宽高非负
  let interchange = aggregator.to_interchange();
  assert_eq!(interchange.len(), 1);
  let entry = &interchange[0];
  assert_eq!(entry.image_id, 1);
  assert_eq!(entry.category_id, 1);
  assert_eq!(entry.bbox, [10.0, 10.0, 40.0, 40.0]);

  // 经过落盘再加载，评分结果不变
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("_predictions.json");
  save_predictions(&path, &interchange).unwrap();
  let reloaded = load_predictions(&path).unwrap();
  assert_eq!(reloaded, interchange);

  let ground_truth = CocoGroundTruth::from_json(GROUND_TRUTH).unwrap();
  let summary = scorer::evaluate(
    &ground_truth,
    &reloaded,
    &aggregator.image_ids(),
    &EvalParams::default(),
  )
  .unwrap();

  assert!((summary.map - 1.0).abs() < 1e-9);
  assert!((summary.map50 - 1.0).abs() < 1e-9);
  assert!((summary.map75 - 1.0).abs() < 1e-9);
}

#[test]
fn detectionless_run_scores_zero_map() {
  let letterbox = Letterbox::new(640, 640);
  let decoder = DetectionDecoder::new(letterbox, CategoryMap::coco80_to_coco91());
  let mut backend = FakeBackend {
    responses: VecDeque::from([empty_response(), empty_response()]),
  };

  let mut aggregator = DetectionAggregator::new();
  for image_id in [1i64, 2] {
    let image = RgbImage::new(640, 480);
    let tensor = letterbox.preprocess(&image);
    let raw = backend.infer(&tensor).unwrap();
    let detections = decoder.decode(&raw, 640, 480).unwrap();
    assert!(detections.is_empty());
    aggregator
      .push(ImageRecord {
        image_id,
        detections,
      })
      .unwrap();
  }

  let ground_truth = CocoGroundTruth::from_json(GROUND_TRUTH).unwrap();
  let summary = scorer::evaluate(
    &ground_truth,
    &aggregator.to_interchange(),
    &aggregator.image_ids(),
    &EvalParams::default(),
  )
  .unwrap();

  // 有标注而零检测：AP 为 0，而不是报错
  assert_eq!(summary.map, 0.0);
  assert_eq!(summary.map50, 0.0);
}

#[test]
fn backend_failure_aborts_the_loop() {
  let mut backend = FakeBackend {
    responses: VecDeque::new(),
  };
  let result = backend.infer(&[0.0; 3]);
  assert!(matches!(result, Err(BackendError::Inference(_))));
}
