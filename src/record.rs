// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/record.rs - 检测记录与数据集级聚合
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

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单个检测结果，坐标为原图像素下的角点框
#[derive(Debug, Clone)]
pub struct Detection {
  /// [x_min, y_min, x_max, y_max]
  pub bbox: [f32; 4],
  /// 数据集类别编号（已经过类别映射）
  pub category_id: u32,
  /// 置信度
  pub score: f32,
}

/// 一张图像的全部检测，推理完成后不再变更
#[derive(Debug, Clone)]
pub struct ImageRecord {
  pub image_id: i64,
  pub detections: Vec<Detection>,
}

#[derive(Error, Debug)]
#[error("图像标识重复: {image_id}")]
pub struct DuplicateImageError {
  pub image_id: i64,
}

/// 数据集级的检测聚合器。
/// 持有整个评估运行的检测记录，报告产出后随之丢弃。
#[derive(Debug, Default)]
pub struct DetectionAggregator {
  records: Vec<ImageRecord>,
  seen: HashSet<i64>,
}

impl DetectionAggregator {
  pub fn new() -> Self {
    Self::default()
  }

  /// 追加一张图像的检测记录，图像标识重复视为数据集清单损坏
  pub fn push(&mut self, record: ImageRecord) -> Result<(), DuplicateImageError> {
    if !self.seen.insert(record.image_id) {
      return Err(DuplicateImageError {
        image_id: record.image_id,
      });
    }
    self.records.push(record);
    Ok(())
  }

  pub fn image_count(&self) -> usize {
    self.records.len()
  }

  pub fn detection_count(&self) -> usize {
    self.records.iter().map(|r| r.detections.len()).sum()
  }

  pub fn records(&self) -> &[ImageRecord] {
    &self.records
  }

  pub fn image_ids(&self) -> Vec<i64> {
    self.records.iter().map(|r| r.image_id).collect()
  }

  /// 导出为交换格式记录序列，顺序与录入顺序一致
  pub fn to_interchange(&self) -> Vec<PredictionRecord> {
    self
      .records
      .iter()
      .flat_map(|record| {
        record.detections.iter().map(|det| {
          let [x1, y1, x2, y2] = det.bbox;
          PredictionRecord {
            image_id: record.image_id,
            category_id: det.category_id,
            bbox: [
              round2(x1),
              round2(y1),
              round2(x2 - x1),
              round2(y2 - y1),
            ],
            score: det.score,
          }
        })
      })
      .collect()
  }
}

/// 检测交换格式：`bbox` 为 [x, y, w, h]（左上角 + 宽高），保留两位小数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
  pub image_id: i64,
  pub category_id: u32,
  pub bbox: [f64; 4],
  pub score: f32,
}

fn round2(value: f32) -> f64 {
  (value as f64 * 100.0).round() / 100.0
}

#[derive(Error, Debug)]
pub enum PredictionFileError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  Json(#[from] serde_json::Error),
}

pub fn save_predictions(
  path: &Path,
  records: &[PredictionRecord],
) -> Result<(), PredictionFileError> {
  let file = BufWriter::new(File::create(path)?);
  serde_json::to_writer(file, records)?;
  Ok(())
}

pub fn load_predictions(path: &Path) -> Result<Vec<PredictionRecord>, PredictionFileError> {
  let file = BufReader::new(File::open(path)?);
  Ok(serde_json::from_reader(file)?)
}
