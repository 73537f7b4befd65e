// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/annotations.rs - COCO 标注读取
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

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum AnnotationError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  Json(#[from] serde_json::Error),
}

/// COCO instances 标注文件（只读输入，本管线从不产出它）
#[derive(Debug, Deserialize)]
pub struct CocoGroundTruth {
  #[serde(default)]
  pub images: Vec<CocoImage>,
  pub annotations: Vec<CocoAnnotation>,
  #[serde(default)]
  pub categories: Vec<CocoCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CocoImage {
  pub id: i64,
  #[serde(default)]
  pub file_name: String,
  #[serde(default)]
  pub width: u32,
  #[serde(default)]
  pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CocoAnnotation {
  #[serde(default)]
  pub id: i64,
  pub image_id: i64,
  pub category_id: u32,
  /// [x, y, w, h]
  pub bbox: [f64; 4],
  /// 标注面积；COCO 中是分割面积，缺省时回退为框面积
  #[serde(default)]
  pub area: Option<f64>,
  /// 0/1 标记，1 表示人群区域
  #[serde(default)]
  pub iscrowd: u8,
}

impl CocoAnnotation {
  pub fn is_crowd(&self) -> bool {
    self.iscrowd != 0
  }

  pub fn area_or_bbox(&self) -> f64 {
    self.area.unwrap_or(self.bbox[2] * self.bbox[3])
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CocoCategory {
  pub id: u32,
  #[serde(default)]
  pub name: String,
}

impl CocoGroundTruth {
  pub fn load(path: &Path) -> Result<Self, AnnotationError> {
    let file = BufReader::new(File::open(path)?);
    let ground_truth: CocoGroundTruth = serde_json::from_reader(file)?;
    info!(
      "标注加载完成: {} 张图像, {} 条标注, {} 个类别",
      ground_truth.images.len(),
      ground_truth.annotations.len(),
      ground_truth.categories.len()
    );
    Ok(ground_truth)
  }

  pub fn from_json(text: &str) -> Result<Self, AnnotationError> {
    Ok(serde_json::from_str(text)?)
  }

  pub fn image_ids(&self) -> Vec<i64> {
    let mut ids: Vec<i64> = self.images.iter().map(|image| image.id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
  }

  /// 评估用类别集合：优先取 categories 表，为空时退回标注中出现过的类别
  pub fn category_ids(&self) -> Vec<u32> {
    let mut ids: Vec<u32> = if self.categories.is_empty() {
      self.annotations.iter().map(|ann| ann.category_id).collect()
    } else {
      self.categories.iter().map(|cat| cat.id).collect()
    };
    ids.sort_unstable();
    ids.dedup();
    ids
  }
}
