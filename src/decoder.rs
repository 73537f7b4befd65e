// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/decoder.rs - 检测解码器
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

use thiserror::Error;
use tracing::debug;

use crate::backend::RawDetections;
use crate::category::CategoryMap;
use crate::letterbox::Letterbox;
use crate::record::Detection;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("检测数量非法: {n} (槽位上限 {max})")]
  CountOutOfRange { n: i32, max: usize },
  #[error("输出张量长度不一致: {name} 长度 {len}, 需要至少 {required}")]
  LengthMismatch {
    name: &'static str,
    len: usize,
    required: usize,
  },
  #[error("类别索引越界: {class_id}")]
  ClassOutOfRange { class_id: i32 },
}

/// 把一次推理响应解码为原图像素坐标下的检测序列
pub struct DetectionDecoder {
  letterbox: Letterbox,
  categories: CategoryMap,
}

impl DetectionDecoder {
  pub fn new(letterbox: Letterbox, categories: CategoryMap) -> Self {
    Self {
      letterbox,
      categories,
    }
  }

  /// 解码一张图像的输出张量。
  /// 仅前 `num_dets` 个槽位有效，其余槽位内容无论是什么都会被忽略；
  /// 逆变换后宽或高不为正的框直接丢弃，不视为错误。
  pub fn decode(
    &self,
    raw: &RawDetections,
    src_w: u32,
    src_h: u32,
  ) -> Result<Vec<Detection>, DecodeError> {
    let capacity = raw.capacity();
    if raw.num_dets < 0 || raw.num_dets as usize > capacity {
      return Err(DecodeError::CountOutOfRange {
        n: raw.num_dets,
        max: capacity,
      });
    }
    let n = raw.num_dets as usize;

    if raw.boxes.len() < n * 4 {
      return Err(DecodeError::LengthMismatch {
        name: "det_boxes",
        len: raw.boxes.len(),
        required: n * 4,
      });
    }
    if raw.classes.len() < n {
      return Err(DecodeError::LengthMismatch {
        name: "det_classes",
        len: raw.classes.len(),
        required: n,
      });
    }

    let mapping = self.letterbox.mapping(src_w, src_h);
    let mut detections = Vec::with_capacity(n);

    for i in 0..n {
      let canvas_box = [
        raw.boxes[i * 4],
        raw.boxes[i * 4 + 1],
        raw.boxes[i * 4 + 2],
        raw.boxes[i * 4 + 3],
      ];
      let [x1, y1, x2, y2] = mapping.invert(canvas_box);

      if x2 - x1 <= 0.0 || y2 - y1 <= 0.0 {
        debug!("丢弃退化的检测框: {:?}", canvas_box);
        continue;
      }

      let class_id = raw.classes[i];
      let category_id = self
        .categories
        .lookup(class_id)
        .ok_or(DecodeError::ClassOutOfRange { class_id })?;

      detections.push(Detection {
        bbox: [x1, y1, x2, y2],
        category_id,
        score: raw.scores[i],
      });
    }

    Ok(detections)
  }
}
