// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/category.rs - 类别映射表
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

/// COCO 80 类（val2014 顺序）到 91 类（论文编号）的映射表
const COCO80_TO_COCO91: [u32; 80] = [
  1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 27, 28,
  31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 46, 47, 48, 49, 50, 51, 52, 53, 54, 55,
  56, 57, 58, 59, 60, 61, 62, 63, 64, 65, 67, 70, 72, 73, 74, 75, 76, 77, 78, 79, 80, 81, 82, 84,
  85, 86, 87, 88, 89, 90,
];

/// 模型类别索引到数据集类别编号的静态双射。
/// 进程生命周期内不变，表长即模型训练时的类别数。
#[derive(Debug, Clone, Copy)]
pub struct CategoryMap {
  table: &'static [u32],
}

impl CategoryMap {
  pub const fn coco80_to_coco91() -> Self {
    Self {
      table: &COCO80_TO_COCO91,
    }
  }

  pub const fn len(&self) -> usize {
    self.table.len()
  }

  pub const fn is_empty(&self) -> bool {
    self.table.is_empty()
  }

  /// 查询模型类别索引对应的数据集类别编号，索引越界时返回 None
  pub fn lookup(&self, class_id: i32) -> Option<u32> {
    if class_id < 0 {
      return None;
    }
    self.table.get(class_id as usize).copied()
  }
}

impl Default for CategoryMap {
  fn default() -> Self {
    Self::coco80_to_coco91()
  }
}
