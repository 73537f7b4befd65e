// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/letterbox.rs - 等比缩放与填充变换
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

use image::RgbImage;
use image::imageops::{self, FilterType};

/// 填充像素值，与常见检测模型的训练预处理保持一致
const PAD_VALUE: u8 = 114;

/// 模型输入画布：等比缩放原图并居中填充到固定尺寸
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
  target_w: u32,
  target_h: u32,
}

impl Letterbox {
  pub fn new(target_w: u32, target_h: u32) -> Self {
    Self { target_w, target_h }
  }

  pub fn target_width(&self) -> u32 {
    self.target_w
  }

  pub fn target_height(&self) -> u32 {
    self.target_h
  }

  /// 计算给定原图尺寸下的正逆映射参数
  pub fn mapping(&self, src_w: u32, src_h: u32) -> LetterboxMapping {
    let scale = (self.target_w as f32 / src_w as f32).min(self.target_h as f32 / src_h as f32);
    let resized_w = (src_w as f32 * scale).round() as u32;
    let resized_h = (src_h as f32 * scale).round() as u32;
    let pad_x = (self.target_w as f32 - resized_w as f32) / 2.0;
    let pad_y = (self.target_h as f32 - resized_h as f32) / 2.0;

    LetterboxMapping {
      scale,
      pad_x,
      pad_y,
      src_w: src_w as f32,
      src_h: src_h as f32,
      resized_w,
      resized_h,
    }
  }

  /// 预处理一张图像为 `[1, 3, H, W]` 的 FP32 张量（RGB, 归一化到 [0, 1]）
  pub fn preprocess(&self, image: &RgbImage) -> Vec<f32> {
    let (src_w, src_h) = image.dimensions();
    let mapping = self.mapping(src_w, src_h);

    let resized = imageops::resize(
      image,
      mapping.resized_w.max(1),
      mapping.resized_h.max(1),
      FilterType::Triangle,
    );

    let tw = self.target_w as usize;
    let th = self.target_h as usize;
    let left = (mapping.pad_x - 0.1).round().max(0.0) as usize;
    let top = (mapping.pad_y - 0.1).round().max(0.0) as usize;

    let mut canvas = vec![PAD_VALUE; tw * th * 3];
    for y in 0..resized.height() as usize {
      for x in 0..resized.width() as usize {
        let pixel = resized.get_pixel(x as u32, y as u32);
        let base = ((y + top) * tw + (x + left)) * 3;
        canvas[base] = pixel[0];
        canvas[base + 1] = pixel[1];
        canvas[base + 2] = pixel[2];
      }
    }

    // HWC -> CHW
    let mut tensor = vec![0.0f32; 3 * tw * th];
    for y in 0..th {
      for x in 0..tw {
        let base = (y * tw + x) * 3;
        tensor[y * tw + x] = canvas[base] as f32 / 255.0;
        tensor[tw * th + y * tw + x] = canvas[base + 1] as f32 / 255.0;
        tensor[2 * tw * th + y * tw + x] = canvas[base + 2] as f32 / 255.0;
      }
    }

    tensor
  }
}

/// 一张原图与模型画布之间的仿射映射参数
#[derive(Debug, Clone, Copy)]
pub struct LetterboxMapping {
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  src_w: f32,
  src_h: f32,
  resized_w: u32,
  resized_h: u32,
}

impl LetterboxMapping {
  pub fn scale(&self) -> f32 {
    self.scale
  }

  pub fn padding(&self) -> (f32, f32) {
    (self.pad_x, self.pad_y)
  }

  /// 正变换：原图坐标框 -> 画布坐标框
  pub fn forward(&self, [x1, y1, x2, y2]: [f32; 4]) -> [f32; 4] {
    [
      x1 * self.scale + self.pad_x,
      y1 * self.scale + self.pad_y,
      x2 * self.scale + self.pad_x,
      y2 * self.scale + self.pad_y,
    ]
  }

  /// 逆变换：画布坐标框 -> 原图坐标框，并裁剪到原图范围内
  pub fn invert(&self, [x1, y1, x2, y2]: [f32; 4]) -> [f32; 4] {
    [
      ((x1 - self.pad_x) / self.scale).clamp(0.0, self.src_w),
      ((y1 - self.pad_y) / self.scale).clamp(0.0, self.src_h),
      ((x2 - self.pad_x) / self.scale).clamp(0.0, self.src_w),
      ((y2 - self.pad_y) / self.scale).clamp(0.0, self.src_h),
    ]
  }
}
