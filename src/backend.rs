// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/backend.rs - 推理后端抽象
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

#[cfg(feature = "triton_backend")]
mod proto;
#[cfg(feature = "triton_backend")]
mod triton;

#[cfg(feature = "triton_backend")]
pub use triton::{TritonBackend, TritonBackendBuilder};

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// 后端单次推理返回的原始输出张量。
/// 四个数组平行排列，仅前 `num_dets` 个槽位有效，其余内容未定义。
#[derive(Debug, Clone, Default)]
pub struct RawDetections {
  pub num_dets: i32,
  /// 画布坐标角点框，长度为槽位数 × 4
  pub boxes: Vec<f32>,
  pub scores: Vec<f32>,
  pub classes: Vec<i32>,
}

impl RawDetections {
  /// 输出槽位数（N_max）
  pub fn capacity(&self) -> usize {
    self.scores.len()
  }
}

#[derive(Error, Debug)]
pub enum BackendError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("不支持的后端方案: {0}")]
  UnsupportedScheme(String),
  #[error("无法连接推理服务: {0}")]
  Connect(String),
  #[error("推理服务未存活")]
  ServerNotLive,
  #[error("推理服务未就绪")]
  ServerNotReady,
  #[error("模型未就绪: {0}")]
  ModelNotReady(String),
  #[error("推理调用失败: {0}")]
  Inference(String),
  #[error("输出张量缺失: {0}")]
  MissingOutput(&'static str),
  #[error("输出张量格式错误: {0}")]
  OutputFormat(&'static str),
}

/// 推理后端：一次同步的请求/响应往返。
/// 解码与评分核心只依赖本接口，可用内存实现替换以脱离网络测试。
pub trait InferenceBackend {
  /// 健康检查（服务存活、服务就绪、模型就绪），失败视为致命错误
  fn ensure_ready(&mut self) -> Result<(), BackendError>;

  /// 推理一张图像，输入为 `[1, 3, H, W]` 的 FP32 张量
  fn infer(&mut self, tensor: &[f32]) -> Result<RawDetections, BackendError>;
}

/// 创建后端时的公共选项
#[derive(Debug, Clone)]
pub struct BackendOptions {
  pub model: String,
  pub input_width: u32,
  pub input_height: u32,
  pub timeout: Option<Duration>,
}

/// 按 URL 方案创建推理后端
pub fn create_backend(
  url: &Url,
  options: BackendOptions,
) -> Result<Box<dyn InferenceBackend>, BackendError> {
  match url.scheme() {
    #[cfg(feature = "triton_backend")]
    "triton" => {
      use crate::FromUrl;
      let backend = TritonBackendBuilder::from_url(url)?
        .model(&options.model)
        .input_size(options.input_width, options.input_height)
        .timeout(options.timeout)
        .connect()?;
      Ok(Box::new(backend))
    }
    other => Err(BackendError::UnsupportedScheme(other.to_string())),
  }
}
