// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;

/// Shuofeng 评估参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 数据集描述文件路径（TOML，含根目录、验证集列表与类别名称）
  #[arg(short = 'd', long, value_name = "FILE")]
  pub data: PathBuf,

  /// 推理模型名称
  #[arg(short = 'm', long, default_value = "yolov7", value_name = "MODEL")]
  pub model: String,

  /// 模型输入宽度
  #[arg(long, default_value = "640", value_name = "WIDTH")]
  pub width: u32,

  /// 模型输入高度
  #[arg(long, default_value = "640", value_name = "HEIGHT")]
  pub height: u32,

  /// 推理服务地址
  #[arg(
    short = 'u',
    long,
    default_value = "triton://localhost:8001",
    value_name = "URL"
  )]
  pub url: String,

  /// 标注文件路径
  /// 缺省时取数据集根目录下的 annotations/instances_val2017.json
  #[arg(long, value_name = "FILE")]
  pub annotations: Option<PathBuf>,

  /// 检测结果（交换格式 JSON）输出路径
  #[arg(long, default_value = "_predictions.json", value_name = "FILE")]
  pub predictions: PathBuf,

  /// 推理请求超时（秒），缺省不限制
  #[arg(short = 't', long, value_name = "SECONDS")]
  pub client_timeout: Option<f64>,
}
