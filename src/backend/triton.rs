// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/backend/triton.rs - Triton gRPC 推理后端
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

use std::time::Duration;

use tonic::transport::Endpoint;
use tracing::{debug, info};
use url::Url;

use crate::backend::proto::{
  GrpcInferenceServiceClient, InferTensorContents, ModelInferRequest, ModelInferResponse,
  ModelReadyRequest, ServerLiveRequest, ServerReadyRequest, model_infer_request,
};
use crate::backend::{BackendError, InferenceBackend, RawDetections};
use crate::{FromUrl, FromUrlWithScheme};

const TRITON_SCHEME: &str = "triton";
const TRITON_DEFAULT_PORT: u16 = 8001;
const KEEPALIVE: Duration = Duration::from_secs(30);

const INPUT_NAME: &str = "images";
const OUTPUT_NUM_DETS: &str = "num_dets";
const OUTPUT_BOXES: &str = "det_boxes";
const OUTPUT_SCORES: &str = "det_scores";
const OUTPUT_CLASSES: &str = "det_classes";

pub struct TritonBackendBuilder {
  endpoint: String,
  model: String,
  input_width: u32,
  input_height: u32,
  timeout: Option<Duration>,
}

impl FromUrl for TritonBackendBuilder {
  type Error = BackendError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != TRITON_SCHEME {
      return Err(BackendError::SchemeMismatch);
    }

    let host = url
      .host_str()
      .ok_or_else(|| BackendError::Connect("地址缺少主机名".to_string()))?;
    let port = url.port().unwrap_or(TRITON_DEFAULT_PORT);

    let mut builder = TritonBackendBuilder {
      endpoint: format!("http://{host}:{port}"),
      model: "yolov7".to_string(),
      input_width: 640,
      input_height: 640,
      timeout: None,
    };

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "model" => builder.model = value.into_owned(),
        "timeout" => {
          let seconds: f64 = value
            .parse()
            .map_err(|_| BackendError::Connect(format!("超时参数无法解析: {value}")))?;
          builder.timeout = Some(Duration::from_secs_f64(seconds));
        }
        _ => {}
      }
    }

    Ok(builder)
  }
}

impl FromUrlWithScheme for TritonBackendBuilder {
  const SCHEME: &'static str = TRITON_SCHEME;
}

impl TritonBackendBuilder {
  pub fn model(mut self, model: &str) -> Self {
    self.model = model.to_string();
    self
  }

  pub fn input_size(mut self, width: u32, height: u32) -> Self {
    self.input_width = width;
    self.input_height = height;
    self
  }

  pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// 建立到推理服务的连接
  pub fn connect(self) -> Result<TritonBackend, BackendError> {
    info!("连接推理服务: {}", self.endpoint);

    let runtime = tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .map_err(|e| BackendError::Connect(e.to_string()))?;

    let mut endpoint = Endpoint::from_shared(self.endpoint.clone())
      .map_err(|e| BackendError::Connect(e.to_string()))?
      .tcp_keepalive(Some(KEEPALIVE))
      .http2_keep_alive_interval(KEEPALIVE);
    if let Some(timeout) = self.timeout {
      debug!("推理请求超时: {:.2?}", timeout);
      endpoint = endpoint.timeout(timeout);
    }

    let channel = runtime
      .block_on(endpoint.connect())
      .map_err(|e| BackendError::Connect(e.to_string()))?;

    info!("连接建立完成，模型: {}", self.model);
    Ok(TritonBackend {
      runtime,
      client: GrpcInferenceServiceClient::new(channel),
      model: self.model,
      input_width: self.input_width,
      input_height: self.input_height,
    })
  }
}

/// 基于 Triton (KServe v2 协议) 的远程推理后端。
/// 对外暴露同步接口，内部持有独立的 tokio 运行时。
pub struct TritonBackend {
  runtime: tokio::runtime::Runtime,
  client: GrpcInferenceServiceClient,
  model: String,
  input_width: u32,
  input_height: u32,
}

impl InferenceBackend for TritonBackend {
  fn ensure_ready(&mut self) -> Result<(), BackendError> {
    let live = self
      .runtime
      .block_on(self.client.server_live(ServerLiveRequest {}))
      .map_err(|e| BackendError::Inference(e.to_string()))?
      .into_inner();
    if !live.live {
      return Err(BackendError::ServerNotLive);
    }
    debug!("服务存活检查通过");

    let ready = self
      .runtime
      .block_on(self.client.server_ready(ServerReadyRequest {}))
      .map_err(|e| BackendError::Inference(e.to_string()))?
      .into_inner();
    if !ready.ready {
      return Err(BackendError::ServerNotReady);
    }
    debug!("服务就绪检查通过");

    let model_ready = self
      .runtime
      .block_on(self.client.model_ready(ModelReadyRequest {
        name: self.model.clone(),
        version: String::new(),
      }))
      .map_err(|e| BackendError::Inference(e.to_string()))?
      .into_inner();
    if !model_ready.ready {
      return Err(BackendError::ModelNotReady(self.model.clone()));
    }
    debug!("模型 {} 就绪检查通过", self.model);

    Ok(())
  }

  fn infer(&mut self, tensor: &[f32]) -> Result<RawDetections, BackendError> {
    let request = ModelInferRequest {
      model_name: self.model.clone(),
      model_version: String::new(),
      id: String::new(),
      inputs: vec![model_infer_request::InferInputTensor {
        name: INPUT_NAME.to_string(),
        datatype: "FP32".to_string(),
        shape: vec![1, 3, self.input_width as i64, self.input_height as i64],
        contents: Some(InferTensorContents {
          fp32_contents: tensor.to_vec(),
          ..Default::default()
        }),
      }],
      outputs: [OUTPUT_NUM_DETS, OUTPUT_BOXES, OUTPUT_SCORES, OUTPUT_CLASSES]
        .iter()
        .map(|name| model_infer_request::InferRequestedOutputTensor {
          name: (*name).to_string(),
        })
        .collect(),
      raw_input_contents: Vec::new(),
    };

    let response = self
      .runtime
      .block_on(self.client.model_infer(request))
      .map_err(|e| BackendError::Inference(e.to_string()))?
      .into_inner();

    parse_outputs(&response)
  }
}

/// 从响应里按名提取四个输出张量。
/// Triton 可能用 raw_output_contents 承载数据，也可能用结构化 contents。
fn parse_outputs(response: &ModelInferResponse) -> Result<RawDetections, BackendError> {
  let num_dets = i32_output(response, OUTPUT_NUM_DETS)?;
  let boxes = f32_output(response, OUTPUT_BOXES)?;
  let scores = f32_output(response, OUTPUT_SCORES)?;
  let classes = i32_output(response, OUTPUT_CLASSES)?;

  let num_dets = *num_dets
    .first()
    .ok_or(BackendError::OutputFormat(OUTPUT_NUM_DETS))?;

  Ok(RawDetections {
    num_dets,
    boxes,
    scores,
    classes,
  })
}

fn output_index(
  response: &ModelInferResponse,
  name: &'static str,
) -> Result<usize, BackendError> {
  response
    .outputs
    .iter()
    .position(|output| output.name == name)
    .ok_or(BackendError::MissingOutput(name))
}

fn f32_output(
  response: &ModelInferResponse,
  name: &'static str,
) -> Result<Vec<f32>, BackendError> {
  let index = output_index(response, name)?;
  if let Some(raw) = response.raw_output_contents.get(index) {
    if raw.len() % 4 != 0 {
      return Err(BackendError::OutputFormat(name));
    }
    return Ok(bytemuck::pod_collect_to_vec::<u8, f32>(raw));
  }
  response.outputs[index]
    .contents
    .as_ref()
    .map(|contents| contents.fp32_contents.clone())
    .ok_or(BackendError::OutputFormat(name))
}

fn i32_output(
  response: &ModelInferResponse,
  name: &'static str,
) -> Result<Vec<i32>, BackendError> {
  let index = output_index(response, name)?;
  if let Some(raw) = response.raw_output_contents.get(index) {
    if raw.len() % 4 != 0 {
      return Err(BackendError::OutputFormat(name));
    }
    return Ok(bytemuck::pod_collect_to_vec::<u8, i32>(raw));
  }
  response.outputs[index]
    .contents
    .as_ref()
    .map(|contents| contents.int_contents.clone())
    .ok_or(BackendError::OutputFormat(name))
}
