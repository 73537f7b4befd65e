// 该文件是 Shuofeng （漠北朔风） 项目的一部分。
// src/backend/proto.rs - KServe v2 推理协议消息与客户端
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

// 手写 `inference.GRPCInferenceService` 协议子集。
// 字段编号遵循公开的 KServe v2 协议定义；本工具不使用的字段
// （参数表、统计接口等）直接省略，proto3 解码会跳过未知字段。

use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ServerLiveRequest {}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ServerLiveResponse {
  #[prost(bool, tag = "1")]
  pub live: bool,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ServerReadyRequest {}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ServerReadyResponse {
  #[prost(bool, tag = "1")]
  pub ready: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelReadyRequest {
  #[prost(string, tag = "1")]
  pub name: String,
  #[prost(string, tag = "2")]
  pub version: String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ModelReadyResponse {
  #[prost(bool, tag = "1")]
  pub ready: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InferTensorContents {
  #[prost(bool, repeated, tag = "1")]
  pub bool_contents: Vec<bool>,
  #[prost(int32, repeated, tag = "2")]
  pub int_contents: Vec<i32>,
  #[prost(int64, repeated, tag = "3")]
  pub int64_contents: Vec<i64>,
  #[prost(uint32, repeated, tag = "4")]
  pub uint_contents: Vec<u32>,
  #[prost(uint64, repeated, tag = "5")]
  pub uint64_contents: Vec<u64>,
  #[prost(float, repeated, tag = "6")]
  pub fp32_contents: Vec<f32>,
  #[prost(double, repeated, tag = "7")]
  pub fp64_contents: Vec<f64>,
  #[prost(bytes = "vec", repeated, tag = "8")]
  pub bytes_contents: Vec<Vec<u8>>,
}

pub mod model_infer_request {
  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct InferInputTensor {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub datatype: String,
    #[prost(int64, repeated, tag = "3")]
    pub shape: Vec<i64>,
    #[prost(message, optional, tag = "5")]
    pub contents: Option<super::InferTensorContents>,
  }

  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct InferRequestedOutputTensor {
    #[prost(string, tag = "1")]
    pub name: String,
  }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelInferRequest {
  #[prost(string, tag = "1")]
  pub model_name: String,
  #[prost(string, tag = "2")]
  pub model_version: String,
  #[prost(string, tag = "3")]
  pub id: String,
  #[prost(message, repeated, tag = "5")]
  pub inputs: Vec<model_infer_request::InferInputTensor>,
  #[prost(message, repeated, tag = "6")]
  pub outputs: Vec<model_infer_request::InferRequestedOutputTensor>,
  #[prost(bytes = "vec", repeated, tag = "7")]
  pub raw_input_contents: Vec<Vec<u8>>,
}

pub mod model_infer_response {
  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct InferOutputTensor {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub datatype: String,
    #[prost(int64, repeated, tag = "3")]
    pub shape: Vec<i64>,
    #[prost(message, optional, tag = "5")]
    pub contents: Option<super::InferTensorContents>,
  }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelInferResponse {
  #[prost(string, tag = "1")]
  pub model_name: String,
  #[prost(string, tag = "2")]
  pub model_version: String,
  #[prost(string, tag = "3")]
  pub id: String,
  #[prost(message, repeated, tag = "5")]
  pub outputs: Vec<model_infer_response::InferOutputTensor>,
  #[prost(bytes = "vec", repeated, tag = "6")]
  pub raw_output_contents: Vec<Vec<u8>>,
}

/// `inference.GRPCInferenceService` 的一元调用客户端
#[derive(Debug, Clone)]
pub struct GrpcInferenceServiceClient {
  inner: tonic::client::Grpc<Channel>,
}

impl GrpcInferenceServiceClient {
  pub fn new(channel: Channel) -> Self {
    Self {
      inner: tonic::client::Grpc::new(channel),
    }
  }

  async fn ready(&mut self) -> Result<(), tonic::Status> {
    self
      .inner
      .ready()
      .await
      .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {e}")))
  }

  pub async fn server_live(
    &mut self,
    request: ServerLiveRequest,
  ) -> Result<tonic::Response<ServerLiveResponse>, tonic::Status> {
    self.ready().await?;
    let codec: tonic::codec::ProstCodec<ServerLiveRequest, ServerLiveResponse> =
      tonic::codec::ProstCodec::default();
    let path = PathAndQuery::from_static("/inference.GRPCInferenceService/ServerLive");
    self.inner.unary(tonic::Request::new(request), path, codec).await
  }

  pub async fn server_ready(
    &mut self,
    request: ServerReadyRequest,
  ) -> Result<tonic::Response<ServerReadyResponse>, tonic::Status> {
    self.ready().await?;
    let codec: tonic::codec::ProstCodec<ServerReadyRequest, ServerReadyResponse> =
      tonic::codec::ProstCodec::default();
    let path = PathAndQuery::from_static("/inference.GRPCInferenceService/ServerReady");
    self.inner.unary(tonic::Request::new(request), path, codec).await
  }

  pub async fn model_ready(
    &mut self,
    request: ModelReadyRequest,
  ) -> Result<tonic::Response<ModelReadyResponse>, tonic::Status> {
    self.ready().await?;
    let codec: tonic::codec::ProstCodec<ModelReadyRequest, ModelReadyResponse> =
      tonic::codec::ProstCodec::default();
    let path = PathAndQuery::from_static("/inference.GRPCInferenceService/ModelReady");
    self.inner.unary(tonic::Request::new(request), path, codec).await
  }

  pub async fn model_infer(
    &mut self,
    request: ModelInferRequest,
  ) -> Result<tonic::Response<ModelInferResponse>, tonic::Status> {
    self.ready().await?;
    let codec: tonic::codec::ProstCodec<ModelInferRequest, ModelInferResponse> =
      tonic::codec::ProstCodec::default();
    let path = PathAndQuery::from_static("/inference.GRPCInferenceService/ModelInfer");
    self.inner.unary(tonic::Request::new(request), path, codec).await
  }
}
