use std::time::Duration;
use anyhow::Error;
use ndarray::{Array, IxDyn};
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use crate::utils::utils::u8_to_f32_vec;

/// Subset of the KServe v2 `inference.GRPCInferenceService` messages used by the pipeline.
pub mod triton {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ModelReadyRequest {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub version: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
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
}

use triton::model_infer_request::{InferInputTensor, InferRequestedOutputTensor};
use triton::{InferTensorContents, ModelInferRequest, ModelInferResponse, ModelReadyRequest, ModelReadyResponse};

const MODEL_READY_PATH: &str = "/inference.GRPCInferenceService/ModelReady";
const MODEL_INFER_PATH: &str = "/inference.GRPCInferenceService/ModelInfer";

/// Unary gRPC client for a Triton inference server.
///
/// Cloning is cheap, clones share the underlying HTTP/2 channel.
#[derive(Debug, Clone)]
pub struct TritonInferenceClient {
    inner: tonic::client::Grpc<Channel>,
}

impl TritonInferenceClient {
    /// connect opens a channel to the inference server.
    ///
    /// # Arguments
    /// * `url` - server address, e.g. `http://127.0.0.1:8001`
    /// * `timeout` - per request timeout in seconds
    pub async fn connect(url: &str, timeout: u64) -> Result<Self, Error> {
        let channel = Endpoint::from_shared(url.to_string())?
            .timeout(Duration::from_secs(timeout))
            .connect()
            .await
            .map_err(|e| Error::msg(format!("triton_client - cannot connect to {url}: {e}")))?;
        Ok(TritonInferenceClient::with_channel(channel))
    }

    pub fn with_channel(channel: Channel) -> Self {
        TritonInferenceClient {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// model_ready reports whether the named model is loaded and serving.
    pub async fn model_ready(&self, model_name: &str) -> Result<bool, Error> {
        let request = ModelReadyRequest {
            name: model_name.to_string(),
            version: "".to_string(),
        };
        let response: ModelReadyResponse = self.unary(request, MODEL_READY_PATH).await?;
        Ok(response.ready)
    }

    pub async fn model_infer(&self, request: ModelInferRequest) -> Result<ModelInferResponse, Error> {
        self.unary(request, MODEL_INFER_PATH).await
    }

    async fn unary<Req, Resp>(&self, request: Req, path: &'static str) -> Result<Resp, Error>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Error::msg(format!("triton_client - service not ready: {e}")))?;
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(tonic::Request::new(request), PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}

/// fp32_infer_request builds a single-input FP32 inference request.
///
/// # Arguments
/// * `model_name` - name of the deployed model
/// * `input_name` - name of the model input tensor
/// * `tensor` - input tensor, its shape is sent as-is
/// * `outputs` - names of the requested output tensors
pub fn fp32_infer_request(
    model_name: &str,
    input_name: &str,
    tensor: &Array<f32, IxDyn>,
    outputs: &[&str],
) -> ModelInferRequest {
    let model_input = InferInputTensor {
        name: input_name.to_string(),
        datatype: "FP32".to_string(),
        shape: tensor.shape().iter().map(|&x| x as i64).collect(),
        contents: Some(InferTensorContents {
            fp32_contents: tensor.iter().cloned().collect(),
            ..Default::default()
        }),
    };

    ModelInferRequest {
        model_name: model_name.to_string(),
        model_version: "".to_string(),
        id: "".to_string(),
        inputs: vec![model_input],
        outputs: outputs
            .iter()
            .map(|name| InferRequestedOutputTensor { name: name.to_string() })
            .collect(),
        raw_input_contents: vec![],
    }
}

/// output_as_f32 extracts a named FP32 output tensor from an inference response.
///
/// Triton answers either with `raw_output_contents` (one buffer per output,
/// in output order) or with typed `contents`; both are accepted.
pub fn output_as_f32(response: &ModelInferResponse, name: &str) -> Result<Array<f32, IxDyn>, Error> {
    let (oidx, output) = response
        .outputs
        .iter()
        .enumerate()
        .find(|(_, output)| output.name == name)
        .ok_or_else(|| Error::msg(format!("triton_client - output {name} missing from response")))?;

    if output.datatype != "FP32" {
        return Err(Error::msg(format!(
            "triton_client - output {name} has datatype {}, expected FP32",
            output.datatype
        )))
    }

    let values = match response.raw_output_contents.get(oidx) {
        Some(raw) => u8_to_f32_vec(raw),
        None => output
            .contents
            .as_ref()
            .map(|contents| contents.fp32_contents.clone())
            .unwrap_or_default(),
    };

    let dimensions: Vec<usize> = output.shape.iter().map(|&dim| dim.max(0) as usize).collect();
    let arr = Array::from_shape_vec(IxDyn(&dimensions), values)?;
    Ok(arr)
}
