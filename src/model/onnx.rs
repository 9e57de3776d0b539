// 该文件是 Yebing （叶病） 项目的一部分。
// src/model/onnx.rs - ONNX 推理引擎
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
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::Factoid;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{INPUT_HEIGHT, INPUT_WIDTH, InputTensor, RGB_CHANNELS},
  model::Engine,
  url_path,
};

const ONNX_NUM_INPUTS: usize = 1;
const ONNX_NUM_OUTPUTS: usize = 1;

type OnnxPlan = TypedRunnableModel<TypedModel>;

#[derive(Error, Debug)]
pub enum OnnxEngineError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("推理错误: {0}")]
  InferError(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
}

impl OnnxEngineError {
  fn invalid(msg: &str, e: TractError) -> Self {
    OnnxEngineError::ModelInvalid(format!("{}: {}", msg, e))
  }

  fn infer(e: TractError) -> Self {
    OnnxEngineError::InferError(e.to_string())
  }
}

/// 已加载并优化的模型，析构时释放
pub struct OnnxEngine {
  plan: OnnxPlan,
  model_path: String,
}

pub struct OnnxEngineBuilder {
  model_path: String,
}

impl FromUrlWithScheme for OnnxEngineBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxEngineBuilder {
  type Error = OnnxEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxEngineError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(OnnxEngineBuilder {
      model_path: url_path(url)?,
    })
  }
}

impl OnnxEngineBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
    }
  }

  pub fn build(self) -> Result<OnnxEngine, OnnxEngineError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let model = tract_onnx::onnx()
      .model_for_read(&mut model_data.as_slice())
      .map_err(|e| OnnxEngineError::invalid("无法解析模型", e))?;

    let num_inputs = model
      .input_outlets()
      .map_err(|e| OnnxEngineError::invalid("无法获取输入数量", e))?
      .len();
    let num_outputs = model
      .output_outlets()
      .map_err(|e| OnnxEngineError::invalid("无法获取输出数量", e))?
      .len();

    if num_inputs != ONNX_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        ONNX_NUM_INPUTS, num_inputs
      );
      return Err(OnnxEngineError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        ONNX_NUM_INPUTS, num_inputs
      )));
    }

    if num_outputs != ONNX_NUM_OUTPUTS {
      error!(
        "预期模型输出数量为 {}, 实际为 {}",
        ONNX_NUM_OUTPUTS, num_outputs
      );
      return Err(OnnxEngineError::ModelInvalid(format!(
        "预期模型输出数量为 {}, 实际为 {}",
        ONNX_NUM_OUTPUTS, num_outputs
      )));
    }

    let shape = [
      1,
      INPUT_HEIGHT as usize,
      INPUT_WIDTH as usize,
      RGB_CHANNELS,
    ];

    // 模型声明了具体形状时必须是 NHWC float32 输入
    let declared = model
      .input_fact(0)
      .map_err(|e| OnnxEngineError::invalid("无法获取输入形状", e))?;
    if let Some(dims) = declared.shape.concretize() {
      let expected: TVec<TDim> = shape.iter().map(|d| d.to_dim()).collect();
      if dims != expected {
        error!("预期模型输入形状为 {:?}, 实际为 {:?}", expected, dims);
        return Err(OnnxEngineError::ModelInvalid(format!(
          "预期模型输入形状为 {:?}, 实际为 {:?}",
          expected, dims
        )));
      }
    }
    if let Some(datum_type) = declared.datum_type.concretize()
      && datum_type != f32::datum_type()
    {
      error!("预期模型输入类型为 f32, 实际为 {:?}", datum_type);
      return Err(OnnxEngineError::ModelInvalid(format!(
        "预期模型输入类型为 f32, 实际为 {:?}",
        datum_type
      )));
    }

    info!("创建推理计划");
    let plan = model
      .with_input_fact(0, f32::fact(shape).into())
      .map_err(|e| OnnxEngineError::invalid("输入形状与模型不符", e))?
      .into_optimized()
      .map_err(|e| OnnxEngineError::invalid("模型优化失败", e))?
      .into_runnable()
      .map_err(|e| OnnxEngineError::invalid("无法创建推理计划", e))?;
    info!("模型加载完成");

    Ok(OnnxEngine {
      plan,
      model_path: self.model_path,
    })
  }
}

impl Engine for OnnxEngine {
  type Error = OnnxEngineError;

  fn infer(&self, tensor: &InputTensor) -> Result<Vec<f32>, Self::Error> {
    let input = Tensor::from_shape(&tensor.shape(), tensor.as_nhwc()).map_err(OnnxEngineError::infer)?;

    let outputs = self
      .plan
      .run(tvec!(input.into()))
      .map_err(OnnxEngineError::infer)?;

    let output = outputs
      .first()
      .ok_or_else(|| OnnxEngineError::InferError("模型没有输出".to_string()))?;
    let view = output
      .to_array_view::<f32>()
      .map_err(OnnxEngineError::infer)?;
    debug!("模型推理结果：{:?}", view);

    Ok(view.iter().copied().collect())
  }
}

impl Drop for OnnxEngine {
  fn drop(&mut self) {
    debug!("释放模型: {}", self.model_path);
  }
}
