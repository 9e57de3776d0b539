// 该文件是 Yebing （叶病） 项目的一部分。
// src/model.rs - 模型与分类结果定义
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

use tracing::{debug, warn};

use crate::frame::InputTensor;

pub const CLASS_NUM: usize = 3;
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// 完整的推理流程：输入帧 -> 结果
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理引擎：输入张量 -> 原始分数
///
/// 引擎内部如何计算对调用方不透明。
pub trait Engine {
  type Error;

  fn infer(&self, tensor: &InputTensor) -> Result<Vec<f32>, Self::Error>;
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Self;
}

/// 模型输出的原始分数，每个类别一个，未做 softmax
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores(pub [f32; CLASS_NUM]);

impl TryFrom<&[f32]> for Scores {
  type Error = usize;

  fn try_from(values: &[f32]) -> Result<Self, Self::Error> {
    <[f32; CLASS_NUM]>::try_from(values)
      .map(Scores)
      .map_err(|_| values.len())
  }
}

mod disease;
pub use self::disease::{DISEASE_CATALOG, DiseaseRecord, PlantDisease};

/// 一次分类的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
  pub kind: PlantDisease,
  pub record: &'static DiseaseRecord,
  pub scores: Scores,
  /// 没有任何分数超过阈值，结果是默认的第 0 类
  pub fallback: bool,
}

/// 按默认阈值 0.5 分类
pub fn classify(scores: &Scores) -> Diagnosis {
  classify_with_threshold(scores, DEFAULT_THRESHOLD)
}

/// 按 0、1、2 的固定顺序检查，返回第一个严格大于阈值的类别。
/// 都不满足时返回第 0 类。
pub fn classify_with_threshold(scores: &Scores, threshold: f32) -> Diagnosis {
  let hit = scores.0.iter().position(|&score| score > threshold);
  let kind = PlantDisease::from_label_id(hit.unwrap_or(0) as u32);

  if hit.is_none() {
    // 没有“未知”类别，调用方通过 fallback 区分
    warn!(
      "没有分数超过阈值 {}, 默认为 {}: {:?}",
      threshold,
      kind.to_label_str(),
      scores.0
    );
  } else {
    debug!("分类结果: {} ({:?})", kind.to_label_str(), scores.0);
  }

  Diagnosis {
    kind,
    record: kind.record(),
    scores: *scores,
    fallback: hit.is_none(),
  }
}

mod detector;
pub use self::detector::{DetectorError, DiseaseDetector};

#[cfg(feature = "model_onnx")]
mod onnx;
#[cfg(feature = "model_onnx")]
pub use self::onnx::{OnnxEngine, OnnxEngineBuilder, OnnxEngineError};
