// 该文件是 Yebing （叶病） 项目的一部分。
// src/model/detector.rs - 病害检测流程
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

use crate::{
  frame::{AsRgbImage, normalize},
  model::{CLASS_NUM, DEFAULT_THRESHOLD, Diagnosis, Engine, Model, Scores, classify_with_threshold},
};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("推理引擎错误: {0}")]
  Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("模型输出数量错误: 期望 {expected}, 实际 {actual}")]
  ScoreCount { expected: usize, actual: usize },
}

/// 归一化 -> 推理 -> 分类
pub struct DiseaseDetector<E, Frame> {
  engine: E,
  threshold: f32,
  _phantom: std::marker::PhantomData<Frame>,
}

impl<E, Frame> DiseaseDetector<E, Frame> {
  pub fn new(engine: E) -> Self {
    Self {
      engine,
      threshold: DEFAULT_THRESHOLD,
      _phantom: std::marker::PhantomData,
    }
  }

  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }
}

impl<E, Frame> Model for DiseaseDetector<E, Frame>
where
  E: Engine,
  E::Error: std::error::Error + Send + Sync + 'static,
  Frame: AsRgbImage,
{
  type Input = Frame;
  type Output = Diagnosis;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let image = input.as_rgb_image();
    debug!("归一化输入图像 {}x{}", image.width(), image.height());
    let tensor = normalize(image);

    debug!("执行模型推理");
    let raw = self
      .engine
      .infer(&tensor)
      .map_err(|e| DetectorError::Engine(Box::new(e)))?;

    let scores = Scores::try_from(raw.as_slice()).map_err(|actual| DetectorError::ScoreCount {
      expected: CLASS_NUM,
      actual,
    })?;

    Ok(classify_with_threshold(&scores, self.threshold))
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use image::{Rgb, RgbImage};

  use super::*;
  use crate::{frame::InputTensor, model::PlantDisease};

  #[derive(Debug, Error)]
  #[error("engine exploded")]
  struct Exploded;

  struct FixedEngine {
    scores: Vec<f32>,
    calls: Cell<usize>,
  }

  impl FixedEngine {
    fn new(scores: &[f32]) -> Self {
      Self {
        scores: scores.to_vec(),
        calls: Cell::new(0),
      }
    }
  }

  impl Engine for FixedEngine {
    type Error = Exploded;

    fn infer(&self, tensor: &InputTensor) -> Result<Vec<f32>, Self::Error> {
      assert_eq!(tensor.as_nhwc().len(), 224 * 224 * 3);
      self.calls.set(self.calls.get() + 1);
      Ok(self.scores.clone())
    }
  }

  struct FailingEngine;

  impl Engine for FailingEngine {
    type Error = Exploded;

    fn infer(&self, _tensor: &InputTensor) -> Result<Vec<f32>, Self::Error> {
      Err(Exploded)
    }
  }

  fn leaf() -> RgbImage {
    RgbImage::from_pixel(32, 48, Rgb([30, 160, 40]))
  }

  #[test]
  fn detector_runs_engine_and_classifies() {
    let detector: DiseaseDetector<_, RgbImage> =
      DiseaseDetector::new(FixedEngine::new(&[0.1, 0.2, 0.95]));
    let diagnosis = detector.infer(&leaf()).unwrap();
    assert_eq!(diagnosis.kind, PlantDisease::AppleBlackRot);
    assert_eq!(detector.engine().calls.get(), 1);
  }

  #[test]
  fn detector_threshold_is_configurable() {
    let detector: DiseaseDetector<_, RgbImage> =
      DiseaseDetector::new(FixedEngine::new(&[0.1, 0.3, 0.2])).with_threshold(0.25);
    let diagnosis = detector.infer(&leaf()).unwrap();
    assert_eq!(diagnosis.kind, PlantDisease::TomatoMosaicVirus);
    assert!(!diagnosis.fallback);
  }

  #[test]
  fn engine_failure_is_not_replaced_by_default() {
    let detector: DiseaseDetector<_, RgbImage> = DiseaseDetector::new(FailingEngine);
    let err = detector.infer(&leaf()).unwrap_err();
    assert!(matches!(err, DetectorError::Engine(_)));
  }

  #[test]
  fn wrong_score_count_is_an_error() {
    let detector: DiseaseDetector<_, RgbImage> =
      DiseaseDetector::new(FixedEngine::new(&[0.9, 0.1]));
    let err = detector.infer(&leaf()).unwrap_err();
    assert!(matches!(
      err,
      DetectorError::ScoreCount {
        expected: 3,
        actual: 2
      }
    ));
  }
}
