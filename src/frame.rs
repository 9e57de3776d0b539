// 该文件是 Yebing （叶病） 项目的一部分。
// src/frame.rs - 输入帧与 NHWC 浮点张量定义
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

use std::borrow::Cow;

use image::{RgbImage, imageops::FilterType};

pub const RGB_CHANNELS: usize = 3;
pub const INPUT_WIDTH: u32 = 224;
pub const INPUT_HEIGHT: u32 = 224;

/// 模型输入张量，形状 [1, 224, 224, 3]
pub type InputTensor = RgbNhwcTensor<INPUT_WIDTH, INPUT_HEIGHT>;

/// 一帧待分类的图像
#[derive(Debug, Clone)]
pub struct Frame {
  /// 解码后的 RGB 图像，尺寸任意
  pub image: RgbImage,
  /// 图像来源（通常是文件路径）
  pub origin: String,
  /// 帧索引
  pub index: u64,
}

impl Frame {
  pub fn new(image: RgbImage, origin: impl Into<String>, index: u64) -> Self {
    Self {
      image,
      origin: origin.into(),
      index,
    }
  }
}

pub trait AsRgbImage {
  fn as_rgb_image(&self) -> &RgbImage;
}

impl AsRgbImage for RgbImage {
  fn as_rgb_image(&self) -> &RgbImage {
    self
  }
}

impl AsRgbImage for Frame {
  fn as_rgb_image(&self) -> &RgbImage {
    &self.image
  }
}

/// 归一化到 [0, 1] 的 NHWC 浮点张量，批大小固定为 1
#[derive(Debug, Clone)]
pub struct RgbNhwcTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> RgbNhwcTensor<W, H> {
  pub const LEN: usize = RGB_CHANNELS * W as usize * H as usize;

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, H as usize, W as usize, RGB_CHANNELS]
  }

  pub fn as_nhwc(&self) -> &[f32] {
    &self.data
  }
}

impl<const W: u32, const H: u32> From<&RgbImage> for RgbNhwcTensor<W, H> {
  fn from(image: &RgbImage) -> Self {
    // 双线性插值拉伸到目标尺寸，不保持宽高比
    let resized = if image.dimensions() == (W, H) {
      Cow::Borrowed(image)
    } else {
      Cow::Owned(image::imageops::resize(image, W, H, FilterType::Triangle))
    };

    let mut data = Vec::with_capacity(Self::LEN);
    for pixel in resized.pixels() {
      data.push(f32::from(pixel[0]) / 255.0);
      data.push(f32::from(pixel[1]) / 255.0);
      data.push(f32::from(pixel[2]) / 255.0);
    }
    debug_assert_eq!(data.len(), Self::LEN);

    Self {
      data: data.into_boxed_slice(),
    }
  }
}

/// 将任意尺寸的 RGB 图像转换为模型输入张量
pub fn normalize(image: &RgbImage) -> InputTensor {
  InputTensor::from(image)
}
