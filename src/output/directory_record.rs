// 该文件是 Yebing （叶病） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::Diagnosis,
  output::{Render, diagnosis_record},
  url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
}

/// 按日期分目录保存输入图像与结果
///
/// `folder:///records` 记录全部结果；
/// `folder:///records?confident` 跳过未超过阈值的默认结果。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: AtomicU64,
  confident_only: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let confident_only = uri.query_pairs().any(|(k, _)| k == "confident");

    Ok(DirectoryRecordOutput::new(url_path(uri)?).with_confident_only(confident_only))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      frame_counter: AtomicU64::new(0),
      confident_only: false,
    }
  }

  pub fn with_confident_only(mut self, confident_only: bool) -> Self {
    self.confident_only = confident_only;
    self
  }

  fn frame_id(&self) -> u64 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1
  }

  /// 返回不带扩展名的记录路径
  fn record_stem(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:08X}",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<Frame, Diagnosis> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &Diagnosis) -> Result<(), Self::Error> {
    if self.confident_only && result.fallback {
      debug!("跳过默认结果: {}", frame.origin);
      return Ok(());
    }

    let stem = self.record_stem()?;
    let image_path = stem.with_extension("png");
    let record_path = stem.with_extension("json");

    frame.image.save(&image_path)?;
    let mut record = diagnosis_record(frame, result);
    record["image"] = serde_json::Value::from(image_path.to_string_lossy().into_owned());
    std::fs::write(&record_path, serde_json::to_vec_pretty(&record)?)?;

    info!("记录结果: {}", record_path.display());
    Ok(())
  }
}
