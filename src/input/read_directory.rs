// 该文件是 Yebing （叶病） 项目的一部分。
// src/input/read_directory.rs - 目录批量图像输入
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

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{has_image_extension, read_image_file::load_rgb_image},
  url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("不是目录: {0}")]
  NotADirectory(String),
}

/// 按文件名顺序逐张读取目录中的图片
///
/// 无法解码的文件会被跳过，不会中断后续图片。
pub struct DirectoryInput {
  files: std::vec::IntoIter<PathBuf>,
  index: u64,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }

    Self::open(&url_path(url)?)
  }
}

impl DirectoryInput {
  pub fn open(path: &str) -> Result<Self, DirectoryInputError> {
    let directory = PathBuf::from(path);
    if !directory.is_dir() {
      return Err(DirectoryInputError::NotADirectory(path.to_string()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if path.is_file() && has_image_extension(&path) {
        files.push(path);
      } else {
        debug!("忽略非图片文件: {}", path.display());
      }
    }
    files.sort();
    info!("目录 {} 中共有 {} 张图片", directory.display(), files.len());

    Ok(DirectoryInput {
      files: files.into_iter(),
      index: 0,
    })
  }
}

impl Iterator for DirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      let origin = path.to_string_lossy().into_owned();
      match load_rgb_image(&origin) {
        Ok(image) => {
          let frame = Frame::new(image, origin, self.index);
          self.index += 1;
          return Some(frame);
        }
        Err(e) => {
          warn!("跳过无法读取的图片 {}: {}", origin, e);
        }
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn reads_images_in_name_order_and_skips_broken() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))
      .save(dir.path().join("b.png"))
      .unwrap();
    RgbImage::from_pixel(8, 2, Rgb([4, 5, 6]))
      .save(dir.path().join("a.png"))
      .unwrap();
    std::fs::write(dir.path().join("c.jpg"), b"garbage").unwrap();
    std::fs::write(dir.path().join("readme.txt"), b"hello").unwrap();

    let frames: Vec<Frame> = DirectoryInput::open(&dir.path().to_string_lossy())
      .unwrap()
      .collect();

    assert_eq!(frames.len(), 2);
    assert!(frames[0].origin.ends_with("a.png"));
    assert_eq!(frames[0].image.dimensions(), (8, 2));
    assert_eq!(frames[0].index, 0);
    assert!(frames[1].origin.ends_with("b.png"));
    assert_eq!(frames[1].index, 1);
  }

  #[test]
  fn directory_with_space_opens_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let leaves = dir.path().join("field photos");
    std::fs::create_dir(&leaves).unwrap();
    RgbImage::new(3, 3).save(leaves.join("a.png")).unwrap();

    let url = Url::parse(&format!("folder://{}", leaves.display())).unwrap();
    let frames: Vec<Frame> = DirectoryInput::from_url(&url).unwrap().collect();
    assert_eq!(frames.len(), 1);
  }

  #[test]
  fn file_path_is_not_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leaf.png");
    std::fs::write(&path, b"x").unwrap();
    assert!(matches!(
      DirectoryInput::open(&path.to_string_lossy()),
      Err(DirectoryInputError::NotADirectory(_))
    ));
  }
}
