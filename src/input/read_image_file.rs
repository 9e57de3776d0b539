// 该文件是 Yebing （叶病） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, url_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Path decoding error: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("Empty image: {0}")]
  EmptyImage(String),
}

/// 单张图片输入，只产生一帧
pub struct ImageFileInput {
  path: String,
  image: Option<RgbImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Self::open(&url_path(url)?)
  }
}

impl ImageFileInput {
  pub fn open(path: &str) -> Result<Self, ImageFileInputError> {
    let image = load_rgb_image(path)?;
    info!("读取图片: {} ({}x{})", path, image.width(), image.height());

    Ok(ImageFileInput {
      path: path.to_string(),
      image: Some(image),
    })
  }
}

/// 解码图片并转换为 RGB8，拒绝 0 像素的图片
pub(crate) fn load_rgb_image(path: &str) -> Result<RgbImage, ImageFileInputError> {
  let image = ImageReader::open(path)?
    .with_guessed_format()?
    .decode()?
    .to_rgb8();

  if image.width() == 0 || image.height() == 0 {
    return Err(ImageFileInputError::EmptyImage(path.to_string()));
  }

  Ok(image)
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self
      .image
      .take()
      .map(|image| Frame::new(image, self.path.clone(), 0))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn yields_exactly_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leaf.png");
    RgbImage::from_pixel(12, 9, Rgb([10, 200, 30]))
      .save(&path)
      .unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&url.as_str().replacen("file", "image", 1)).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();

    let frame = input.next().unwrap();
    assert_eq!(frame.image.dimensions(), (12, 9));
    assert_eq!(frame.index, 0);
    assert!(frame.origin.ends_with("leaf.png"));
    assert!(input.next().is_none());
  }

  #[test]
  fn file_name_with_space_opens_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("my leaf.png");
    RgbImage::new(4, 4).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    assert!(input.next().unwrap().origin.ends_with("my leaf.png"));
  }

  #[test]
  fn corrupt_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, b"not an image").unwrap();

    let result = ImageFileInput::open(&path.to_string_lossy());
    assert!(result.is_err());
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("folder:///tmp/leaves").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }
}
