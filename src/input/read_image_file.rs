// 该文件是 Lensa （明眸） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入与预处理
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

use image::{ImageReader, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Capture, TensorFrame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单张图像文件输入，读取后缩放为 S×S 并归一化
pub struct ImageFileInput<const S: u32> {
  path: String,
  image: Option<RgbImage>,
}

impl<const S: u32> FromUrlWithScheme for ImageFileInput<S> {
  const SCHEME: &'static str = "image";
}

impl<const S: u32> FromUrl for ImageFileInput<S> {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    Self::open(url.path())
  }
}

impl<const S: u32> ImageFileInput<S> {
  pub fn open(path: &str) -> Result<Self, ImageFileInputError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    debug!("读取图像 {}: {}x{}", path, image.width(), image.height());

    Ok(ImageFileInput {
      path: path.to_string(),
      image: Some(image.into_rgb8()),
    })
  }

  pub fn path(&self) -> &str {
    &self.path
  }
}

impl<const S: u32> Iterator for ImageFileInput<S> {
  type Item = Capture<S>;

  fn next(&mut self) -> Option<Self::Item> {
    let image = self.image.take()?;
    Some(Capture::new(self.path.clone(), preprocess::<S>(&image)))
  }
}

/// 缩放到 S×S，按 HWC 排列并将通道值归一化到 `[0, 1]`
pub fn preprocess<const S: u32>(image: &RgbImage) -> TensorFrame<S> {
  let resized = image::imageops::resize(image, S, S, FilterType::Triangle);

  let mut frame = TensorFrame::<S>::default();
  for (dst, src) in frame.as_mut().iter_mut().zip(resized.as_raw().iter()) {
    *dst = *src as f32 / 255.0;
  }
  frame
}
