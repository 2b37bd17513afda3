// 该文件是 Lensa （明眸） 项目的一部分。
// src/output/save_image_file.rs - 保存带检测框的图像
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

use std::{marker::PhantomData, path::Path};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Capture,
  output::{
    Render,
    draw::{Draw, ToRgbImage},
  },
  pipeline::DetectionResult,
};

pub struct SaveImageFileOutput<const S: u32> {
  path: String,
  draw: Draw,
  _phantom: PhantomData<Capture<S>>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的参数 {key}: {value}")]
  InvalidQuery { key: String, value: String },
}

impl<const S: u32> FromUrlWithScheme for SaveImageFileOutput<S> {
  const SCHEME: &'static str = "image";
}

impl<const S: u32> FromUrl for SaveImageFileOutput<S> {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut draw = Draw::default();
    for (k, v) in uri.query_pairs() {
      if k == "thickness" {
        let thickness = v.parse().map_err(|_| SaveImageFileError::InvalidQuery {
          key: k.to_string(),
          value: v.to_string(),
        })?;
        draw = draw.with_thickness(thickness);
      }
    }

    Ok(SaveImageFileOutput {
      path: uri.path().to_string(),
      draw,
      _phantom: PhantomData,
    })
  }
}

impl<const S: u32> SaveImageFileOutput<S> {
  pub fn path(&self) -> &str {
    &self.path
  }

  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    info!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

impl<const S: u32> Render<Capture<S>, DetectionResult> for SaveImageFileOutput<S> {
  type Error = SaveImageFileError;

  fn render_result(
    &self,
    capture: &Capture<S>,
    result: &DetectionResult,
  ) -> Result<(), Self::Error> {
    let mut image = capture.frame.to_rgb_image();
    self
      .draw
      .draw_detections_on_image(&mut image, &result.detections);
    self.save_image(image)
  }
}
