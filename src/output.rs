// 该文件是 Lensa （明眸） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::FromUrl;
#[cfg(any(feature = "save_image_file", feature = "record_output"))]
use crate::FromUrlWithScheme;
use crate::frame::Capture;
use crate::pipeline::DetectionResult;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "record_output")]
mod record;
#[cfg(feature = "record_output")]
pub use self::record::{RecordOutput, RecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "record_output")]
  #[error("筛查记录输出错误: {0}")]
  RecordOutputError(#[from] RecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper<const S: u32> {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput<S>),
  #[cfg(feature = "record_output")]
  RecordOutput(RecordOutput),
}

impl<const S: u32> FromUrl for OutputWrapper<S> {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::<S>::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "record_output")]
      RecordOutput::SCHEME => {
        let output = RecordOutput::from_url(url)?;
        Ok(OutputWrapper::RecordOutput(output))
      }
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl<const S: u32> Render<Capture<S>, DetectionResult> for OutputWrapper<S> {
  type Error = OutputError;

  #[cfg(any(feature = "save_image_file", feature = "record_output"))]
  fn render_result(&self, frame: &Capture<S>, result: &DetectionResult) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "record_output")]
      OutputWrapper::RecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }

  // 未启用任何输出时没有可构造的变体
  #[cfg(not(any(feature = "save_image_file", feature = "record_output")))]
  fn render_result(&self, _frame: &Capture<S>, _result: &DetectionResult) -> Result<(), Self::Error> {
    match *self {}
  }
}

/// 依次交给多个输出
impl<F, O, R: Render<F, O>> Render<F, O> for Vec<R> {
  type Error = R::Error;

  fn render_result(&self, frame: &F, result: &O) -> Result<(), Self::Error> {
    for output in self.iter() {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}
