// 该文件是 Lensa （明眸） 项目的一部分。
// src/model/raw_dump.rs - 回放已记录的模型输出
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::TensorFrame,
  model::{DecodeError, Model, RawOutputBuffer},
};

/// 回放一次推理的原始输出（小端序 f32 文件），用于离线复现与调试
pub struct RawDumpModel<const S: u32> {
  path: String,
  output: RawOutputBuffer,
}

#[derive(Error, Debug)]
pub enum RawDumpError {
  #[error("模型输出文件读取错误: {0}")]
  LoadError(#[from] std::io::Error),
  #[error("模型输出无效: {0}")]
  Invalid(#[from] DecodeError),
  #[error("模型路径错误: {0}")]
  PathError(String),
  #[error("期望输出长度 {expected}, 实际为 {actual}")]
  UnexpectedLength { expected: usize, actual: usize },
}

pub struct RawDumpBuilder {
  path: String,
  expected_len: Option<usize>,
}

impl FromUrlWithScheme for RawDumpBuilder {
  const SCHEME: &'static str = "raw";
}

impl FromUrl for RawDumpBuilder {
  type Error = RawDumpError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RawDumpError::PathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = RawDumpBuilder::new(url.path());
    for (k, v) in url.query_pairs() {
      if k == "len" {
        let len = v
          .parse()
          .map_err(|_| RawDumpError::PathError(format!("无效的 len 参数: {}", v)))?;
        builder = builder.expected_len(len);
      }
    }
    Ok(builder)
  }
}

impl RawDumpBuilder {
  pub fn new(path: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      expected_len: None,
    }
  }

  pub fn expected_len(mut self, len: usize) -> Self {
    self.expected_len = Some(len);
    self
  }

  pub fn build<const S: u32>(self) -> Result<RawDumpModel<S>, RawDumpError> {
    info!("加载模型输出文件: {}", self.path);
    let bytes = std::fs::read(&self.path)?;
    debug!(
      "模型输出文件大小: {:.2} KB",
      bytes.len() as f64 / 1024.0
    );

    let output = RawOutputBuffer::from_le_bytes(&bytes)?;
    if let Some(expected) = self.expected_len
      && expected != output.len()
    {
      return Err(RawDumpError::UnexpectedLength {
        expected,
        actual: output.len(),
      });
    }

    info!("模型输出加载完成, 共 {} 个数值", output.len());
    Ok(RawDumpModel {
      path: self.path,
      output,
    })
  }
}

impl<const S: u32> Model for RawDumpModel<S> {
  type Input = TensorFrame<S>;
  type Error = RawDumpError;

  fn infer(&self, _input: &Self::Input) -> Result<RawOutputBuffer, Self::Error> {
    debug!("回放模型输出: {}", self.path);
    Ok(self.output.clone())
  }
}

impl<const S: u32> Drop for RawDumpModel<S> {
  fn drop(&mut self) {
    debug!("释放模型: {}", self.path);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dump(values: &[f32]) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(file.path(), bytes).unwrap();
    file
  }

  #[test]
  fn replays_recorded_output() {
    let file = dump(&[0.1, 0.1, 0.3, 0.3, 0.9, 1.0]);
    let model = RawDumpBuilder::new(file.path().to_str().unwrap())
      .build::<4>()
      .unwrap();
    let output = model.infer(&TensorFrame::default()).unwrap();
    assert_eq!(output.as_slice(), &[0.1, 0.1, 0.3, 0.3, 0.9, 1.0]);
  }

  #[test]
  fn length_query_is_enforced() {
    let file = dump(&[0.0; 12]);
    let url = Url::parse(&format!("raw://{}?len=1800", file.path().display())).unwrap();
    let err = RawDumpBuilder::from_url(&url)
      .unwrap()
      .build::<4>()
      .err()
      .unwrap();
    assert!(matches!(
      err,
      RawDumpError::UnexpectedLength {
        expected: 1800,
        actual: 12
      }
    ));
  }

  #[test]
  fn empty_dump_is_invalid() {
    let file = dump(&[]);
    assert!(matches!(
      RawDumpBuilder::new(file.path().to_str().unwrap()).build::<4>(),
      Err(RawDumpError::Invalid(DecodeError::EmptyBuffer))
    ));
  }
}
