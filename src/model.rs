// 该文件是 Lensa （明眸） 项目的一部分。
// src/model.rs - 模型
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

use std::error::Error as StdError;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::{frame::TensorFrame, input::AsNhwcTensor};

pub mod bbox;
pub mod decode;
pub mod label;
pub mod nms;
pub mod severity;

mod raw_dump;
pub use self::raw_dump::{RawDumpBuilder, RawDumpError, RawDumpModel};

pub use self::bbox::{CenterBox, CornerBox, DisplayRect, iou};
pub use self::decode::{
  DecodeError, DecoderConfig, LayoutHint, OutputLayout, RawOutputBuffer, TensorDecoder,
};
pub use self::label::{ClassLabel, ClassTable, ClassTableError, GridScoring};
pub use self::nms::{Nms, NmsConfig};
pub use self::severity::{SeverityResolver, Verdict};

/// 推理运行时，对检测管线而言是不透明的 `输入 -> 原始输出`
pub trait Model {
  type Input;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<RawOutputBuffer, Self::Error>;
}

/// 一个候选检测，`bbox` 为中心形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
  #[serde(rename = "class")]
  pub label: ClassLabel,
  pub confidence: f32,
  pub bbox: CenterBox,
}

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// 将闭包包装为模型，用于注入外部运行时
pub struct FnModel<const S: u32, F> {
  infer: F,
  _phantom: PhantomData<TensorFrame<S>>,
}

impl<const S: u32, F, E> FnModel<S, F>
where
  F: Fn(&[f32]) -> Result<Vec<f32>, E>,
  E: Into<BoxError>,
{
  pub fn new(infer: F) -> Self {
    Self {
      infer,
      _phantom: PhantomData,
    }
  }
}

impl<const S: u32, F, E> Model for FnModel<S, F>
where
  F: Fn(&[f32]) -> Result<Vec<f32>, E>,
  E: Into<BoxError>,
{
  type Input = TensorFrame<S>;
  type Error = BoxError;

  fn infer(&self, input: &Self::Input) -> Result<RawOutputBuffer, Self::Error> {
    let output = (self.infer)(input.as_nhwc()).map_err(Into::into)?;
    Ok(RawOutputBuffer::new(output)?)
  }
}
