// 该文件是 Lensa （明眸） 项目的一部分。
// src/frame.rs - 模型输入帧定义
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

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::input::AsNhwcTensor;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// S×S 的 RGB 张量，HWC 排列，通道值归一化到 `[0, 1]`
#[derive(Debug, Clone)]
pub struct TensorFrame<const S: u32> {
  data: Box<[f32]>,
}

impl<const S: u32> TensorFrame<S> {
  pub const LEN: usize = RGB_CHANNELS * S as usize * S as usize;

  pub fn side(&self) -> usize {
    S as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }
}

impl<const S: u32> TryFrom<Vec<f32>> for TensorFrame<S> {
  type Error = FrameError;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(FrameError::LengthMismatch {
        expected: Self::LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const S: u32> Default for TensorFrame<S> {
  fn default() -> Self {
    Self {
      data: vec![0.0f32; Self::LEN].into_boxed_slice(),
    }
  }
}

impl<const S: u32> AsMut<[f32]> for TensorFrame<S> {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

impl<const S: u32> AsNhwcTensor<S> for TensorFrame<S> {
  fn as_nhwc(&self) -> &[f32] {
    &self.data
  }
}

/// 一次拍摄：模型输入以及原图引用和拍摄时间
#[derive(Debug, Clone)]
pub struct Capture<const S: u32> {
  pub image_ref: String,
  pub captured_at: DateTime<Utc>,
  pub frame: TensorFrame<S>,
}

impl<const S: u32> Capture<S> {
  pub fn new(image_ref: impl Into<String>, frame: TensorFrame<S>) -> Self {
    Self {
      image_ref: image_ref.into(),
      captured_at: Utc::now(),
      frame,
    }
  }
}
