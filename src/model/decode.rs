// 该文件是 Lensa （明眸） 项目的一部分。
// src/model/decode.rs - 模型输出张量解码
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

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{
  Candidate,
  bbox::{CenterBox, CornerBox},
  label::{ClassTable, GridScoring},
};

/// post-NMS 输出每条记录的长度 `[x1, y1, x2, y2, confidence, class_id]`
pub const POST_NMS_RECORD_LEN: usize = 6;
/// 已知的 post-NMS 记录数
pub const POST_NMS_RECORD_COUNTS: [usize; 2] = [300, 100];
/// 640 输入下原始网格的锚点数量
pub const RAW_GRID_ANCHORS: usize = 8400;

const MIN_BOX_SIDE: f32 = 0.01;
const BINARY_CLASS_SPLIT: f32 = 0.5;

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
  #[error("模型输出为空")]
  EmptyBuffer,
  #[error("模型输出格式错误: {0}")]
  Malformed(String),
  #[error("模型输出长度 {len} 与布局 {layout} 不匹配")]
  LayoutMismatch { layout: LayoutHint, len: usize },
}

/// 模型一次推理的原始输出
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutputBuffer {
  data: Box<[f32]>,
}

impl RawOutputBuffer {
  pub fn new(data: Vec<f32>) -> Result<Self, DecodeError> {
    if data.is_empty() {
      return Err(DecodeError::EmptyBuffer);
    }
    if let Some(index) = data.iter().position(|v| !v.is_finite()) {
      return Err(DecodeError::Malformed(format!(
        "第 {} 个元素不是有限数值: {}",
        index, data[index]
      )));
    }
    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }

  /// 从小端序 f32 字节流构造
  pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
    if bytes.len() % 4 != 0 {
      return Err(DecodeError::Malformed(format!(
        "字节长度 {} 不是 4 的整数倍",
        bytes.len()
      )));
    }
    let data = bytes
      .chunks_exact(4)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect();
    Self::new(data)
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

impl AsRef<[f32]> for RawOutputBuffer {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

/// 配置中指定的输出布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutHint {
  /// 按缓冲区长度推断
  #[default]
  Auto,
  PostNms,
  RawGrid,
}

impl fmt::Display for LayoutHint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LayoutHint::Auto => f.write_str("auto"),
      LayoutHint::PostNms => f.write_str("post-nms"),
      LayoutHint::RawGrid => f.write_str("raw-grid"),
    }
  }
}

/// 解析后的物理布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  /// `records` 条 `[x1, y1, x2, y2, confidence, class_id]`
  PostNms { records: usize },
  /// 按属性行转置存储的 `anchors` 个锚点
  RawGrid { anchors: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
  pub confidence_threshold: f32,
  pub input_size: u32,
  pub max_candidates: usize,
  pub layout: LayoutHint,
}

impl Default for DecoderConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: 0.25,
      input_size: 640,
      max_candidates: 20,
      layout: LayoutHint::Auto,
    }
  }
}

/// 将原始输出缓冲区解码为候选检测
#[derive(Debug, Clone)]
pub struct TensorDecoder {
  config: DecoderConfig,
  table: ClassTable,
}

impl TensorDecoder {
  pub fn new(config: DecoderConfig, table: ClassTable) -> Self {
    Self { config, table }
  }

  pub fn config(&self) -> &DecoderConfig {
    &self.config
  }

  pub fn table(&self) -> &ClassTable {
    &self.table
  }

  /// 自动推断时原始网格按 `grid_rows() × 8400` 匹配，四分类下 50400 按 post-NMS 处理
  pub fn resolve_layout(&self, len: usize) -> Result<OutputLayout, DecodeError> {
    let rows = self.table.grid_rows();
    match self.config.layout {
      LayoutHint::PostNms => {
        if len % POST_NMS_RECORD_LEN != 0 {
          warn!(
            "post-NMS 输出长度 {} 不是 {} 的整数倍，忽略末尾 {} 个元素",
            len,
            POST_NMS_RECORD_LEN,
            len % POST_NMS_RECORD_LEN
          );
        }
        Ok(OutputLayout::PostNms {
          records: len / POST_NMS_RECORD_LEN,
        })
      }
      LayoutHint::RawGrid => {
        if len == 0 || len % rows != 0 {
          return Err(DecodeError::LayoutMismatch {
            layout: LayoutHint::RawGrid,
            len,
          });
        }
        Ok(OutputLayout::RawGrid { anchors: len / rows })
      }
      LayoutHint::Auto => {
        let layout = if let Some(records) = POST_NMS_RECORD_COUNTS
          .iter()
          .copied()
          .find(|records| records * POST_NMS_RECORD_LEN == len)
        {
          OutputLayout::PostNms { records }
        } else if len == rows * RAW_GRID_ANCHORS {
          OutputLayout::RawGrid {
            anchors: RAW_GRID_ANCHORS,
          }
        } else {
          let records = len / POST_NMS_RECORD_LEN;
          warn!(
            "无法识别的输出长度 {}，按 post-NMS 布局推断 {} 条记录，模型与后处理版本可能不匹配",
            len, records
          );
          OutputLayout::PostNms { records }
        };
        debug!("根据输出长度 {} 推断布局: {:?}", len, layout);
        Ok(layout)
      }
    }
  }

  /// 解码输出，结果按置信度降序排列并截断到 `max_candidates`
  pub fn decode(&self, buffer: &RawOutputBuffer) -> Result<Vec<Candidate>, DecodeError> {
    let data = buffer.as_slice();
    if data.is_empty() {
      return Err(DecodeError::EmptyBuffer);
    }

    let mut candidates = match self.resolve_layout(data.len())? {
      OutputLayout::PostNms { records } => self.decode_post_nms(data, records),
      OutputLayout::RawGrid { anchors } => self.decode_raw_grid(data, anchors),
    };

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    if candidates.len() > self.config.max_candidates {
      debug!(
        "候选数量 {} 超过上限 {}，截断",
        candidates.len(),
        self.config.max_candidates
      );
      candidates.truncate(self.config.max_candidates);
    }

    debug!("解码得到 {} 个候选", candidates.len());
    Ok(candidates)
  }

  fn decode_post_nms(&self, data: &[f32], records: usize) -> Vec<Candidate> {
    data
      .chunks_exact(POST_NMS_RECORD_LEN)
      .take(records)
      .filter_map(|record| {
        let [x1, y1, x2, y2, confidence, class_id] = record else {
          return None;
        };
        if *confidence < self.config.confidence_threshold {
          return None;
        }
        let corners = CornerBox::new(*x1, *y1, *x2, *y2);
        if corners.is_zero() {
          return None;
        }
        let bbox = self.finish_box(corners)?;
        Some(Candidate {
          label: self.table.label_for(*class_id),
          confidence: *confidence,
          bbox,
        })
      })
      .collect()
  }

  fn decode_raw_grid(&self, data: &[f32], anchors: usize) -> Vec<Candidate> {
    let rows = self.table.grid_rows();
    let attr = |row: usize, anchor: usize| data[row * anchors + anchor];
    let mut candidates = Vec::new();

    for anchor in 0..anchors {
      let (class_idx, confidence) = match self.table.scoring() {
        GridScoring::Objectness => {
          let objectness = attr(4, anchor);
          let score = attr(5, anchor);
          if score > BINARY_CLASS_SPLIT {
            (1, objectness * score)
          } else {
            (0, objectness * (1.0 - score))
          }
        }
        GridScoring::PerClass => {
          let mut best = (0, f32::MIN);
          for class_idx in 0..rows - 4 {
            let score = attr(4 + class_idx, anchor);
            if score > best.1 {
              best = (class_idx, score);
            }
          }
          best
        }
      };

      if confidence < self.config.confidence_threshold {
        continue;
      }

      let raw = CenterBox::new(
        attr(0, anchor),
        attr(1, anchor),
        attr(2, anchor),
        attr(3, anchor),
      );
      let Some(bbox) = self.finish_box(raw.to_corners()) else {
        continue;
      };

      candidates.push(Candidate {
        label: self.table.label_for(class_idx as f32),
        confidence,
        bbox,
      });
    }

    candidates
  }

  // 归一化、裁剪、面积检查与最小边长检查
  fn finish_box(&self, corners: CornerBox) -> Option<CenterBox> {
    let bbox = corners
      .normalized(self.config.input_size as f32)
      .clamped()
      .to_center()?;
    if bbox.w < MIN_BOX_SIDE || bbox.h < MIN_BOX_SIDE {
      return None;
    }
    Some(bbox)
  }
}
