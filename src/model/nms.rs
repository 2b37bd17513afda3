// 该文件是 Lensa （明眸） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{
  Candidate,
  bbox::iou,
  label::ClassLabel,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NmsConfig {
  /// IoU 不超过该值的同类框才会被保留
  pub iou_threshold: f32,
  pub max_per_class: usize,
}

impl Default for NmsConfig {
  fn default() -> Self {
    Self {
      iou_threshold: 0.4,
      max_per_class: 3,
    }
  }
}

/// 按类别独立进行的贪心非极大值抑制
#[derive(Debug, Clone, Default)]
pub struct Nms {
  config: NmsConfig,
}

impl Nms {
  pub fn new(config: NmsConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &NmsConfig {
    &self.config
  }

  /// 返回按置信度降序排列的保留候选，同分候选保持输入中的相对顺序
  pub fn suppress(&self, candidates: &[Candidate]) -> Vec<Candidate> {
    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    // 稳定排序
    ordered.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<(ClassLabel, Vec<&Candidate>)> = Vec::new();
    let mut result = Vec::new();

    for candidate in ordered {
      let slot = match kept.iter().position(|(label, _)| *label == candidate.label) {
        Some(idx) => idx,
        None => {
          kept.push((candidate.label, Vec::new()));
          kept.len() - 1
        }
      };
      let class_kept = &mut kept[slot].1;

      if class_kept.len() >= self.config.max_per_class {
        continue;
      }
      let overlaps = class_kept
        .iter()
        .any(|k| iou(&k.bbox, &candidate.bbox) > self.config.iou_threshold);
      if overlaps {
        continue;
      }

      class_kept.push(candidate);
      result.push(candidate.clone());
    }

    debug!("NMS: {} -> {} 个候选", candidates.len(), result.len());
    result
  }
}
