// 该文件是 Lensa （明眸） 项目的一部分。
// src/model/severity.rs - 严重程度判定
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

use tracing::{debug, warn};

use crate::model::{
  Candidate,
  label::{ClassLabel, ClassTable},
};

/// 综合判定结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
  pub label: ClassLabel,
  pub confidence: f32,
}

impl Verdict {
  pub fn is_cataract(&self) -> bool {
    self.label != ClassLabel::Normal
  }
}

#[derive(Debug, Default, Clone, Copy)]
struct ClassStat {
  count: usize,
  max_confidence: Option<f32>,
}

/// 将候选列表归约为单一临床结论
///
/// 先按出现次数取众数（同票时取类别表中靠前的类别），只要存在置信度高于
/// `abnormal_threshold` 的异常检测，就按严重程度顺序选出第一个出现过的异常类别。
#[derive(Debug, Clone)]
pub struct SeverityResolver {
  table: ClassTable,
  abnormal_threshold: f32,
}

impl SeverityResolver {
  pub fn new(table: ClassTable, abnormal_threshold: f32) -> Self {
    Self {
      table,
      abnormal_threshold,
    }
  }

  pub fn table(&self) -> &ClassTable {
    &self.table
  }

  /// `Unknown` 不在严重程度顺序中，不参与计数，也不会触发覆盖
  pub fn resolve(&self, candidates: &[Candidate]) -> Verdict {
    let labels = self.table.labels();
    let mut stats = vec![ClassStat::default(); labels.len()];

    for candidate in candidates {
      let Some(idx) = labels.iter().position(|l| *l == candidate.label) else {
        continue;
      };
      let stat = &mut stats[idx];
      stat.count += 1;
      stat.max_confidence = Some(
        stat
          .max_confidence
          .map_or(candidate.confidence, |m| m.max(candidate.confidence)),
      );
    }

    let mut dominant = ClassLabel::Normal;
    let mut best_count = 0;
    for (label, stat) in labels.iter().zip(stats.iter()) {
      if stat.count > best_count {
        best_count = stat.count;
        dominant = *label;
      }
    }

    let has_abnormal = candidates
      .iter()
      .any(|c| self.table.is_abnormal(c.label) && c.confidence > self.abnormal_threshold);
    if has_abnormal {
      let stat_of = |label: &ClassLabel| {
        labels
          .iter()
          .position(|l| l == label)
          .map(|idx| stats[idx])
          .unwrap_or_default()
      };
      if let Some(severe) = self
        .table
        .severity_order()
        .iter()
        .find(|label| stat_of(*label).count > 0)
      {
        if *severe != dominant {
          debug!("严重程度覆盖: {} -> {}", dominant, severe);
        }
        dominant = *severe;
      }
    }

    let dominant_max = labels
      .iter()
      .position(|l| *l == dominant)
      .and_then(|idx| stats[idx].max_confidence);
    let confidence = match dominant_max {
      Some(confidence) => confidence,
      None => {
        if !candidates.is_empty() {
          warn!("判定类别 {} 没有记录最大置信度，退回全局最大值", dominant);
        }
        candidates
          .iter()
          .map(|c| c.confidence)
          .fold(0.0, f32::max)
      }
    };

    Verdict {
      label: dominant,
      confidence,
    }
  }
}
