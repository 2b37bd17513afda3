// 该文件是 Lensa （明眸） 项目的一部分。
// src/model/label.rs - 类别标签与类别表
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

/// 检测类别标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassLabel {
  Normal,
  Cataract,
  Immature,
  Mature,
  Nuclear,
  /// 类别表之外的类别编号
  #[serde(rename = "unknown")]
  Unknown,
}

impl ClassLabel {
  pub fn as_str(&self) -> &'static str {
    match self {
      ClassLabel::Normal => "Normal",
      ClassLabel::Cataract => "Cataract",
      ClassLabel::Immature => "Immature",
      ClassLabel::Mature => "Mature",
      ClassLabel::Nuclear => "Nuclear",
      ClassLabel::Unknown => "unknown",
    }
  }

  /// 面向用户的结论文本
  pub fn describe(&self) -> &'static str {
    match self {
      ClassLabel::Normal => "未发现异常",
      ClassLabel::Cataract => "疑似白内障",
      ClassLabel::Immature => "白内障早期",
      ClassLabel::Mature => "白内障晚期",
      ClassLabel::Nuclear => "核性白内障",
      ClassLabel::Unknown => "无法识别",
    }
  }
}

impl fmt::Display for ClassLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 原始网格输出中分数的编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridScoring {
  /// `[cx, cy, w, h, objectness, class_score]`，仅适用于二分类
  Objectness,
  /// `[cx, cy, w, h, score_0 .. score_n]`，每个类别一个分数
  PerClass,
}

#[derive(Error, Debug, PartialEq)]
pub enum ClassTableError {
  #[error("类别表缺少 Normal 类别")]
  MissingNormal,
  #[error("类别表不能包含 unknown 类别")]
  UnknownLabel,
  #[error("类别表中存在重复类别: {0}")]
  Duplicate(ClassLabel),
  #[error("严重程度列表中的类别无效: {0}")]
  InvalidSeverity(ClassLabel),
  #[error("objectness 编码要求恰好两个类别, 实际为 {0}")]
  ObjectnessArity(usize),
}

/// 模型类别表
///
/// 类别编号即 `labels` 中的下标；`severity_order` 按临床严重程度从高到低排列，
/// 只包含异常类别。
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTable {
  labels: Vec<ClassLabel>,
  severity_order: Vec<ClassLabel>,
  scoring: GridScoring,
}

impl ClassTable {
  pub fn new(
    labels: Vec<ClassLabel>,
    severity_order: Vec<ClassLabel>,
    scoring: GridScoring,
  ) -> Result<Self, ClassTableError> {
    if !labels.contains(&ClassLabel::Normal) {
      return Err(ClassTableError::MissingNormal);
    }

    for (idx, label) in labels.iter().enumerate() {
      if *label == ClassLabel::Unknown {
        return Err(ClassTableError::UnknownLabel);
      }
      if labels[..idx].contains(label) {
        return Err(ClassTableError::Duplicate(*label));
      }
    }

    for label in severity_order.iter() {
      if matches!(label, ClassLabel::Normal | ClassLabel::Unknown) || !labels.contains(label) {
        return Err(ClassTableError::InvalidSeverity(*label));
      }
    }

    if scoring == GridScoring::Objectness && labels.len() != 2 {
      return Err(ClassTableError::ObjectnessArity(labels.len()));
    }

    Ok(Self {
      labels,
      severity_order,
      scoring,
    })
  }

  /// 二分类模型: `{Normal, Cataract}`
  pub fn binary() -> Self {
    Self {
      labels: vec![ClassLabel::Normal, ClassLabel::Cataract],
      severity_order: vec![ClassLabel::Cataract],
      scoring: GridScoring::Objectness,
    }
  }

  /// 四分类模型: `{Immature, Mature, Normal, Nuclear}`
  pub fn four_class() -> Self {
    Self {
      labels: vec![
        ClassLabel::Immature,
        ClassLabel::Mature,
        ClassLabel::Normal,
        ClassLabel::Nuclear,
      ],
      severity_order: vec![ClassLabel::Mature, ClassLabel::Nuclear, ClassLabel::Immature],
      scoring: GridScoring::PerClass,
    }
  }

  pub fn labels(&self) -> &[ClassLabel] {
    &self.labels
  }

  pub fn severity_order(&self) -> &[ClassLabel] {
    &self.severity_order
  }

  pub fn scoring(&self) -> GridScoring {
    self.scoring
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  /// 原始网格输出每个锚点的属性行数
  pub fn grid_rows(&self) -> usize {
    match self.scoring {
      GridScoring::Objectness => 6,
      GridScoring::PerClass => 4 + self.labels.len(),
    }
  }

  /// 将模型输出的类别编号映射为标签，表外编号映射为 `Unknown`
  pub fn label_for(&self, class_id: f32) -> ClassLabel {
    let rounded = class_id.round();
    if rounded < 0.0 {
      return ClassLabel::Unknown;
    }
    self
      .labels
      .get(rounded as usize)
      .copied()
      .unwrap_or(ClassLabel::Unknown)
  }

  /// 位于严重程度列表中的类别视为异常
  pub fn is_abnormal(&self, label: ClassLabel) -> bool {
    self.severity_order.contains(&label)
  }
}
