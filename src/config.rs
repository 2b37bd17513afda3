// 该文件是 Lensa （明眸） 项目的一部分。
// src/config.rs - 检测管线配置
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::{ClassTable, DecoderConfig, LayoutHint, NmsConfig};

/// 结果中最多保留的检测数量
pub const MAX_DETECTIONS: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("配置项 {name} 超出范围: {value}")]
  OutOfRange { name: &'static str, value: String },
}

/// 模型变体对应的类别表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ClassTableKind {
  Binary,
  #[default]
  FourClass,
}

impl ClassTableKind {
  pub fn table(&self) -> ClassTable {
    match self {
      ClassTableKind::Binary => ClassTable::binary(),
      ClassTableKind::FourClass => ClassTable::four_class(),
    }
  }
}

/// 检测管线的全部可调参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  pub class_table: ClassTableKind,
  pub layout: LayoutHint,
  pub input_size: u32,
  pub confidence_threshold: f32,
  pub max_candidates: usize,
  /// `None` 时跳过 NMS，直接对解码结果做判定
  pub nms: Option<NmsConfig>,
  pub abnormal_threshold: f32,
  /// 结果中保留的检测数量
  pub max_detections: usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    let decoder = DecoderConfig::default();
    Self {
      class_table: ClassTableKind::default(),
      layout: decoder.layout,
      input_size: decoder.input_size,
      confidence_threshold: decoder.confidence_threshold,
      max_candidates: decoder.max_candidates,
      nms: Some(NmsConfig::default()),
      abnormal_threshold: 0.25,
      max_detections: 5,
    }
  }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
  if !(0.0..=1.0).contains(&value) {
    return Err(ConfigError::OutOfRange {
      name,
      value: value.to_string(),
    });
  }
  Ok(())
}

fn check_count(name: &'static str, value: usize, max: usize) -> Result<(), ConfigError> {
  if value == 0 || value > max {
    return Err(ConfigError::OutOfRange {
      name,
      value: value.to_string(),
    });
  }
  Ok(())
}

impl PipelineConfig {
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("读取配置文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let config: PipelineConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    check_unit("confidence_threshold", self.confidence_threshold)?;
    check_unit("abnormal_threshold", self.abnormal_threshold)?;
    check_count("input_size", self.input_size as usize, usize::MAX)?;
    check_count("max_candidates", self.max_candidates, usize::MAX)?;
    check_count("max_detections", self.max_detections, MAX_DETECTIONS)?;
    if let Some(nms) = &self.nms {
      check_unit("nms.iou_threshold", nms.iou_threshold)?;
      check_count("nms.max_per_class", nms.max_per_class, usize::MAX)?;
    }
    Ok(())
  }

  pub fn decoder_config(&self) -> DecoderConfig {
    DecoderConfig {
      confidence_threshold: self.confidence_threshold,
      input_size: self.input_size,
      max_candidates: self.max_candidates,
      layout: self.layout,
    }
  }
}
