// 该文件是 Lensa （明眸） 项目的一部分。
// src/pipeline.rs - 检测管线
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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  config::{ConfigError, PipelineConfig},
  frame::{Capture, TensorFrame},
  model::{
    BoxError, Candidate, ClassLabel, DecodeError, Model, Nms, RawOutputBuffer, SeverityResolver,
    TensorDecoder,
  },
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("模型推理失败: {0}")]
  Inference(#[source] BoxError),
  #[error("模型输出解码失败: {0}")]
  Decode(#[from] DecodeError),
}

/// 拍摄的是哪只眼睛
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EyeSide {
  Left,
  Right,
}

impl fmt::Display for EyeSide {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EyeSide::Left => f.write_str("left"),
      EyeSide::Right => f.write_str("right"),
    }
  }
}

/// 随原始输出一起传入的元数据
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMeta {
  pub image_ref: String,
  pub captured_at: DateTime<Utc>,
  pub eye_side: EyeSide,
}

impl ScanMeta {
  pub fn new(image_ref: impl Into<String>, eye_side: EyeSide) -> Self {
    Self {
      image_ref: image_ref.into(),
      captured_at: Utc::now(),
      eye_side,
    }
  }

  pub fn from_capture<const S: u32>(capture: &Capture<S>, eye_side: EyeSide) -> Self {
    Self {
      image_ref: capture.image_ref.clone(),
      captured_at: capture.captured_at,
      eye_side,
    }
  }
}

/// 一次完整推理的结果，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
  pub image_ref: String,
  #[serde(rename = "predictedClass")]
  pub predicted: ClassLabel,
  pub confidence: f32,
  pub detections: Box<[Candidate]>,
  pub captured_at: DateTime<Utc>,
  pub eye_side: EyeSide,
}

impl DetectionResult {
  /// 是否提示存在白内障
  pub fn is_cataract(&self) -> bool {
    self.predicted != ClassLabel::Normal
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  /// 转为持久化记录，去掉本地图像引用，附上上传后的图像地址
  pub fn to_record(&self, image_url: Option<String>) -> ScreeningRecord {
    ScreeningRecord {
      predicted_class: self.predicted,
      confidence: self.confidence,
      detections: self.detections.to_vec(),
      eye_side: self.eye_side,
      captured_at: self.captured_at,
      image_url,
    }
  }
}

/// 交给持久化层的筛查记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningRecord {
  pub predicted_class: ClassLabel,
  pub confidence: f32,
  pub detections: Vec<Candidate>,
  pub eye_side: EyeSide,
  pub captured_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
}

/// 解码 -> NMS -> 严重程度判定 -> 打包结果
///
/// 管线持有模型，模型随管线一同释放。推理失败时整体失败，不会生成替代结果。
pub struct DetectionPipeline<M> {
  model: M,
  decoder: TensorDecoder,
  nms: Option<Nms>,
  resolver: SeverityResolver,
  max_detections: usize,
}

impl<M> DetectionPipeline<M> {
  pub fn new(
    model: M,
    decoder: TensorDecoder,
    nms: Option<Nms>,
    resolver: SeverityResolver,
    max_detections: usize,
  ) -> Self {
    Self {
      model,
      decoder,
      nms,
      resolver,
      max_detections,
    }
  }

  pub fn from_config(model: M, config: &PipelineConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    let table = config.class_table.table();
    info!(
      "创建检测管线: 类别表 {:?}, 布局 {}, 置信度阈值 {}, NMS {:?}",
      config.class_table, config.layout, config.confidence_threshold, config.nms
    );
    Ok(Self::new(
      model,
      TensorDecoder::new(config.decoder_config(), table.clone()),
      config.nms.map(Nms::new),
      SeverityResolver::new(table, config.abnormal_threshold),
      config.max_detections,
    ))
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn decoder(&self) -> &TensorDecoder {
    &self.decoder
  }

  /// 对一次推理的原始输出做后处理
  pub fn process(
    &self,
    output: &RawOutputBuffer,
    meta: ScanMeta,
  ) -> Result<DetectionResult, DecodeError> {
    let candidates = self.decoder.decode(output)?;
    let candidates = match &self.nms {
      Some(nms) => nms.suppress(&candidates),
      None => candidates,
    };

    let verdict = self.resolver.resolve(&candidates);
    let detections: Box<[Candidate]> = candidates
      .into_iter()
      .take(self.max_detections)
      .collect();

    info!(
      "判定结果: {} ({:.2}%), 保留 {} 个检测",
      verdict.label,
      verdict.confidence * 100.0,
      detections.len()
    );
    debug!("检测结果: {:?}", detections);

    Ok(DetectionResult {
      image_ref: meta.image_ref,
      predicted: verdict.label,
      confidence: verdict.confidence,
      detections,
      captured_at: meta.captured_at,
      eye_side: meta.eye_side,
    })
  }

  /// 推理并后处理一次拍摄
  pub fn run<const S: u32>(
    &self,
    capture: &Capture<S>,
    eye_side: EyeSide,
  ) -> Result<DetectionResult, PipelineError>
  where
    M: Model<Input = TensorFrame<S>>,
    M::Error: Into<BoxError>,
  {
    debug!("执行模型推理: {}", capture.image_ref);
    let now = std::time::Instant::now();
    let output = self.model.infer(&capture.frame).map_err(|e| {
      let e = e.into();
      error!("模型推理失败: {}", e);
      PipelineError::Inference(e)
    })?;
    debug!(
      "推理完成，耗时: {:.2?}, 输出长度 {}",
      now.elapsed(),
      output.len()
    );

    Ok(self.process(&output, ScanMeta::from_capture(capture, eye_side))?)
  }
}
