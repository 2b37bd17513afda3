// 该文件是 Lensa （明眸） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use lensa::{
  FromUrlWithScheme,
  config::{ClassTableKind, ConfigError, PipelineConfig},
  model::{LayoutHint, NmsConfig, RawDumpBuilder},
  pipeline::EyeSide,
};

/// Lensa 白内障筛查
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型，例如 raw:///data/output.bin?len=1800
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///data/eye.jpg，可重复指定
  #[arg(long, value_name = "SOURCE", required = true)]
  pub input: Vec<Url>,
  /// 输出，例如 record:///data/history 或 image:///tmp/overlay.png，可重复指定
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,
  /// 拍摄的眼睛
  #[arg(long, value_enum)]
  pub eye: EyeSide,

  /// JSON 配置文件，命令行参数优先
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
  #[arg(long, value_enum)]
  pub class_table: Option<ClassTableKind>,
  #[arg(long, value_enum)]
  pub layout: Option<LayoutHint>,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,
  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub nms_threshold: Option<f32>,
  /// 跳过 NMS
  #[arg(long, conflicts_with = "nms_threshold")]
  pub no_nms: bool,
  /// 异常类别覆盖判定的置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub abnormal_threshold: Option<f32>,
  /// 结果中保留的检测数量
  #[arg(long, value_name = "COUNT")]
  pub max_detections: Option<usize>,

  /// 最多处理的图像数量
  #[arg(long, value_name = "COUNT")]
  pub limit: Option<usize>,
  /// 以 JSON 输出结果
  #[arg(long)]
  pub json: bool,
}

impl Args {
  /// 模型是否为回放的原始输出，此时结论与输入图像无关
  pub fn is_replay(&self) -> bool {
    self.model.scheme() == RawDumpBuilder::SCHEME
  }

  /// 回放模型只能对应一张输入图像
  pub fn check_inputs(&self) -> anyhow::Result<()> {
    if self.is_replay() && self.input.len() > 1 {
      anyhow::bail!(
        "{} 模型回放同一份输出，不能用于 {} 张输入图像",
        RawDumpBuilder::SCHEME,
        self.input.len()
      );
    }
    Ok(())
  }

  /// 读取配置文件并叠加命令行参数
  pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
    let mut config = match &self.config {
      Some(path) => PipelineConfig::from_json_file(path)?,
      None => PipelineConfig::default(),
    };

    if let Some(class_table) = self.class_table {
      config.class_table = class_table;
    }
    if let Some(layout) = self.layout {
      config.layout = layout;
    }
    if let Some(confidence) = self.confidence {
      config.confidence_threshold = confidence;
    }
    if let Some(abnormal) = self.abnormal_threshold {
      config.abnormal_threshold = abnormal;
    }
    if let Some(max_detections) = self.max_detections {
      config.max_detections = max_detections;
    }
    if self.no_nms {
      config.nms = None;
    } else if let Some(iou_threshold) = self.nms_threshold {
      let nms = config.nms.get_or_insert_with(NmsConfig::default);
      nms.iou_threshold = iou_threshold;
    }

    config.validate()?;
    Ok(config)
  }
}
