// 该文件是 Lensa （明眸） 项目的一部分。
// src/bin/inspect_output.rs - 逐步查看模型原始输出的解码结果
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

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::info;

use lensa::{
  config::{ClassTableKind, PipelineConfig},
  model::{LayoutHint, Nms, RawOutputBuffer, SeverityResolver, TensorDecoder},
};

/// 解码一次推理的原始输出 (小端序 f32)，打印各阶段结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 原始输出文件
  #[arg(value_name = "DUMP")]
  pub dump: PathBuf,
  /// JSON 配置文件
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
  #[arg(long, value_enum)]
  pub class_table: Option<ClassTableKind>,
  #[arg(long, value_enum)]
  pub layout: Option<LayoutHint>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let mut config = match &args.config {
    Some(path) => PipelineConfig::from_json_file(path)?,
    None => PipelineConfig::default(),
  };
  if let Some(class_table) = args.class_table {
    config.class_table = class_table;
  }
  if let Some(layout) = args.layout {
    config.layout = layout;
  }
  config.validate()?;

  info!("读取原始输出: {}", args.dump.display());
  let buffer = RawOutputBuffer::from_le_bytes(&std::fs::read(&args.dump)?)?;

  let table = config.class_table.table();
  let decoder = TensorDecoder::new(config.decoder_config(), table.clone());
  let layout = decoder.resolve_layout(buffer.len())?;
  let decoded = decoder.decode(&buffer)?;
  let kept = match config.nms {
    Some(nms) => Nms::new(nms).suppress(&decoded),
    None => decoded.clone(),
  };
  let verdict = SeverityResolver::new(table, config.abnormal_threshold).resolve(&kept);

  let report = json!({
    "length": buffer.len(),
    "layout": format!("{:?}", layout),
    "decoded": decoded,
    "kept": kept,
    "verdict": {
      "predictedClass": verdict.label,
      "confidence": verdict.confidence,
      "isCataract": verdict.is_cataract(),
    },
  });
  println!("{}", serde_json::to_string_pretty(&report)?);

  Ok(())
}
