// 该文件是 Lensa （明眸） 项目的一部分。
// src/main.rs - 筛查主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use lensa::{
  FromUrl,
  input::ImageFileInput,
  model::RawDumpBuilder,
  output::OutputWrapper,
  pipeline::{DetectionPipeline, DetectionResult},
  task::{BatchTask, OneShotTask, Task},
};

const INPUT_SIZE: u32 = 640;

fn print_result(result: &DetectionResult) {
  println!(
    "{} [{}] {} ({}, 置信度 {:.1}%)",
    result.image_ref,
    result.eye_side,
    result.predicted.describe(),
    result.predicted,
    result.confidence * 100.0
  );
  for det in result.detections.iter() {
    println!(
      "  - {}: {:.2}% at ({:.3}, {:.3}, {:.3}x{:.3})",
      det.label,
      det.confidence * 100.0,
      det.bbox.cx,
      det.bbox.cy,
      det.bbox.w,
      det.bbox.h
    );
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let config = args.pipeline_config()?;
  args.check_inputs()?;

  info!("模型: {}", args.model);
  info!("输入来源: {} 个", args.input.len());
  for output in args.output.iter() {
    info!("输出: {}", output);
  }
  if config.input_size != INPUT_SIZE {
    warn!(
      "配置的输入尺寸 {} 与预处理尺寸 {} 不一致",
      config.input_size, INPUT_SIZE
    );
  }

  if args.is_replay() {
    warn!("模型为原始输出回放，筛查结论来自回放数据，并非由输入图像推理得到");
  }
  let model = RawDumpBuilder::from_url(&args.model)?.build::<INPUT_SIZE>()?;
  let pipeline = DetectionPipeline::from_config(model, &config)?;

  let inputs = args
    .input
    .iter()
    .map(ImageFileInput::<INPUT_SIZE>::from_url)
    .collect::<Result<Vec<_>, _>>()?;
  let outputs = args
    .output
    .iter()
    .map(OutputWrapper::<INPUT_SIZE>::from_url)
    .collect::<Result<Vec<_>, _>>()?;

  let results = if inputs.len() == 1 {
    let result =
      OneShotTask::new(args.eye).run_task(inputs.into_iter().flatten(), &pipeline, outputs)?;
    vec![result]
  } else {
    BatchTask::new(args.eye)
      .with_limit(args.limit)
      .run_task(inputs.into_iter().flatten(), &pipeline, outputs)?
  };

  if args.json {
    println!("{}", serde_json::to_string_pretty(&results)?);
  } else {
    results.iter().for_each(print_result);
  }

  Ok(())
}
