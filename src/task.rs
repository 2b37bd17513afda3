// 该文件是 Lensa （明眸） 项目的一部分。
// src/task.rs - 筛查任务
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

use tracing::{info, warn};

use crate::{
  frame::{Capture, TensorFrame},
  model::{BoxError, Model},
  output::Render,
  pipeline::{DetectionPipeline, DetectionResult, EyeSide},
};

pub trait Task<I, P, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, pipeline: P, output: O) -> Result<Self::Output, Self::Error>;
}

/// 只处理输入中的第一张图像
pub struct OneShotTask {
  eye_side: EyeSide,
}

impl OneShotTask {
  pub fn new(eye_side: EyeSide) -> Self {
    Self { eye_side }
  }
}

impl<const S: u32, M, RE, I, O> Task<I, &DetectionPipeline<M>, O> for OneShotTask
where
  M: Model<Input = TensorFrame<S>>,
  M::Error: Into<BoxError>,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Capture<S>>,
  O: Render<Capture<S>, DetectionResult, Error = RE>,
{
  type Output = DetectionResult;
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    pipeline: &DetectionPipeline<M>,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let capture = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始筛查: {}", capture.image_ref);
    let now = std::time::Instant::now();
    let result = pipeline.run(&capture, self.eye_side)?;
    info!("筛查完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&capture, &result)?;
    info!("输出完成");

    Ok(result)
  }
}

/// 依次处理输入中的每张图像，单张失败时记录并继续
#[derive(Debug)]
pub struct BatchTask {
  eye_side: EyeSide,
  limit: Option<usize>,
}

impl BatchTask {
  pub fn new(eye_side: EyeSide) -> Self {
    Self {
      eye_side,
      limit: None,
    }
  }

  pub fn with_limit(mut self, limit: Option<usize>) -> Self {
    self.limit = limit;
    self
  }
}

impl<const S: u32, M, RE, I, O> Task<I, &DetectionPipeline<M>, O> for BatchTask
where
  M: Model<Input = TensorFrame<S>>,
  M::Error: Into<BoxError>,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Capture<S>>,
  O: Render<Capture<S>, DetectionResult, Error = RE>,
{
  type Output = Vec<DetectionResult>;
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    pipeline: &DetectionPipeline<M>,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始批量任务...");
    let mut results = Vec::new();
    let mut failures = 0usize;

    for (index, capture) in input.enumerate() {
      if self.limit.is_some_and(|n| index >= n) {
        info!("达到指定数量 {}, 退出任务循环", index);
        break;
      }
      info!("处理第 {} 张图像: {}", index + 1, capture.image_ref);
      match pipeline.run(&capture, self.eye_side) {
        Ok(result) => {
          output.render_result(&capture, &result)?;
          results.push(result);
        }
        Err(e) => {
          warn!("图像 {} 筛查失败: {}", capture.image_ref, e);
          failures += 1;
        }
      }
    }

    if results.is_empty() && failures > 0 {
      anyhow::bail!("全部 {} 张图像筛查失败", failures);
    }
    info!("任务完成, 成功 {} 张, 失败 {} 张", results.len(), failures);
    Ok(results)
  }
}
