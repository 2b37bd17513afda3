// 该文件是 Lensa （明眸） 项目的一部分。
// src/output/record.rs - 筛查记录输出
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

use std::{
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Capture,
  output::Render,
  pipeline::DetectionResult,
};

#[derive(Error, Debug)]
pub enum RecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

/// 按日期目录写出 JSON 形式的筛查记录
///
/// `record:///data/history?upload_base=https://cdn.example/eyes` 会把
/// `imageUrl` 设为 `upload_base` 加上原图文件名。
pub struct RecordOutput {
  directory: PathBuf,
  upload_base: Option<String>,
  frame_counters: Arc<Mutex<u16>>,
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordOutput {
  type Error = RecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(RecordOutputError::SchemeMismatch);
    }

    let upload_base = uri
      .query_pairs()
      .find(|(k, _)| k == "upload_base")
      .map(|(_, v)| v.trim_end_matches('/').to_string());

    Ok(RecordOutput::new(uri.path()).with_upload_base(upload_base))
  }
}

impl RecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      upload_base: None,
      frame_counters: Arc::new(Mutex::new(0)),
    }
  }

  pub fn with_upload_base(mut self, upload_base: Option<String>) -> Self {
    self.upload_base = upload_base;
    self
  }

  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counters
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn record_path(&self, at: &DateTime<Utc>) -> Result<PathBuf, RecordOutputError> {
    let directory = self
      .directory
      .join(at.year().to_string())
      .join(format!("{:02}", at.month()))
      .join(format!("{:02}", at.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.json",
      at.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn image_url(&self, image_ref: &str) -> Option<String> {
    let base = self.upload_base.as_ref()?;
    let name = Path::new(image_ref).file_name()?.to_str()?;
    Some(format!("{}/{}", base, name))
  }

  /// 写出一条记录，返回记录文件路径
  pub fn write_record(&self, result: &DetectionResult) -> Result<PathBuf, RecordOutputError> {
    let record = result.to_record(self.image_url(&result.image_ref));
    let path = self.record_path(&result.captured_at)?;
    std::fs::write(&path, serde_json::to_vec_pretty(&record)?)?;
    info!("筛查记录已保存: {}", path.display());
    Ok(path)
  }
}

impl<const S: u32> Render<Capture<S>, DetectionResult> for RecordOutput {
  type Error = RecordOutputError;

  fn render_result(
    &self,
    _capture: &Capture<S>,
    result: &DetectionResult,
  ) -> Result<(), Self::Error> {
    self.write_record(result)?;
    Ok(())
  }
}
