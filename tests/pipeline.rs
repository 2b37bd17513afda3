// 该文件是 Lensa （明眸） 项目的一部分。
// tests/pipeline.rs - 检测管线端到端测试
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

use lensa::{
  config::{ClassTableKind, PipelineConfig},
  frame::{Capture, TensorFrame},
  model::{ClassLabel, FnModel, LayoutHint, RawOutputBuffer},
  pipeline::{DetectionPipeline, EyeSide, PipelineError, ScanMeta},
};

fn binary_config() -> PipelineConfig {
  PipelineConfig {
    class_table: ClassTableKind::Binary,
    ..PipelineConfig::default()
  }
}

fn post_nms(records: &[[f32; 6]], len: usize) -> Vec<f32> {
  let mut data = vec![0.0; len];
  for (idx, r) in records.iter().enumerate() {
    data[idx * 6..idx * 6 + 6].copy_from_slice(r);
  }
  data
}

fn assert_close(actual: f32, expected: f32) {
  assert!(
    (actual - expected).abs() < 1e-5,
    "{} != {}",
    actual,
    expected
  );
}

#[test]
fn single_cataract_record() {
  let pipeline = DetectionPipeline::from_config((), &binary_config()).unwrap();
  let buffer = RawOutputBuffer::new(post_nms(&[[0.1, 0.1, 0.3, 0.3, 0.9, 1.0]], 1800)).unwrap();

  let result = pipeline
    .process(&buffer, ScanMeta::new("eye.jpg", EyeSide::Left))
    .unwrap();
  assert_eq!(result.predicted, ClassLabel::Cataract);
  assert!(result.is_cataract());
  assert_eq!(result.confidence, 0.9);
  assert_eq!(result.detections.len(), 1);
  let bbox = result.detections[0].bbox;
  assert_close(bbox.cx, 0.2);
  assert_close(bbox.cy, 0.2);
  assert_close(bbox.w, 0.2);
  assert_close(bbox.h, 0.2);
}

#[test]
fn pixel_coordinates_are_normalized() {
  let pipeline = DetectionPipeline::from_config((), &binary_config()).unwrap();
  let buffer =
    RawOutputBuffer::new(post_nms(&[[64.0, 64.0, 192.0, 192.0, 0.8, 0.0]], 600)).unwrap();

  let result = pipeline
    .process(&buffer, ScanMeta::new("eye.jpg", EyeSide::Right))
    .unwrap();
  assert_eq!(result.predicted, ClassLabel::Normal);
  let bbox = result.detections[0].bbox;
  assert_close(bbox.cx, 0.2);
  assert_close(bbox.w, 0.2);
}

#[test]
fn severe_class_outranks_majority() {
  let pipeline = DetectionPipeline::from_config((), &PipelineConfig::default()).unwrap();
  // 四分类: 0 Immature, 1 Mature, 2 Normal, 3 Nuclear
  let records = [
    [0.10, 0.10, 0.30, 0.30, 0.90, 1.0],
    [0.50, 0.50, 0.70, 0.70, 0.95, 2.0],
    [0.72, 0.72, 0.90, 0.90, 0.92, 2.0],
  ];
  let buffer = RawOutputBuffer::new(post_nms(&records, 1800)).unwrap();

  let result = pipeline
    .process(&buffer, ScanMeta::new("eye.jpg", EyeSide::Left))
    .unwrap();
  assert_eq!(result.predicted, ClassLabel::Mature);
  assert_eq!(result.confidence, 0.9);
  assert_eq!(result.detections.len(), 3);
  assert_eq!(result.detections[0].label, ClassLabel::Normal);
}

#[test]
fn raw_grid_is_decoded_per_class() {
  const ANCHORS: usize = 8400;
  let config = PipelineConfig::default();
  let model = FnModel::<4, _>::new(|_: &[f32]| {
    // 8 行: cx, cy, w, h, Immature, Mature, Normal, Nuclear
    let mut data = vec![0.0f32; 8 * ANCHORS];
    let anchor = 17;
    for (row, value) in [320.0, 320.0, 128.0, 64.0, 0.1, 0.2, 0.1, 0.7]
      .into_iter()
      .enumerate()
    {
      data[row * ANCHORS + anchor] = value;
    }
    Ok::<_, std::io::Error>(data)
  });
  let pipeline = DetectionPipeline::from_config(model, &config).unwrap();

  let capture = Capture::new("grid.png", TensorFrame::<4>::default());
  let result = pipeline.run(&capture, EyeSide::Left).unwrap();
  assert_eq!(result.predicted, ClassLabel::Nuclear);
  assert_close(result.confidence, 0.7);
  let bbox = result.detections[0].bbox;
  assert_close(bbox.cx, 0.5);
  assert_close(bbox.w, 0.2);
  assert_close(bbox.h, 0.1);
  assert_eq!(result.image_ref, "grid.png");
  assert_eq!(result.captured_at, capture.captured_at);
}

#[test]
fn forced_layout_mismatch_is_an_error() {
  let config = PipelineConfig {
    layout: LayoutHint::RawGrid,
    ..PipelineConfig::default()
  };
  let pipeline = DetectionPipeline::from_config((), &config).unwrap();
  let buffer = RawOutputBuffer::new(vec![0.0; 1801]).unwrap();
  assert!(
    pipeline
      .process(&buffer, ScanMeta::new("eye.jpg", EyeSide::Left))
      .is_err()
  );
}

#[test]
fn upstream_failure_is_propagated() {
  let model = FnModel::<4, _>::new(|_: &[f32]| {
    Err::<Vec<f32>, _>(std::io::Error::other("NPU 不可用"))
  });
  let pipeline = DetectionPipeline::from_config(model, &binary_config()).unwrap();

  let capture = Capture::new("eye.png", TensorFrame::<4>::default());
  let err = pipeline.run(&capture, EyeSide::Left).unwrap_err();
  match err {
    PipelineError::Inference(e) => assert_eq!(e.to_string(), "NPU 不可用"),
    other => panic!("unexpected error: {}", other),
  }
}

#[test]
fn empty_model_output_is_rejected() {
  let model = FnModel::<4, _>::new(|_: &[f32]| Ok::<_, std::io::Error>(Vec::new()));
  let pipeline = DetectionPipeline::from_config(model, &binary_config()).unwrap();

  let capture = Capture::new("eye.png", TensorFrame::<4>::default());
  assert!(matches!(
    pipeline.run(&capture, EyeSide::Left),
    Err(PipelineError::Inference(_))
  ));
}

#[test]
fn no_detections_is_normal() {
  let pipeline = DetectionPipeline::from_config((), &binary_config()).unwrap();
  let buffer = RawOutputBuffer::new(vec![0.0; 600]).unwrap();

  let result = pipeline
    .process(&buffer, ScanMeta::new("eye.jpg", EyeSide::Left))
    .unwrap();
  assert_eq!(result.predicted, ClassLabel::Normal);
  assert_eq!(result.confidence, 0.0);
  assert!(result.detections.is_empty());
}

#[cfg(feature = "record_output")]
#[test]
fn replayed_dump_is_recorded() {
  use lensa::{
    FromUrl,
    model::RawDumpBuilder,
    output::{RecordOutput, Render},
  };

  let dir = tempfile::tempdir().unwrap();
  let dump = dir.path().join("output.bin");
  let bytes: Vec<u8> = post_nms(&[[0.1, 0.1, 0.3, 0.3, 0.9, 1.0]], 1800)
    .iter()
    .flat_map(|v| v.to_le_bytes())
    .collect();
  std::fs::write(&dump, bytes).unwrap();

  let model_url = url::Url::parse(&format!("raw://{}?len=1800", dump.display())).unwrap();
  let model = RawDumpBuilder::from_url(&model_url)
    .unwrap()
    .build::<4>()
    .unwrap();
  let pipeline = DetectionPipeline::from_config(model, &binary_config()).unwrap();

  let records = dir.path().join("history");
  let output_url = url::Url::parse(&format!(
    "record://{}?upload_base=https://cdn.example/eyes",
    records.display()
  ))
  .unwrap();
  let output = RecordOutput::from_url(&output_url).unwrap();

  let capture = Capture::new("/data/eye-01.jpg", TensorFrame::<4>::default());
  let result = pipeline.run(&capture, EyeSide::Right).unwrap();
  output.render_result(&capture, &result).unwrap();

  let path = output.write_record(&result).unwrap();
  let json: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
  assert_eq!(json["predictedClass"], "Cataract");
  assert_eq!(json["eyeSide"], "right");
  assert_eq!(json["imageUrl"], "https://cdn.example/eyes/eye-01.jpg");
  assert_eq!(json["detections"].as_array().unwrap().len(), 1);
  assert!(json.get("imageRef").is_none());
}
