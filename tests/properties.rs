// 该文件是 Lensa （明眸） 项目的一部分。
// tests/properties.rs - 后处理各阶段的性质测试
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

use lensa::model::{
  Candidate, CenterBox, ClassLabel, ClassTable, DecoderConfig, Nms, NmsConfig, RawOutputBuffer,
  SeverityResolver, TensorDecoder, iou,
};
use proptest::prelude::*;

fn record() -> impl Strategy<Value = [f32; 6]> {
  (
    0.0f32..1.0,
    0.0f32..1.0,
    0.0f32..1.0,
    0.0f32..1.0,
    0.0f32..1.0,
    0u8..4,
  )
    .prop_map(|(a, b, c, d, conf, class)| {
      [a.min(c), b.min(d), a.max(c), b.max(d), conf, class as f32]
    })
}

fn post_nms_buffer(records: &[[f32; 6]]) -> RawOutputBuffer {
  let mut data = vec![0.0; 1800];
  for (idx, r) in records.iter().enumerate() {
    data[idx * 6..idx * 6 + 6].copy_from_slice(r);
  }
  RawOutputBuffer::new(data).unwrap()
}

fn center_box() -> impl Strategy<Value = CenterBox> {
  (0.05f32..0.95, 0.05f32..0.95, 0.01f32..0.5, 0.01f32..0.5)
    .prop_map(|(cx, cy, w, h)| CenterBox::new(cx, cy, w, h))
}

fn candidate() -> impl Strategy<Value = Candidate> {
  (
    prop_oneof![
      Just(ClassLabel::Immature),
      Just(ClassLabel::Mature),
      Just(ClassLabel::Normal),
      Just(ClassLabel::Nuclear),
      Just(ClassLabel::Unknown),
    ],
    0.0f32..1.0,
    center_box(),
  )
    .prop_map(|(label, confidence, bbox)| Candidate {
      label,
      confidence,
      bbox,
    })
}

fn decoder(table: ClassTable) -> TensorDecoder {
  TensorDecoder::new(DecoderConfig::default(), table)
}

proptest! {
  #[test]
  fn decoded_candidates_are_sorted_and_bounded(
    records in prop::collection::vec(record(), 0..300)
  ) {
    let decoder = decoder(ClassTable::four_class());
    let candidates = decoder.decode(&post_nms_buffer(&records)).unwrap();

    prop_assert!(candidates.len() <= decoder.config().max_candidates);
    for pair in candidates.windows(2) {
      prop_assert!(pair[0].confidence >= pair[1].confidence);
    }
    for c in candidates.iter() {
      prop_assert!(c.confidence >= decoder.config().confidence_threshold);
      prop_assert!(c.bbox.w >= 0.01 && c.bbox.h >= 0.01);
      prop_assert!(c.bbox.cx >= 0.0 && c.bbox.cx <= 1.0);
      prop_assert!(c.bbox.cy >= 0.0 && c.bbox.cy <= 1.0);
    }
  }

  #[test]
  fn injected_box_is_recovered(
    x1 in 0.0f32..0.8, y1 in 0.0f32..0.8,
    w in 0.02f32..0.2, h in 0.02f32..0.2,
    confidence in 0.25f32..1.0, class in 0u8..4,
  ) {
    let table = ClassTable::four_class();
    let buffer = post_nms_buffer(&[[x1, y1, x1 + w, y1 + h, confidence, class as f32]]);
    let candidates = decoder(table.clone()).decode(&buffer).unwrap();

    prop_assert_eq!(candidates.len(), 1);
    let c = &candidates[0];
    prop_assert_eq!(c.label, table.labels()[class as usize]);
    prop_assert_eq!(c.confidence, confidence);
    prop_assert!((c.bbox.cx - (x1 + w / 2.0)).abs() < 1e-5);
    prop_assert!((c.bbox.cy - (y1 + h / 2.0)).abs() < 1e-5);
    prop_assert!((c.bbox.w - w).abs() < 1e-5);
    prop_assert!((c.bbox.h - h).abs() < 1e-5);
  }

  #[test]
  fn iou_is_symmetric_and_bounded(a in center_box(), b in center_box()) {
    let ab = iou(&a, &b);
    prop_assert!((ab - iou(&b, &a)).abs() < 1e-6);
    prop_assert!((0.0..=1.0).contains(&ab));
    prop_assert!(iou(&a, &a) > 0.99);
  }

  #[test]
  fn disjoint_boxes_do_not_overlap(a in center_box(), gap in 0.001f32..1.0) {
    let b = CenterBox::new(a.cx + a.w + gap, a.cy, a.w, a.h);
    prop_assert_eq!(iou(&a, &b), 0.0);
  }

  #[test]
  fn nms_is_idempotent_and_capped(
    candidates in prop::collection::vec(candidate(), 0..40)
  ) {
    let nms = Nms::new(NmsConfig::default());
    let kept = nms.suppress(&candidates);

    prop_assert_eq!(nms.suppress(&kept), kept.clone());
    for label in [
      ClassLabel::Immature,
      ClassLabel::Mature,
      ClassLabel::Normal,
      ClassLabel::Nuclear,
      ClassLabel::Unknown,
    ] {
      let same: Vec<&Candidate> = kept.iter().filter(|c| c.label == label).collect();
      prop_assert!(same.len() <= 3);
      for (i, a) in same.iter().enumerate() {
        for b in same[i + 1..].iter() {
          prop_assert!(iou(&a.bbox, &b.bbox) <= 0.4);
        }
      }
    }
    for c in kept.iter() {
      prop_assert!(candidates.contains(c));
    }
  }

  #[test]
  fn nms_ties_keep_input_order(
    draws in prop::collection::vec(
      (
        prop::sample::select(vec![0.3f32, 0.5, 0.7]),
        prop::sample::select(vec![ClassLabel::Immature, ClassLabel::Normal]),
      ),
      0..40,
    )
  ) {
    // 网格排布，互不重叠
    let candidates: Vec<Candidate> = draws
      .iter()
      .enumerate()
      .map(|(idx, &(confidence, label))| Candidate {
        label,
        confidence,
        bbox: CenterBox::new(
          0.05 + (idx % 10) as f32 * 0.1,
          0.05 + (idx / 10) as f32 * 0.1,
          0.05,
          0.05,
        ),
      })
      .collect();
    let kept = Nms::new(NmsConfig::default()).suppress(&candidates);

    let mut expected: Vec<usize> = (0..candidates.len()).collect();
    expected.sort_by(|&a, &b| candidates[b].confidence.total_cmp(&candidates[a].confidence));
    let mut per_class = [0usize; 2];
    expected.retain(|&idx| {
      let slot = usize::from(candidates[idx].label == ClassLabel::Normal);
      per_class[slot] += 1;
      per_class[slot] <= 3
    });

    let positions: Vec<usize> = kept
      .iter()
      .map(|k| candidates.iter().position(|c| c == k).unwrap())
      .collect();
    prop_assert_eq!(positions, expected);
  }

  #[test]
  fn verdict_ignores_candidate_order(
    candidates in prop::collection::vec(candidate(), 0..20)
  ) {
    let resolver = SeverityResolver::new(ClassTable::four_class(), 0.25);
    let mut reversed = candidates.clone();
    reversed.reverse();
    prop_assert_eq!(resolver.resolve(&candidates), resolver.resolve(&reversed));
  }
}

#[test]
fn confidence_threshold_is_inclusive() {
  let decoder = decoder(ClassTable::binary());
  let at = post_nms_buffer(&[[0.1, 0.1, 0.3, 0.3, 0.25, 1.0]]);
  assert_eq!(decoder.decode(&at).unwrap().len(), 1);

  let below = post_nms_buffer(&[[0.1, 0.1, 0.3, 0.3, 0.2499, 1.0]]);
  assert!(decoder.decode(&below).unwrap().is_empty());
}

#[test]
fn tiny_boxes_are_dropped() {
  let decoder = decoder(ClassTable::binary());
  let buffer = post_nms_buffer(&[[0.1, 0.1, 0.105, 0.3, 0.9, 1.0]]);
  assert!(decoder.decode(&buffer).unwrap().is_empty());
}
