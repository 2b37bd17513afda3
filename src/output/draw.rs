// 该文件是 Lensa （明眸） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use tracing::debug;

use crate::{
  frame::TensorFrame,
  input::AsNhwcTensor,
  model::{Candidate, ClassLabel},
};

const BORDER_THICKNESS: u32 = 2;

/// 各类别的边框颜色
pub fn label_color(label: ClassLabel) -> Rgb<u8> {
  match label {
    ClassLabel::Normal => Rgb([0x10, 0xB9, 0x81]),
    ClassLabel::Immature => Rgb([0xF5, 0x9E, 0x0B]),
    ClassLabel::Mature => Rgb([0xEF, 0x44, 0x44]),
    ClassLabel::Nuclear => Rgb([0x8B, 0x5C, 0xF6]),
    _ => Rgb([0x6B, 0x72, 0x80]),
  }
}

#[derive(Debug, Clone)]
pub struct Draw {
  thickness: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BORDER_THICKNESS,
    }
  }
}

impl Draw {
  pub fn with_thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  /// 在图像上绘制检测框，超出画面的框直接跳过
  pub fn draw_detections_on_image(&self, image: &mut RgbImage, detections: &[Candidate]) {
    let (w, h) = (image.width() as f32, image.height() as f32);

    for candidate in detections {
      let Some(rect) = candidate.bbox.to_display_rect(w, h) else {
        debug!("检测框超出画面，跳过: {:?}", candidate.bbox);
        continue;
      };

      let color = label_color(candidate.label);
      let (x, y) = (rect.x.round() as i32, rect.y.round() as i32);
      for inset in 0..self.thickness as i32 {
        let width = rect.width.round() as i32 - 2 * inset;
        let height = rect.height.round() as i32 - 2 * inset;
        if width <= 0 || height <= 0 {
          break;
        }
        let outline = Rect::at(x + inset, y + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, outline, color);
      }
    }
  }
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl<const S: u32> ToRgbImage for TensorFrame<S> {
  fn to_rgb_image(&self) -> RgbImage {
    let data = self.as_nhwc();

    // 将归一化的 NHWC 张量还原为 RGB 图像
    ImageBuffer::from_fn(S, S, |x, y| {
      let idx = (y as usize * S as usize + x as usize) * 3;
      let channel = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
      Rgb([
        channel(data[idx]),
        channel(data[idx + 1]),
        channel(data[idx + 2]),
      ])
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::CenterBox;

  fn candidate(label: ClassLabel, bbox: CenterBox) -> Candidate {
    Candidate {
      label,
      confidence: 0.9,
      bbox,
    }
  }

  #[test]
  fn draws_border_in_label_color() {
    let mut image = RgbImage::new(100, 100);
    let detections = [candidate(
      ClassLabel::Mature,
      CenterBox::new(0.5, 0.5, 0.4, 0.4),
    )];
    Draw::default().draw_detections_on_image(&mut image, &detections);

    assert_eq!(*image.get_pixel(30, 30), label_color(ClassLabel::Mature));
    assert_eq!(*image.get_pixel(31, 50), label_color(ClassLabel::Mature));
    // 框内部不填充
    assert_eq!(*image.get_pixel(50, 50), Rgb([0, 0, 0]));
  }

  #[test]
  fn out_of_frame_boxes_are_skipped() {
    let mut image = RgbImage::new(64, 64);
    let detections = [candidate(
      ClassLabel::Normal,
      CenterBox::new(1.5, 1.5, 0.2, 0.2),
    )];
    Draw::default().draw_detections_on_image(&mut image, &detections);
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn unknown_labels_use_gray() {
    assert_eq!(label_color(ClassLabel::Unknown), Rgb([0x6B, 0x72, 0x80]));
    assert_eq!(label_color(ClassLabel::Cataract), Rgb([0x6B, 0x72, 0x80]));
  }

  #[test]
  fn tensor_frame_converts_back_to_pixels() {
    let mut frame = TensorFrame::<2>::default();
    frame.as_mut()[0] = 1.0;
    frame.as_mut()[4] = 0.5;
    let image = frame.to_rgb_image();
    assert_eq!(*image.get_pixel(0, 0), Rgb([255, 0, 0]));
    assert_eq!(*image.get_pixel(1, 0), Rgb([0, 128, 0]));
  }
}
