// 该文件是 Lensa （明眸） 项目的一部分。
// src/model/bbox.rs - 边界框几何
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

use serde::{Deserialize, Serialize};

const IOU_EPSILON: f32 = 1e-6;
// 任一坐标超过该值即认为是像素坐标
const PIXEL_COORD_THRESHOLD: f32 = 2.0;

/// 角点形式的边界框 `[x1, y1, x2, y2]`，单位可以是像素或归一化坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

/// 中心形式的边界框 `[cx, cy, w, h]`，相对图像宽高归一化
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct CenterBox {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
}

/// 显示坐标系下的矩形（像素），左上角加宽高
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl CornerBox {
  pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  pub fn is_zero(&self) -> bool {
    self.x1 == 0.0 && self.y1 == 0.0 && self.x2 == 0.0 && self.y2 == 0.0
  }

  /// 像素坐标按模型输入尺寸归一化，已归一化的坐标保持不变
  pub fn normalized(self, input_size: f32) -> Self {
    let is_pixel = [self.x1, self.y1, self.x2, self.y2]
      .iter()
      .any(|v| *v > PIXEL_COORD_THRESHOLD);
    if !is_pixel {
      return self;
    }
    Self {
      x1: self.x1 / input_size,
      y1: self.y1 / input_size,
      x2: self.x2 / input_size,
      y2: self.y2 / input_size,
    }
  }

  pub fn clamped(self) -> Self {
    Self {
      x1: self.x1.clamp(0.0, 1.0),
      y1: self.y1.clamp(0.0, 1.0),
      x2: self.x2.clamp(0.0, 1.0),
      y2: self.y2.clamp(0.0, 1.0),
    }
  }

  /// 面积非正时返回 `None`
  pub fn to_center(&self) -> Option<CenterBox> {
    if self.x2 <= self.x1 || self.y2 <= self.y1 {
      return None;
    }
    Some(CenterBox {
      cx: (self.x1 + self.x2) / 2.0,
      cy: (self.y1 + self.y2) / 2.0,
      w: self.x2 - self.x1,
      h: self.y2 - self.y1,
    })
  }
}

impl CenterBox {
  pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self { cx, cy, w, h }
  }

  pub fn to_corners(&self) -> CornerBox {
    CornerBox {
      x1: self.cx - self.w / 2.0,
      y1: self.cy - self.h / 2.0,
      x2: self.cx + self.w / 2.0,
      y2: self.cy + self.h / 2.0,
    }
  }

  pub fn area(&self) -> f32 {
    self.w * self.h
  }

  /// 按显示尺寸反归一化；超出显示区域的框返回 `None`
  pub fn to_display_rect(&self, width: f32, height: f32) -> Option<DisplayRect> {
    let rect = DisplayRect {
      x: (self.cx - self.w / 2.0) * width,
      y: (self.cy - self.h / 2.0) * height,
      width: self.w * width,
      height: self.h * height,
    };
    if rect.x < 0.0 || rect.y < 0.0 || rect.x + rect.width > width || rect.y + rect.height > height
    {
      return None;
    }
    Some(rect)
  }
}

impl From<[f32; 4]> for CenterBox {
  fn from([cx, cy, w, h]: [f32; 4]) -> Self {
    Self { cx, cy, w, h }
  }
}

impl From<CenterBox> for [f32; 4] {
  fn from(bbox: CenterBox) -> Self {
    [bbox.cx, bbox.cy, bbox.w, bbox.h]
  }
}

/// 两个中心形式边界框的交并比
pub fn iou(a: &CenterBox, b: &CenterBox) -> f32 {
  let a = a.to_corners();
  let b = b.to_corners();

  let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
  let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
  let intersection = inter_w * inter_h;

  let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
  let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
  let union = area_a + area_b - intersection;

  intersection / (union + IOU_EPSILON)
}
