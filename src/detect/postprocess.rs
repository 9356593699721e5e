//! Model-independent pre/post-processing for YOLOv8-style detectors.
//!
//! Kept apart from the tract backend so it can be exercised without the
//! `backend-tract` feature.

use std::cmp::Ordering;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

use crate::detect::result::RawDetection;

/// Padding color used by the Ultralytics letterbox.
pub const LETTERBOX_FILL: u8 = 114;

/// Thresholds applied while decoding raw model output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoloParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

/// Geometry of an aspect-preserving resize into a square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    pub fn new(source_width: u32, source_height: u32, size: u32) -> Self {
        let scale = (size as f32 / source_width.max(1) as f32)
            .min(size as f32 / source_height.max(1) as f32);
        let resized_width = ((source_width as f32 * scale).round() as u32).clamp(1, size);
        let resized_height = ((source_height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            scale,
            pad_x: (size - resized_width) / 2,
            pad_y: (size - resized_height) / 2,
            resized_width,
            resized_height,
            source_width,
            source_height,
        }
    }

    /// Map a box from model-input pixels back to source pixels, clamped to
    /// the source image.
    pub fn to_source(&self, bbox: [f32; 4]) -> [f32; 4] {
        let max_x = self.source_width as f32;
        let max_y = self.source_height as f32;
        let x = |v: f32| ((v - self.pad_x as f32) / self.scale).clamp(0.0, max_x);
        let y = |v: f32| ((v - self.pad_y as f32) / self.scale).clamp(0.0, max_y);
        [x(bbox[0]), y(bbox[1]), x(bbox[2]), y(bbox[3])]
    }
}

/// Resize `image` into a `size`×`size` RGB canvas, padding with gray.
pub fn letterbox_image(image: &DynamicImage, size: u32) -> (RgbImage, Letterbox) {
    let rgb = image.to_rgb8();
    let geometry = Letterbox::new(rgb.width(), rgb.height(), size);
    let resized = imageops::resize(
        &rgb,
        geometry.resized_width,
        geometry.resized_height,
        FilterType::Triangle,
    );
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
    imageops::overlay(
        &mut canvas,
        &resized,
        geometry.pad_x as i64,
        geometry.pad_y as i64,
    );
    (canvas, geometry)
}

/// Decode a channel-major `[4 + classes, anchors]` YOLOv8 output.
///
/// Each anchor contributes at most one candidate: its highest-scoring class,
/// if that score clears the confidence threshold. Survivors go through
/// class-aware NMS. Boxes stay in model-input pixels.
pub fn decode_yolov8(
    output: &[f32],
    channels: usize,
    anchors: usize,
    params: &YoloParams,
) -> Vec<RawDetection> {
    if channels <= 4 || output.len() < channels * anchors {
        return Vec::new();
    }
    let at = |channel: usize, anchor: usize| output[channel * anchors + anchor];

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let mut class_id = 0;
        let mut score = f32::NEG_INFINITY;
        for class in 0..channels - 4 {
            let value = at(4 + class, anchor);
            if value > score {
                score = value;
                class_id = class;
            }
        }
        if score.is_nan() || score < params.confidence_threshold {
            continue;
        }
        let (cx, cy) = (at(0, anchor), at(1, anchor));
        let (half_w, half_h) = (at(2, anchor) / 2.0, at(3, anchor) / 2.0);
        candidates.push(RawDetection::new(
            class_id,
            score,
            [cx - half_w, cy - half_h, cx + half_w, cy + half_h],
        ));
    }

    let mut kept = nms(candidates, params.iou_threshold);
    kept.truncate(params.max_detections);
    kept
}

/// Class-aware non-maximum suppression. Output is sorted by descending
/// confidence.
pub fn nms(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection over union of two `[x1, y1, x2, y2]` boxes.
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
