#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorModel;
use crate::detect::coco::coco_class_names;
use crate::detect::postprocess::{decode_yolov8, letterbox_image, Letterbox, YoloParams};
use crate::detect::result::RawDetection;

/// Tract-based backend for YOLOv8 ONNX exports.
///
/// Loads a local model file once and runs it on letterboxed RGB input.
/// No network I/O and no disk writes happen after loading.
pub struct TractModel {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    params: YoloParams,
    class_names: Vec<String>,
}

impl TractModel {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            params: YoloParams::default(),
            class_names: coco_class_names(),
        })
    }

    /// Override the confidence and IoU thresholds.
    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.params.confidence_threshold = confidence;
        self.params.iou_threshold = iou;
        self
    }

    /// Replace the built-in COCO class table.
    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    fn build_input(&self, image: &DynamicImage) -> (Tensor, Letterbox) {
        let (canvas, geometry) = letterbox_image(image, self.input_size);
        let side = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        (input.into_tensor(), geometry)
    }
}

impl DetectorModel for TractModel {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn infer(&mut self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let (input, geometry) = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected detector output shape {:?}", shape));
        }
        let (channels, anchors) = (shape[1], shape[2]);
        if channels != 4 + self.class_names.len() {
            return Err(anyhow!(
                "model reports {} classes but class table has {}",
                channels.saturating_sub(4),
                self.class_names.len()
            ));
        }

        let flat: Vec<f32> = view.iter().copied().collect();
        let mut found = decode_yolov8(&flat, channels, anchors, &self.params);
        for candidate in &mut found {
            candidate.bbox = geometry.to_source(candidate.bbox);
        }
        log::debug!("tract: {} candidates after nms", found.len());
        Ok(found)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = DynamicImage::new_rgb8(self.input_size, self.input_size);
        self.infer(&blank).map(|_| ())
    }
}
