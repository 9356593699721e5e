use image::DynamicImage;

use crate::detect::backend::{DetectorModel, SharedModel};
use crate::detect::result::{BoundingBox, Detection, DetectionResult, RawDetection};
use crate::error::InferenceError;

/// Class the bot looks for unless configured otherwise.
pub const DEFAULT_TARGET_CLASS: &str = "dog";

/// Finds the single most confident instance of one class in an image.
#[derive(Clone)]
pub struct Detector {
    model: SharedModel,
    target_class: String,
}

impl Detector {
    pub fn new(model: SharedModel) -> Self {
        Self {
            model,
            target_class: DEFAULT_TARGET_CLASS.to_string(),
        }
    }

    /// Override the target class name.
    pub fn with_target_class(mut self, name: impl Into<String>) -> Self {
        self.target_class = name.into();
        self
    }

    pub fn target_class(&self) -> &str {
        &self.target_class
    }

    /// Decode encoded image bytes and run detection.
    pub fn detect_bytes(&self, bytes: &[u8]) -> Result<DetectionResult, InferenceError> {
        let image = image::load_from_memory(bytes).map_err(InferenceError::Decode)?;
        self.detect(&image)
    }

    /// Run the model once and select the best target-class candidate.
    pub fn detect(&self, image: &DynamicImage) -> Result<DetectionResult, InferenceError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| InferenceError::ModelPoisoned)?;
        let candidates = model.infer(image).map_err(InferenceError::Model)?;

        let Some(class_id) = model.class_id(&self.target_class) else {
            log::warn!(
                "model '{}' has no class named '{}'",
                model.name(),
                self.target_class
            );
            return Ok(None);
        };
        drop(model);

        log::debug!(
            "{} candidates, {} of class '{}'",
            candidates.len(),
            candidates.iter().filter(|c| c.class_id == class_id).count(),
            self.target_class
        );

        Ok(select_best(&candidates, class_id).map(|best| Detection {
            bbox: BoundingBox::from_f32(best.bbox),
            confidence: best.confidence,
        }))
    }
}

/// Highest-confidence candidate of `class_id`.
///
/// On equal confidence the earlier candidate wins.
pub fn select_best(candidates: &[RawDetection], class_id: usize) -> Option<&RawDetection> {
    let mut best: Option<&RawDetection> = None;
    for candidate in candidates.iter().filter(|c| c.class_id == class_id) {
        match best {
            Some(current) if candidate.confidence <= current.confidence => {}
            _ => best = Some(candidate),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backend::share;
    use crate::detect::backends::StubModel;
    use crate::detect::coco::COCO_DOG;

    const CAT: usize = 15;

    fn blank() -> DynamicImage {
        DynamicImage::new_rgb8(32, 32)
    }

    #[test]
    fn select_best_picks_max_confidence() {
        let candidates = vec![
            RawDetection::new(COCO_DOG, 0.40, [0.0, 0.0, 10.0, 10.0]),
            RawDetection::new(CAT, 0.99, [1.0, 1.0, 5.0, 5.0]),
            RawDetection::new(COCO_DOG, 0.87, [2.0, 2.0, 20.0, 20.0]),
            RawDetection::new(COCO_DOG, 0.55, [3.0, 3.0, 30.0, 30.0]),
        ];
        let best = select_best(&candidates, COCO_DOG).unwrap();
        assert_eq!(best.confidence, 0.87);
        assert_eq!(best.bbox, [2.0, 2.0, 20.0, 20.0]);
    }

    #[test]
    fn select_best_keeps_first_on_tie() {
        let candidates = vec![
            RawDetection::new(COCO_DOG, 0.7, [0.0, 0.0, 10.0, 10.0]),
            RawDetection::new(COCO_DOG, 0.7, [5.0, 5.0, 15.0, 15.0]),
        ];
        let best = select_best(&candidates, COCO_DOG).unwrap();
        assert_eq!(best.bbox, [0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn select_best_none_without_class() {
        let candidates = vec![RawDetection::new(CAT, 0.9, [0.0, 0.0, 1.0, 1.0])];
        assert!(select_best(&candidates, COCO_DOG).is_none());
        assert!(select_best(&[], COCO_DOG).is_none());
    }

    #[test]
    fn detect_truncates_coordinates() {
        let model = StubModel::coco().with_candidates(vec![RawDetection::new(
            COCO_DOG,
            0.91,
            [50.9, 60.2, 300.99, 400.5],
        )]);
        let detector = Detector::new(share(model));
        let detection = detector.detect(&blank()).unwrap().unwrap();
        assert_eq!(detection.bbox.as_tuple(), (50, 60, 300, 400));
        assert_eq!(detection.confidence, 0.91);
    }

    #[test]
    fn missing_target_class_is_not_found() {
        let model = StubModel::new(vec!["cat".to_string(), "bird".to_string()])
            .with_candidates(vec![RawDetection::new(0, 0.9, [0.0, 0.0, 4.0, 4.0])]);
        let detector = Detector::new(share(model));
        assert_eq!(detector.detect(&blank()).unwrap(), None);
    }

    #[test]
    fn custom_target_class() {
        let model = StubModel::coco().with_candidates(vec![
            RawDetection::new(COCO_DOG, 0.9, [0.0, 0.0, 4.0, 4.0]),
            RawDetection::new(CAT, 0.6, [1.0, 2.0, 8.0, 9.0]),
        ]);
        let detector = Detector::new(share(model)).with_target_class("cat");
        let detection = detector.detect(&blank()).unwrap().unwrap();
        assert_eq!(detection.bbox.as_tuple(), (1, 2, 8, 9));
    }

    #[test]
    fn undecodable_bytes_are_inference_errors() {
        let detector = Detector::new(share(StubModel::coco()));
        let err = detector.detect_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, InferenceError::Decode(_)));
    }
}
