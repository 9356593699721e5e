use std::time::Instant;

use crate::annotate::{Annotated, Annotator};
use crate::detect::{DetectionResult, Detector};
use crate::error::{InferenceError, PipelineError};

/// Result of one detect-then-annotate pass.
#[derive(Clone, Debug)]
pub struct Outcome {
    pub detection: DetectionResult,
    pub annotated: Annotated,
}

impl Outcome {
    pub fn found(&self) -> bool {
        self.annotated.found
    }
}

/// Detector followed by Annotator over in-memory image bytes.
pub struct Pipeline {
    detector: Detector,
    annotator: Annotator,
}

impl Pipeline {
    pub fn new(detector: Detector, annotator: Annotator) -> Self {
        Self {
            detector,
            annotator,
        }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }

    pub fn run(&self, input: &[u8]) -> Result<Outcome, PipelineError> {
        let start = Instant::now();
        let image = image::load_from_memory(input).map_err(InferenceError::Decode)?;
        let detection = self.detector.detect(&image)?;
        drop(image);

        let annotated = self.annotator.annotate(input, &detection)?;
        log::debug!(
            "pipeline: found={} confidence={:?} in {}ms",
            annotated.found,
            annotated.confidence,
            start.elapsed().as_millis()
        );
        Ok(Outcome {
            detection,
            annotated,
        })
    }
}
