use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;

use crate::detect::backend::DetectorModel;
use crate::detect::coco::coco_class_names;
use crate::detect::result::RawDetection;

/// Stub model for tests and model-less runs. Returns the same candidates for
/// every image.
pub struct StubModel {
    class_names: Vec<String>,
    candidates: Vec<RawDetection>,
}

impl StubModel {
    pub fn new(class_names: Vec<String>) -> Self {
        Self {
            class_names,
            candidates: Vec::new(),
        }
    }

    /// Stub with the COCO class table and no candidates.
    pub fn coco() -> Self {
        Self::new(coco_class_names())
    }

    pub fn with_candidates(mut self, candidates: Vec<RawDetection>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Load candidates from a JSON fixture:
    /// `[{"class_id": 16, "confidence": 0.91, "bbox": [50, 60, 300, 400]}]`.
    pub fn from_fixture<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read stub fixture {}", path.display()))?;
        let candidates: Vec<RawDetection> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid stub fixture {}: {}", path.display(), e))?;
        Ok(Self::coco().with_candidates(candidates))
    }
}

impl Default for StubModel {
    fn default() -> Self {
        Self::coco()
    }
}

impl DetectorModel for StubModel {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn infer(&mut self, _image: &DynamicImage) -> Result<Vec<RawDetection>> {
        Ok(self.candidates.clone())
    }
}
