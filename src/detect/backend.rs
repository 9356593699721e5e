use std::sync::{Arc, Mutex};

use anyhow::Result;
use image::DynamicImage;

use crate::detect::result::RawDetection;

/// Pretrained object-detection model, loaded once and injected into the
/// `Detector`.
///
/// # Contract
///
/// - `infer` runs the model exactly once over the image and returns every
///   candidate it keeps, in the model's own order. Boxes are in pixels of the
///   image passed in, not of the model input.
/// - `class_names` is the class-id-to-name table; index is the class id.
/// - Implementations must not retain the image beyond the `infer` call and
///   must not perform file or network I/O there.
pub trait DetectorModel: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class-id-to-name table.
    fn class_names(&self) -> &[String];

    /// Resolve a class id by exact name.
    fn class_id(&self, name: &str) -> Option<usize> {
        self.class_names().iter().position(|class| class == name)
    }

    /// Run inference on an image.
    fn infer(&mut self, image: &DynamicImage) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A model shared between callers. `infer` takes `&mut self`, so every call
/// goes through the mutex; that is also what serializes concurrent requests.
pub type SharedModel = Arc<Mutex<dyn DetectorModel>>;

/// Wrap a model for injection into a `Detector`.
pub fn share<M: DetectorModel + 'static>(model: M) -> SharedModel {
    Arc::new(Mutex::new(model))
}
