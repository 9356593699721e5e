mod backend;
pub mod backends;
pub mod coco;
mod detector;
pub mod postprocess;
mod result;

pub use backend::{share, DetectorModel, SharedModel};
pub use backends::{load_model, StubModel};
pub use detector::{select_best, Detector, DEFAULT_TARGET_CLASS};
pub use result::{BoundingBox, Detection, DetectionResult, RawDetection};
