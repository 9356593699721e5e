//! Dog Spotter
//!
//! Finds the most confident dog in a photo and draws a labelled box around it.
//!
//! # Architecture
//!
//! Processing is a single in-memory pass:
//!
//! 1. **Detect**: a pretrained model proposes candidates; the most confident
//!    one of the target class wins.
//! 2. **Annotate**: the winner is drawn onto the original image. Without a
//!    winner the input bytes are returned untouched.
//!
//! # Module Structure
//!
//! - `detect`: Model trait, backends (tract ONNX, stub), YOLOv8 post-processing, Detector
//! - `annotate`: Box and label rendering, output encoding
//! - `pipeline`: Detector followed by Annotator over image bytes
//! - `telegram`: Long-polling chat bot harness
//! - `config`: JSON file + environment configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod telegram;

pub use annotate::{Annotated, AnnotationStyle, Annotator, LabelStyle};
pub use config::BotConfig;
pub use detect::{
    BoundingBox, Detection, DetectionResult, Detector, DetectorModel, RawDetection, SharedModel,
};
pub use error::{InferenceError, PipelineError, RenderError};
pub use pipeline::{Outcome, Pipeline};
