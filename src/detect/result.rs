use serde::{Deserialize, Serialize};

/// Candidate produced by a model before target-class selection.
///
/// Coordinates are floating-point pixels in the original image space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    /// Corners as `[x1, y1, x2, y2]`.
    pub bbox: [f32; 4],
}

impl RawDetection {
    pub fn new(class_id: usize, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

/// Integer pixel rectangle. `(x1, y1)` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Truncates floating-point corners toward zero.
    pub fn from_f32(bbox: [f32; 4]) -> Self {
        Self {
            x1: bbox[0] as i32,
            y1: bbox[1] as i32,
            x2: bbox[2] as i32,
            y2: bbox[3] as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn is_degenerate(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    pub fn as_tuple(&self) -> (i32, i32, i32, i32) {
        (self.x1, self.y1, self.x2, self.y2)
    }
}

/// The single selected instance of the target class.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Model score in `[0, 1]`.
    pub confidence: f32,
}

/// Either the best target-class match or nothing.
pub type DetectionResult = Option<Detection>;
