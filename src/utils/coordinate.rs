use serde::{Deserialize, Serialize};

/// A landmark position normalized to the image size, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate2D {
    pub x: f32,
    pub y: f32,
}

impl Coordinate2D {
    pub fn new(x: f32, y: f32) -> Self {
        Coordinate2D { x, y }
    }
}

/// Raw output of a landmark backend for the single face in an image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceLandmarks {
    pub points: Vec<Coordinate2D>,
}
