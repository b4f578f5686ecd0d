use std::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceShape {
    Round,
    Square,
    Oval,
    Rectangle,
    Heart,
}

impl FaceShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceShape::Round => "round",
            FaceShape::Square => "square",
            FaceShape::Oval => "oval",
            FaceShape::Rectangle => "rectangle",
            FaceShape::Heart => "heart",
        }
    }
}

impl fmt::Display for FaceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Face dimensions in millimeters, the classifier input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceDimensions {
    pub width_mm: f64,
    pub height_mm: f64,
    pub jaw_width_mm: f64,
    pub chin_width_mm: f64,
}

impl FaceDimensions {
    pub fn ratio(&self) -> f64 {
        self.width_mm / self.height_mm
    }
}

/// Rule cascades mapping face dimensions to a shape, first match wins.
///
/// The two cascades disagree below a 0.75 width/height ratio and are bound to
/// the measurement method whose output they label. They are kept apart so
/// neither method's labels drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceShapeClassifier {
    /// Labels iris-calibrated measurements. Everything under 0.75 is a
    /// rectangle; the chin/jaw check is only reached when the ratio is not a
    /// number.
    IrisCascade,
    /// Labels card-calibrated measurements. Under 0.75 a narrow chin
    /// (relative to the face width) makes a heart, otherwise a rectangle.
    CardCascade,
}

impl FaceShapeClassifier {
    pub fn classify(&self, dims: &FaceDimensions) -> FaceShape {
        let ratio = dims.ratio();
        match self {
            FaceShapeClassifier::IrisCascade => {
                if ratio > 0.90 {
                    FaceShape::Round
                } else if (0.85..=0.90).contains(&ratio) {
                    FaceShape::Square
                } else if (0.75..0.85).contains(&ratio) {
                    FaceShape::Oval
                } else if ratio < 0.75 {
                    FaceShape::Rectangle
                } else if dims.chin_width_mm < dims.jaw_width_mm * 0.7 {
                    FaceShape::Heart
                } else {
                    FaceShape::Oval
                }
            }
            FaceShapeClassifier::CardCascade => {
                if ratio > 0.9 {
                    FaceShape::Round
                } else if (0.85..=0.9).contains(&ratio) {
                    FaceShape::Square
                } else if (0.75..0.85).contains(&ratio) {
                    FaceShape::Oval
                } else if dims.chin_width_mm < dims.width_mm * 0.7 {
                    FaceShape::Heart
                } else {
                    FaceShape::Rectangle
                }
            }
        }
    }
}
