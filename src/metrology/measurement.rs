use serde::Serialize;
use tracing::info;
use crate::error::{MeasurementError, Result};
use crate::helper::landmark_helper::{indices, LandmarkPointSet};
use crate::metrology::face_shape::{FaceDimensions, FaceShape, FaceShapeClassifier};
use crate::metrology::scale::{ScaleFactor, ScaleMethod};
use crate::utils::geometry::{distance, mean_point};
use crate::utils::utils::round_to;

/// Pupillary distance definitions. They produce different numbers for the
/// same face and each one is tied to the endpoint that reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdStrategy {
    /// Horizontal distance between the iris centers, split per eye at their
    /// horizontal midpoint.
    HorizontalMidpoint,
    /// Straight-line distance between the iris centers, per eye measured
    /// from each iris center to the nose center.
    NoseBridge,
}

/// Pupillary distance in millimeters, full precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PupillaryDistance {
    pub total_mm: f64,
    pub left_mm: f64,
    pub right_mm: f64,
}

impl PdStrategy {
    pub fn measure(&self, points: &LandmarkPointSet, scale: &ScaleFactor) -> Result<PupillaryDistance> {
        let left_eye = points.get(indices::LEFT_IRIS_CENTER)?;
        let right_eye = points.get(indices::RIGHT_IRIS_CENTER)?;

        match self {
            PdStrategy::HorizontalMidpoint => {
                let mid = mean_point(&[left_eye, right_eye])?;
                Ok(PupillaryDistance {
                    total_mm: scale.to_mm((left_eye.x - right_eye.x).abs()),
                    left_mm: scale.to_mm((mid.x - left_eye.x).abs()),
                    right_mm: scale.to_mm((right_eye.x - mid.x).abs()),
                })
            }
            PdStrategy::NoseBridge => {
                let nose = points.get(indices::NOSE_CENTER)?;
                Ok(PupillaryDistance {
                    total_mm: scale.to_mm(distance(&left_eye, &right_eye)),
                    left_mm: scale.to_mm(distance(&left_eye, &nose)),
                    right_mm: scale.to_mm(distance(&right_eye, &nose)),
                })
            }
        }
    }
}

/// face_dimensions measures face width (jaw to jaw), height (chin to
/// forehead) and chin width, in millimeters.
///
/// Fails when the face height collapses to zero, since every ratio divides by it.
pub fn face_dimensions(points: &LandmarkPointSet, scale: &ScaleFactor) -> Result<FaceDimensions> {
    let width_mm = scale.to_mm(distance(&points.get(indices::JAW_LEFT)?, &points.get(indices::JAW_RIGHT)?));
    let height_mm = scale.to_mm(distance(&points.get(indices::CHIN)?, &points.get(indices::FOREHEAD)?));
    let chin_width_mm = scale.to_mm(distance(&points.get(indices::CHIN_LEFT)?, &points.get(indices::CHIN_RIGHT)?));

    if height_mm <= 0.0 {
        return Err(MeasurementError::DegenerateGeometry("face height is zero".to_string()))
    }

    Ok(FaceDimensions {
        width_mm,
        height_mm,
        jaw_width_mm: width_mm,
        chin_width_mm,
    })
}

/// Calibration details reported next to the measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleMetadata {
    pub method: ScaleMethod,
    pub reference_px_measurement: f64,
    pub mm_per_pixel: f64,
}

/// Millimeter measurements reported by the iris endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IrisMeasurements {
    pub pd: f64,
    pub pd_left: f64,
    pub pd_right: f64,
    pub face_width: f64,
    pub face_height: f64,
    pub face_shape_ratio: f64,
    pub nose_bridge_left: f64,
    pub nose_bridge_right: f64,
}

/// Millimeter measurements reported by the card endpoint. `nose_left` and
/// `nose_right` repeat the per-eye PD, which is measured to the nose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CardMeasurements {
    pub pd: f64,
    pub pd_left: f64,
    pub pd_right: f64,
    pub nose_left: f64,
    pub nose_right: f64,
    pub face_width: f64,
    pub face_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Measurements {
    Iris(IrisMeasurements),
    CreditCard(CardMeasurements),
}

impl Measurements {
    pub fn face_height(&self) -> f64 {
        match self {
            Measurements::Iris(m) => m.face_height,
            Measurements::CreditCard(m) => m.face_height,
        }
    }

    pub fn pd(&self) -> f64 {
        match self {
            Measurements::Iris(m) => m.pd,
            Measurements::CreditCard(m) => m.pd,
        }
    }
}

/// Output of one measurement request. Values are rounded; the record carries
/// no guest or session identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasurementResult {
    pub scale: ScaleMetadata,
    pub mm: Measurements,
    pub face_shape: FaceShape,
}

/// measure_with_iris_scale computes the iris endpoint's measurements.
///
/// # Arguments
/// * `points` - landmark point set of the face
/// * `scale` - scale resolved from the iris of the same image
///
/// # Returns
/// * `Result<MeasurementResult>`
pub fn measure_with_iris_scale(points: &LandmarkPointSet, scale: &ScaleFactor) -> Result<MeasurementResult> {
    let pd = PdStrategy::HorizontalMidpoint.measure(points, scale)?;
    let dims = face_dimensions(points, scale)?;

    let nose_center = points.get(indices::NOSE_CENTER)?;
    let nose_bridge_left = scale.to_mm(distance(&nose_center, &points.get(indices::NOSE_LEFT)?));
    let nose_bridge_right = scale.to_mm(distance(&nose_center, &points.get(indices::NOSE_RIGHT)?));

    let face_shape = FaceShapeClassifier::IrisCascade.classify(&dims);
    info!(pd_mm = pd.total_mm, %face_shape, "iris measurement complete");

    Ok(MeasurementResult {
        scale: ScaleMetadata {
            method: scale.method(),
            reference_px_measurement: round_to(scale.reference_px(), 2),
            mm_per_pixel: round_to(scale.mm_per_pixel(), 4),
        },
        mm: Measurements::Iris(IrisMeasurements {
            pd: round_to(pd.total_mm, 1),
            pd_left: round_to(pd.left_mm, 1),
            pd_right: round_to(pd.right_mm, 1),
            face_width: round_to(dims.width_mm, 1),
            face_height: round_to(dims.height_mm, 1),
            face_shape_ratio: round_to(dims.ratio(), 2),
            nose_bridge_left: round_to(nose_bridge_left, 1),
            nose_bridge_right: round_to(nose_bridge_right, 1),
        }),
        face_shape,
    })
}

/// measure_with_card_scale computes the card endpoint's measurements.
pub fn measure_with_card_scale(points: &LandmarkPointSet, scale: &ScaleFactor) -> Result<MeasurementResult> {
    let pd = PdStrategy::NoseBridge.measure(points, scale)?;
    let dims = face_dimensions(points, scale)?;

    let face_shape = FaceShapeClassifier::CardCascade.classify(&dims);
    info!(pd_mm = pd.total_mm, %face_shape, "card measurement complete");

    Ok(MeasurementResult {
        scale: ScaleMetadata {
            method: scale.method(),
            reference_px_measurement: round_to(scale.reference_px(), 1),
            mm_per_pixel: round_to(scale.mm_per_pixel(), 4),
        },
        mm: Measurements::CreditCard(CardMeasurements {
            pd: round_to(pd.total_mm, 1),
            pd_left: round_to(pd.left_mm, 1),
            pd_right: round_to(pd.right_mm, 1),
            nose_left: round_to(pd.left_mm, 1),
            nose_right: round_to(pd.right_mm, 1),
            face_width: round_to(dims.width_mm, 1),
            face_height: round_to(dims.height_mm, 1),
        }),
        face_shape,
    })
}
