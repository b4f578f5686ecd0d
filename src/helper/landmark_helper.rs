use std::future::Future;
use anyhow::Error;
use opencv::core::{Mat, MatTraitConst};
use tracing::debug;
use crate::error::{MeasurementError, Result};
use crate::utils::coordinate::FaceLandmarks;
use crate::utils::geometry::Point;

/// Face-mesh landmark indices consumed by the measurement code.
///
/// The numbering follows the 478 point face mesh with refined iris points.
pub mod indices {
    pub const NOSE_CENTER: usize = 1;
    pub const FOREHEAD: usize = 10;
    pub const NOSE_LEFT: usize = 94;
    pub const CHIN_LEFT: usize = 132;
    pub const CHIN: usize = 152;
    pub const JAW_LEFT: usize = 234;
    pub const NOSE_RIGHT: usize = 331;
    pub const CHIN_RIGHT: usize = 361;
    pub const JAW_RIGHT: usize = 454;
    pub const LEFT_IRIS_CENTER: usize = 468;
    pub const RIGHT_IRIS: [usize; 4] = [469, 470, 471, 472];
    pub const RIGHT_IRIS_CENTER: usize = 473;
    pub const LEFT_IRIS: [usize; 4] = [474, 475, 476, 477];

    pub const FACE_MESH_POINTS: usize = 478;
}

/// Landmark detection backend: a long-lived, read-only model handle.
///
/// Implementations are built once at startup and shared across requests.
/// Implementors may write `async fn detect`, the returned future must be `Send`
/// so requests can be spawned onto a multi-threaded runtime.
pub trait LandmarkBackend: Send + Sync {
    /// detect returns the landmarks of the single face in an RGB image, or
    /// `None` when no face was found.
    fn detect(&self, img: &Mat) -> impl Future<Output = std::result::Result<Option<FaceLandmarks>, Error>> + Send;
}

/// Pixel coordinates of one face, indexed by the face-mesh numbering.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkPointSet {
    points: Vec<Point>,
}

impl LandmarkPointSet {
    pub fn new(points: Vec<Point>) -> Self {
        LandmarkPointSet { points }
    }

    /// from_normalized maps normalized landmarks onto the pixel grid of a
    /// `width` x `height` image. Coordinates are truncated toward zero to
    /// whole pixels.
    pub fn from_normalized(landmarks: &FaceLandmarks, width: i32, height: i32) -> Self {
        let points = landmarks
            .points
            .iter()
            .map(|p| {
                Point::new(
                    (p.x as f64 * width as f64).trunc(),
                    (p.y as f64 * height as f64).trunc(),
                )
            })
            .collect();
        LandmarkPointSet { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// get returns the landmark at `idx`, failing if the detector did not produce it.
    pub fn get(&self, idx: usize) -> Result<Point> {
        self.points
            .get(idx)
            .copied()
            .ok_or(MeasurementError::MissingLandmark(idx))
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

/// extract_point_set runs the landmark backend on an RGB image and returns
/// the face's pixel-space point set.
///
/// # Arguments
/// * `backend` - landmark detection backend
/// * `img` - RGB OpenCV matrix
/// * `expected_points` - number of landmarks the model is configured to emit
///
/// # Returns
/// * `Result<LandmarkPointSet>` - `NoFaceDetected` when the backend finds no face
pub async fn extract_point_set<B: LandmarkBackend>(
    backend: &B,
    img: &Mat,
    expected_points: usize,
) -> Result<LandmarkPointSet> {
    let landmarks = match backend.detect(img).await? {
        None => return Err(MeasurementError::NoFaceDetected),
        Some(landmarks) => landmarks,
    };

    if landmarks.points.len() != expected_points {
        return Err(MeasurementError::Backend(Error::msg(format!(
            "landmark backend returned {} points, expected {}",
            landmarks.points.len(),
            expected_points
        ))))
    }

    let point_set = LandmarkPointSet::from_normalized(&landmarks, img.cols(), img.rows());
    debug!(points = point_set.len(), width = img.cols(), height = img.rows(), "extracted landmark point set");
    Ok(point_set)
}
