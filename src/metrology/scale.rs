use opencv::core::{Mat, Point, Size, Vector};
use opencv::imgproc::{
    canny_def, cvt_color_def, find_contours_def, gaussian_blur_def, min_area_rect,
    CHAIN_APPROX_SIMPLE, COLOR_RGB2GRAY, RETR_EXTERNAL,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::config::config::{CardScaleConfig, IrisScaleConfig};
use crate::error::{MeasurementError, Result};
use crate::helper::landmark_helper::{indices, LandmarkPointSet};
use crate::utils::geometry::distance;

/// Physical reference used to calibrate an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMethod {
    Iris,
    CreditCard,
}

/// Millimeters per pixel for one specific image.
///
/// Always strictly positive and finite. It is derived from a single photo
/// and must not be reused for another one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    method: ScaleMethod,
    reference_px: f64,
    mm_per_pixel: f64,
}

impl ScaleFactor {
    /// from_reference calibrates from an object of `reference_mm` that spans
    /// `reference_px` pixels in the image.
    pub fn from_reference(method: ScaleMethod, reference_mm: f64, reference_px: f64) -> Result<Self> {
        if !(reference_px.is_finite() && reference_px > 0.0) {
            return Err(MeasurementError::InvalidScaleReference(format!(
                "reference measures {reference_px} px"
            )))
        }
        let mm_per_pixel = reference_mm / reference_px;
        if !(mm_per_pixel.is_finite() && mm_per_pixel > 0.0) {
            return Err(MeasurementError::InvalidScaleReference(format!(
                "scale of {mm_per_pixel} mm/px from a {reference_mm} mm reference"
            )))
        }
        Ok(ScaleFactor { method, reference_px, mm_per_pixel })
    }

    pub fn method(&self) -> ScaleMethod {
        self.method
    }

    /// reference_px is the raw pixel measurement of the reference object.
    pub fn reference_px(&self) -> f64 {
        self.reference_px
    }

    pub fn mm_per_pixel(&self) -> f64 {
        self.mm_per_pixel
    }

    pub fn to_mm(&self, px: f64) -> f64 {
        px * self.mm_per_pixel
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceSizeClass {
    Small,
    Medium,
    Large,
}

/// Calibrates from the iris, assuming a diameter picked by face size.
#[derive(Debug, Clone)]
pub struct IrisScaleResolver {
    config: IrisScaleConfig,
}

impl IrisScaleResolver {
    pub fn new(config: IrisScaleConfig) -> Self {
        IrisScaleResolver { config }
    }

    pub fn face_size_class(&self, face_width_px: f64) -> FaceSizeClass {
        if face_width_px < self.config.small_face_max_px {
            FaceSizeClass::Small
        } else if face_width_px < self.config.medium_face_max_px {
            FaceSizeClass::Medium
        } else {
            FaceSizeClass::Large
        }
    }

    pub fn reference_iris_mm(&self, class: FaceSizeClass) -> f64 {
        match class {
            FaceSizeClass::Small => self.config.iris_mm_small,
            FaceSizeClass::Medium => self.config.iris_mm_medium,
            FaceSizeClass::Large => self.config.iris_mm_large,
        }
    }

    /// iris_diameter_px averages the two eyes' iris diameters, each measured
    /// between opposing points of the iris ring.
    pub fn iris_diameter_px(points: &LandmarkPointSet) -> Result<f64> {
        let left = distance(&points.get(indices::LEFT_IRIS[0])?, &points.get(indices::LEFT_IRIS[2])?);
        let right = distance(&points.get(indices::RIGHT_IRIS[0])?, &points.get(indices::RIGHT_IRIS[2])?);
        Ok((left + right) / 2.0)
    }

    pub fn resolve(&self, points: &LandmarkPointSet) -> Result<ScaleFactor> {
        let face_width_px = distance(&points.get(indices::JAW_LEFT)?, &points.get(indices::JAW_RIGHT)?);
        let face_class = self.face_size_class(face_width_px);
        let iris_mm = self.reference_iris_mm(face_class);

        let iris_diameter_px = Self::iris_diameter_px(points)?;
        if iris_diameter_px <= 0.0 {
            warn!(iris_diameter_px, "degenerate iris ring");
            return Err(MeasurementError::InvalidScaleReference("invalid iris detection".to_string()))
        }

        let scale = ScaleFactor::from_reference(ScaleMethod::Iris, iris_mm, iris_diameter_px)?;
        debug!(
            face_width_px,
            ?face_class,
            iris_mm,
            iris_diameter_px,
            mm_per_pixel = scale.mm_per_pixel(),
            "iris scale resolved"
        );
        Ok(scale)
    }
}

/// Calibrates from a payment card held in the photo.
///
/// Card candidates are filtered by the aspect ratio and area of their
/// minimum-area rectangle, no object detector involved.
#[derive(Debug, Clone)]
pub struct CardScaleResolver {
    config: CardScaleConfig,
}

impl CardScaleResolver {
    pub fn new(config: CardScaleConfig) -> Self {
        CardScaleResolver { config }
    }

    /// is_card_candidate checks a `w` x `h` rectangle against the card shape
    /// and returns its long side. Both bounds of the aspect band and the area
    /// minimum are exclusive.
    pub fn is_card_candidate(&self, w: f64, h: f64) -> Option<f64> {
        if w == 0.0 || h == 0.0 {
            return None
        }

        let long_side = w.max(h);
        let aspect_ratio = long_side / w.min(h);
        let area = w * h;

        if aspect_ratio > self.config.min_aspect_ratio
            && aspect_ratio < self.config.max_aspect_ratio
            && area > self.config.min_area_px
        {
            debug!(long_side, aspect_ratio, area, "card candidate");
            Some(long_side)
        } else {
            None
        }
    }

    /// detect_card_width_px returns the long side, in pixels, of the largest
    /// card-shaped contour in an RGB image.
    pub fn detect_card_width_px(&self, img: &Mat) -> Result<f64> {
        let mut gray = Mat::default();
        cvt_color_def(img, &mut gray, COLOR_RGB2GRAY)?;

        let mut blurred = Mat::default();
        let kernel = self.config.blur_kernel;
        gaussian_blur_def(&gray, &mut blurred, Size::new(kernel, kernel), 0.0)?;

        let mut edges = Mat::default();
        canny_def(&blurred, &mut edges, self.config.canny_low, self.config.canny_high)?;

        let mut contours = Vector::<Vector<Point>>::new();
        find_contours_def(&edges, &mut contours, RETR_EXTERNAL, CHAIN_APPROX_SIMPLE)?;

        let mut best_width: Option<f64> = None;
        for contour in contours.iter() {
            let rect = min_area_rect(&contour)?;
            if let Some(long_side) = self.is_card_candidate(rect.size.width as f64, rect.size.height as f64) {
                if best_width.map_or(true, |best| long_side > best) {
                    best_width = Some(long_side);
                }
            }
        }

        match best_width {
            Some(width) => Ok(width),
            None => {
                warn!(contours = contours.len(), "no card-shaped contour found");
                Err(MeasurementError::InvalidScaleReference("reference object not detected".to_string()))
            }
        }
    }

    pub fn resolve(&self, img: &Mat) -> Result<ScaleFactor> {
        let card_width_px = self.detect_card_width_px(img)?;
        let scale = ScaleFactor::from_reference(ScaleMethod::CreditCard, self.config.card_width_mm, card_width_px)?;
        debug!(card_width_px, mm_per_pixel = scale.mm_per_pixel(), "card scale resolved");
        Ok(scale)
    }
}

#[cfg(test)]
mod tests {
    use opencv::core::{Rect, Scalar, CV_8UC3};
    use opencv::imgproc::{rectangle, FILLED, LINE_8};
    use crate::utils::geometry::Point as Point2;
    use super::*;

    /// A 478 point face with jaw corners `face_width_px` apart and irises of
    /// `iris_px` diameter.
    fn face_points(face_width_px: f64, iris_px: f64) -> LandmarkPointSet {
        let mut points = vec![Point2::new(0.0, 0.0); indices::FACE_MESH_POINTS];
        points[indices::JAW_LEFT] = Point2::new(100.0, 200.0);
        points[indices::JAW_RIGHT] = Point2::new(100.0 + face_width_px, 200.0);
        points[indices::LEFT_IRIS[0]] = Point2::new(200.0, 150.0);
        points[indices::LEFT_IRIS[2]] = Point2::new(200.0 + iris_px, 150.0);
        points[indices::RIGHT_IRIS[0]] = Point2::new(140.0, 150.0);
        points[indices::RIGHT_IRIS[2]] = Point2::new(140.0 + iris_px, 150.0);
        LandmarkPointSet::new(points)
    }

    fn canvas() -> Mat {
        Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(255.0)).unwrap()
    }

    fn draw_box(img: &mut Mat, rect: Rect) {
        rectangle(img, rect, Scalar::all(0.0), FILLED, LINE_8, 0).unwrap();
    }

    #[test]
    fn test_scale_factor_rejects_degenerate_reference() {
        for px in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let result = ScaleFactor::from_reference(ScaleMethod::Iris, 11.7, px);
            assert!(matches!(result, Err(MeasurementError::InvalidScaleReference(_))));
        }
    }

    #[test]
    fn test_face_size_class_bands() {
        let resolver = IrisScaleResolver::new(IrisScaleConfig::new());
        assert_eq!(resolver.face_size_class(119.9), FaceSizeClass::Small);
        assert_eq!(resolver.face_size_class(120.0), FaceSizeClass::Medium);
        assert_eq!(resolver.face_size_class(159.9), FaceSizeClass::Medium);
        assert_eq!(resolver.face_size_class(160.0), FaceSizeClass::Large);
        assert_eq!(resolver.reference_iris_mm(FaceSizeClass::Small), 10.5);
        assert_eq!(resolver.reference_iris_mm(FaceSizeClass::Medium), 11.7);
        assert_eq!(resolver.reference_iris_mm(FaceSizeClass::Large), 12.5);
    }

    #[test]
    fn test_iris_scale_picks_reference_by_face_size() {
        let resolver = IrisScaleResolver::new(IrisScaleConfig::new());

        let small = resolver.resolve(&face_points(100.0, 10.0)).unwrap();
        assert_eq!(small.method(), ScaleMethod::Iris);
        assert_eq!(small.reference_px(), 10.0);
        assert!((small.mm_per_pixel() - 1.05).abs() < 1e-12);

        let medium = resolver.resolve(&face_points(150.0, 10.0)).unwrap();
        assert!((medium.mm_per_pixel() - 1.17).abs() < 1e-12);

        let large = resolver.resolve(&face_points(400.0, 25.0)).unwrap();
        assert!((large.mm_per_pixel() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_iris_scale_is_positive_and_finite() {
        let resolver = IrisScaleResolver::new(IrisScaleConfig::new());
        for iris_px in [0.5, 1.0, 7.3, 22.0, 180.0] {
            for face_px in [50.0, 130.0, 900.0] {
                let scale = resolver.resolve(&face_points(face_px, iris_px)).unwrap();
                assert!(scale.mm_per_pixel() > 0.0);
                assert!(scale.mm_per_pixel().is_finite());
            }
        }
    }

    #[test]
    fn test_iris_scale_rejects_collapsed_iris() {
        let resolver = IrisScaleResolver::new(IrisScaleConfig::new());
        let result = resolver.resolve(&face_points(150.0, 0.0));
        match result {
            Err(MeasurementError::InvalidScaleReference(reason)) => assert_eq!(reason, "invalid iris detection"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_iris_scale_missing_iris_landmarks() {
        let resolver = IrisScaleResolver::new(IrisScaleConfig::new());
        // 468 points: a face mesh without the refined iris
        let points = LandmarkPointSet::new(vec![Point2::new(1.0, 1.0); 468]);
        assert!(matches!(resolver.resolve(&points), Err(MeasurementError::MissingLandmark(_))));
    }

    #[test]
    fn test_card_candidate_bounds_are_exclusive() {
        let resolver = CardScaleResolver::new(CardScaleConfig::new());
        assert_eq!(resolver.is_card_candidate(160.0, 100.0), Some(160.0));
        assert_eq!(resolver.is_card_candidate(100.0, 160.0), Some(160.0));

        // aspect ratio exactly on either bound
        assert_eq!(resolver.is_card_candidate(150.0, 100.0), None);
        assert_eq!(resolver.is_card_candidate(170.0, 100.0), None);
        assert_eq!(resolver.is_card_candidate(100.0, 170.0), None);

        // 90x56 clears the area minimum, 90x55.5 does not
        assert_eq!(resolver.is_card_candidate(90.0, 56.0), Some(90.0));
        assert_eq!(resolver.is_card_candidate(90.0, 55.5), None);

        // degenerate rectangles
        assert_eq!(resolver.is_card_candidate(0.0, 100.0), None);
        assert_eq!(resolver.is_card_candidate(160.0, 0.0), None);
    }

    #[test]
    fn test_card_candidate_area_exactly_at_minimum() {
        let config = CardScaleConfig { min_area_px: 16000.0, ..CardScaleConfig::new() };
        let resolver = CardScaleResolver::new(config);
        assert_eq!(resolver.is_card_candidate(160.0, 100.0), None);
        assert_eq!(resolver.is_card_candidate(160.0, 100.5), Some(160.0));
    }

    #[test]
    fn test_card_detection_measures_long_side() {
        let mut img = canvas();
        draw_box(&mut img, Rect::new(100, 100, 320, 200));

        let resolver = CardScaleResolver::new(CardScaleConfig::new());
        let width = resolver.detect_card_width_px(&img).unwrap();
        assert!((width - 320.0).abs() <= 4.0, "card width {width}");

        let scale = resolver.resolve(&img).unwrap();
        assert_eq!(scale.method(), ScaleMethod::CreditCard);
        assert!((scale.mm_per_pixel() - 85.6 / width).abs() < 1e-12);
    }

    #[test]
    fn test_card_detection_prefers_largest_candidate() {
        let mut img = canvas();
        draw_box(&mut img, Rect::new(20, 20, 160, 100));
        draw_box(&mut img, Rect::new(250, 200, 320, 200));

        let resolver = CardScaleResolver::new(CardScaleConfig::new());
        let width = resolver.detect_card_width_px(&img).unwrap();
        assert!(width > 300.0, "card width {width}");
    }

    #[test]
    fn test_card_detection_rejects_non_card_shapes() {
        let resolver = CardScaleResolver::new(CardScaleConfig::new());

        let blank = canvas();
        assert!(matches!(
            resolver.resolve(&blank),
            Err(MeasurementError::InvalidScaleReference(_))
        ));

        // right aspect ratio, too small
        let mut tiny = canvas();
        draw_box(&mut tiny, Rect::new(50, 50, 48, 30));
        assert!(matches!(
            resolver.resolve(&tiny),
            Err(MeasurementError::InvalidScaleReference(_))
        ));

        // big enough, wrong aspect ratio
        let mut square = canvas();
        draw_box(&mut square, Rect::new(100, 100, 200, 200));
        match resolver.resolve(&square) {
            Err(MeasurementError::InvalidScaleReference(reason)) => {
                assert_eq!(reason, "reference object not detected")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
