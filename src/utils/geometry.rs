use nalgebra::{Point2, Vector2};
use crate::error::{MeasurementError, Result};

pub type Point = Point2<f64>;

/// distance returns the Euclidean distance between two points.
pub fn distance(p1: &Point, p2: &Point) -> f64 {
    nalgebra::distance(p1, p2)
}

/// mean_point returns the arithmetic mean of a non-empty set of points.
///
/// # Arguments
/// * `points` - &[Point]
///
/// # Returns
/// * `Result<Point>` - fails with `DegenerateGeometry` on empty input
pub fn mean_point(points: &[Point]) -> Result<Point> {
    if points.is_empty() {
        return Err(MeasurementError::DegenerateGeometry(
            "cannot average an empty point set".to_string(),
        ));
    }
    let sum = points
        .iter()
        .fold(Vector2::zeros(), |acc, p| acc + p.coords);
    Ok(Point::from(sum / points.len() as f64))
}
