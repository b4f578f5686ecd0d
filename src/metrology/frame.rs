use std::str::FromStr;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{MeasurementError, Result};
use crate::utils::utils::round_to;

/// Physical frame dimensions in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDimensions {
    pub lens_width: u32,
    pub bridge: u32,
    pub temple: u32,
    pub lens_height: u32,
}

impl FromStr for FrameDimensions {
    type Err = MeasurementError;

    /// Parses `"{lens_width}-{bridge}-{temple}-{lens_height}"`, e.g. `"51-18-142-41"`.
    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split('-').collect();
        if tokens.len() != 4 {
            return Err(MeasurementError::MalformedInput(format!(
                "frame dimensions {s:?} need 4 dash separated values, got {}",
                tokens.len()
            )))
        }

        let mut values = [0u32; 4];
        for (value, token) in values.iter_mut().zip(&tokens) {
            *value = token.trim().parse::<u32>().map_err(|_| {
                MeasurementError::MalformedInput(format!("frame dimension {token:?} is not an integer"))
            })?;
        }

        Ok(FrameDimensions {
            lens_width: values[0],
            bridge: values[1],
            temple: values[2],
            lens_height: values[3],
        })
    }
}

pub fn parse_frame_dimensions(dimensions: &str) -> Result<FrameDimensions> {
    dimensions.parse()
}

/// compute_fitting_height estimates the pupil-to-lens-bottom height as two
/// thirds of the lens height, rounded to 2 decimals.
pub fn compute_fitting_height(lens_height: f64) -> f64 {
    round_to(lens_height * (2.0 / 3.0), 2)
}

/// A frame chosen for a try-on session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSelection {
    pub frame_id: String,
    pub frame_name: String,
    pub dimensions: FrameDimensions,
    pub fitting_height: f64,
}

impl FrameSelection {
    /// new records a frame selection.
    ///
    /// # Arguments
    /// * `frame_id` - frame SKU
    /// * `frame_name` - display name
    /// * `dimensions` - compact dimension string, see `FrameDimensions`
    /// * `stored_face_height` - face height persisted by a completed measurement, if any
    ///
    /// # Returns
    /// * `Result<FrameSelection>` - `MeasurementsIncomplete` while no face height is stored
    pub fn new(
        frame_id: &str,
        frame_name: &str,
        dimensions: &str,
        stored_face_height: Option<f64>,
    ) -> Result<Self> {
        let dimensions = parse_frame_dimensions(dimensions)?;
        let face_height = stored_face_height.ok_or(MeasurementError::MeasurementsIncomplete)?;

        let fitting_height = compute_fitting_height(dimensions.lens_height as f64);
        debug!(frame_id, face_height, fitting_height, "frame selected");

        Ok(FrameSelection {
            frame_id: frame_id.to_string(),
            frame_name: frame_name.to_string(),
            dimensions,
            fitting_height,
        })
    }
}
