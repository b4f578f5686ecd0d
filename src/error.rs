use thiserror::Error;

/// Failures surfaced by the measurement pipeline.
///
/// Every variant is fatal for the request that produced it. Callers decide how
/// to present them; the pipeline never substitutes a default measurement.
#[derive(Error, Debug)]
pub enum MeasurementError {
    #[error("No face detected")]
    NoFaceDetected,

    #[error("Invalid scale reference: {0}")]
    InvalidScaleReference(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Landmark {0} is missing from the detected point set")]
    MissingLandmark(usize),

    #[error("Degenerate face geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Measurements not completed yet")]
    MeasurementsIncomplete,

    #[error("Unable to decode image: {0}")]
    ImageDecode(String),

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("Inference backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MeasurementError>;
