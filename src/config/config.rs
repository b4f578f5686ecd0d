use std::fs;
use std::path::Path;
use anyhow::Error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TritonConfig {
    pub url: String,
    pub timeout: u64,
}

impl TritonConfig {
    pub fn new() -> Self {
        TritonConfig {
            url: "http://127.0.0.1:8001".to_string(),
            timeout: 20,
        }
    }
}

impl Default for TritonConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FaceLandmarkConfig {
    pub model_name: String,
    pub input_name: String,
    pub landmarks_output: String,
    pub score_output: String,
    pub imsize: (i32, i32),
    pub mean: f32,
    pub scale: f32,
    pub num_landmarks: usize,
    pub score_threshold: f32,
}

impl FaceLandmarkConfig {
    pub fn new() -> Self {
        FaceLandmarkConfig {
            model_name: "face_landmarker".to_string(),
            input_name: "input".to_string(),
            landmarks_output: "landmarks".to_string(),
            score_output: "face_score".to_string(),
            imsize: (256, 256),
            mean: 0.0,
            scale: 1.0 / 255.0,
            num_landmarks: 478,
            score_threshold: 0.5,
        }
    }
}

impl Default for FaceLandmarkConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlassesClassifierConfig {
    pub model_name: String,
    pub input_name: String,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    pub threshold: f32,
    pub imsize: (i32, i32),
}

impl GlassesClassifierConfig {
    pub fn new() -> Self {
        // the classifier was trained on raw [0, 1] tensors, no imagenet normalization
        GlassesClassifierConfig {
            model_name: "glasses_detector".to_string(),
            input_name: "input".to_string(),
            mean: vec![0.0, 0.0, 0.0],
            std: vec![1.0, 1.0, 1.0],
            threshold: 0.5,
            imsize: (224, 224),
        }
    }
}

impl Default for GlassesClassifierConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Face size bands (pixels) and the iris diameter assumed for each band.
///
/// The pixel bands depend on the typical input resolution. They are kept as
/// observed in production rather than derived from camera parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IrisScaleConfig {
    pub small_face_max_px: f64,
    pub medium_face_max_px: f64,
    pub iris_mm_small: f64,
    pub iris_mm_medium: f64,
    pub iris_mm_large: f64,
}

impl IrisScaleConfig {
    pub fn new() -> Self {
        IrisScaleConfig {
            small_face_max_px: 120.0,
            medium_face_max_px: 160.0,
            iris_mm_small: 10.5,
            iris_mm_medium: 11.7,
            iris_mm_large: 12.5,
        }
    }
}

impl Default for IrisScaleConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CardScaleConfig {
    /// ISO/IEC 7810 ID-1 card width.
    pub card_width_mm: f64,
    pub blur_kernel: i32,
    pub canny_low: f64,
    pub canny_high: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub min_area_px: f64,
}

impl CardScaleConfig {
    pub fn new() -> Self {
        CardScaleConfig {
            card_width_mm: 85.6,
            blur_kernel: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            min_aspect_ratio: 1.5,
            max_aspect_ratio: 1.7,
            min_area_px: 5000.0,
        }
    }
}

impl Default for CardScaleConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub triton: TritonConfig,
    pub face_landmark: FaceLandmarkConfig,
    pub glasses: GlassesClassifierConfig,
    pub iris_scale: IrisScaleConfig,
    pub card_scale: CardScaleConfig,
}

impl PipelineConfig {
    /// from_json_str parses a pipeline configuration, missing sections keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, Error> {
        let config: PipelineConfig = serde_json::from_str(raw)?;
        Ok(config)
    }

    /// from_json_file reads the pipeline configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::msg(format!("cannot read config {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }
}
