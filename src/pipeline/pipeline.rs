use anyhow::Error;
use opencv::core::{Mat, MatTraitConst};
use tracing::{debug, info};
use crate::config::config::PipelineConfig;
use crate::error::{MeasurementError, Result};
use crate::helper::landmark_helper::{extract_point_set, LandmarkBackend};
use crate::metrology::frame::FrameSelection;
use crate::metrology::measurement::{measure_with_card_scale, measure_with_iris_scale, MeasurementResult};
use crate::metrology::scale::{CardScaleResolver, IrisScaleResolver};
use crate::modules::face_landmark_client::FaceLandmarkClient;
use crate::modules::glasses_classifier_client::{GlassesClassifier, GlassesClassifierClient, GlassesDetection};
use crate::triton_client::client::TritonInferenceClient;
use crate::utils::image::decode_rgb_image;

/// Virtual try-on pipeline: glasses check, face measurements and frame fitting.
///
/// Holds long-lived model handles. Each request is independent, so one
/// instance can serve concurrent requests through a shared reference.
#[derive(Debug, Clone)]
pub struct TryOnPipeline<L, G> {
    landmarks: L,
    glasses: G,
    iris_scale: IrisScaleResolver,
    card_scale: CardScaleResolver,
    num_landmarks: usize,
}

impl TryOnPipeline<FaceLandmarkClient, GlassesClassifierClient> {
    /// connect opens the Triton channel and builds both model clients.
    ///
    /// Fails when either model is not ready, so a misconfigured deployment
    /// stops at startup.
    pub async fn connect(config: &PipelineConfig) -> std::result::Result<Self, Error> {
        let triton = TritonInferenceClient::connect(&config.triton.url, config.triton.timeout).await?;
        let landmarks = FaceLandmarkClient::new(triton.clone(), config.face_landmark.clone()).await?;
        let glasses = GlassesClassifierClient::new(triton, config.glasses.clone()).await?;
        info!(url = %config.triton.url, "try-on pipeline connected");
        Ok(Self::new(landmarks, glasses, config))
    }
}

impl<L: LandmarkBackend, G: GlassesClassifier> TryOnPipeline<L, G> {
    /// new initializes new instance of the pipeline
    pub fn new(landmarks: L, glasses: G, config: &PipelineConfig) -> Self {
        TryOnPipeline {
            landmarks,
            glasses,
            iris_scale: IrisScaleResolver::new(config.iris_scale.clone()),
            card_scale: CardScaleResolver::new(config.card_scale.clone()),
            num_landmarks: config.face_landmark.num_landmarks,
        }
    }

    fn decode(im_bytes: &[u8]) -> Result<Mat> {
        let img = decode_rgb_image(im_bytes).map_err(|e| MeasurementError::ImageDecode(e.to_string()))?;
        debug!(width = img.cols(), height = img.rows(), "decoded request image");
        Ok(img)
    }

    /// detect_glasses reports whether the person in the photo wears glasses.
    ///
    /// # Arguments
    /// * `im_bytes` - JPEG/PNG bytes
    ///
    /// # Returns
    /// * `Result<GlassesDetection>`
    pub async fn detect_glasses(&self, im_bytes: &[u8]) -> Result<GlassesDetection> {
        let img = Self::decode(im_bytes)?;
        let detection = self.glasses.classify(&img).await?;
        info!(glasses_detected = detection.glasses_detected, confidence = detection.confidence, "glasses check complete");
        Ok(detection)
    }

    /// measure_with_iris measures the face using the iris as the size reference.
    ///
    /// # Arguments
    /// * `im_bytes` - JPEG/PNG bytes of a frontal face photo
    ///
    /// # Returns
    /// * `Result<MeasurementResult>`
    pub async fn measure_with_iris(&self, im_bytes: &[u8]) -> Result<MeasurementResult> {
        let img = Self::decode(im_bytes)?;
        let points = extract_point_set(&self.landmarks, &img, self.num_landmarks).await?;
        let scale = self.iris_scale.resolve(&points)?;
        measure_with_iris_scale(&points, &scale)
    }

    /// measure_with_card measures the face using a payment card held in the
    /// photo as the size reference.
    ///
    /// The card is located before the landmark model runs; a photo without a
    /// card never reaches the backend.
    pub async fn measure_with_card(&self, im_bytes: &[u8]) -> Result<MeasurementResult> {
        let img = Self::decode(im_bytes)?;
        let scale = self.card_scale.resolve(&img)?;
        let points = extract_point_set(&self.landmarks, &img, self.num_landmarks).await?;
        measure_with_card_scale(&points, &scale)
    }

    /// select_frame records the frame a guest picked and its fitting height.
    ///
    /// # Arguments
    /// * `frame_id` - frame SKU
    /// * `frame_name` - display name
    /// * `dimensions` - `"{lens_width}-{bridge}-{temple}-{lens_height}"`
    /// * `last_measurement` - the guest's completed measurement, if any
    ///
    /// # Returns
    /// * `Result<FrameSelection>`
    pub fn select_frame(
        &self,
        frame_id: &str,
        frame_name: &str,
        dimensions: &str,
        last_measurement: Option<&MeasurementResult>,
    ) -> Result<FrameSelection> {
        FrameSelection::new(
            frame_id,
            frame_name,
            dimensions,
            last_measurement.map(|m| m.mm.face_height()),
        )
    }
}
