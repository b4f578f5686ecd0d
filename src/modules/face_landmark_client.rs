use anyhow::Error;
use ndarray::{Array, Array4, IxDyn};
use opencv::core::{Mat, MatTraitConst};
use tracing::{debug, info};
use crate::config::config::FaceLandmarkConfig;
use crate::helper::landmark_helper::LandmarkBackend;
use crate::triton_client::client::{fp32_infer_request, output_as_f32, TritonInferenceClient};
use crate::utils::coordinate::{Coordinate2D, FaceLandmarks};
use crate::utils::image::{letterbox, mat_to_nchw_tensor};

/// Face-mesh landmark model served by Triton.
///
/// The model takes a letterboxed `1x3xHxW` image and returns the landmarks of
/// the most prominent face in input pixel coordinates, together with a face
/// presence score.
#[derive(Debug, Clone)]
pub struct FaceLandmarkClient {
    triton_infer_client: TritonInferenceClient,
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

impl FaceLandmarkClient {
    /// new builds the client and checks that the model is being served.
    ///
    /// Meant to run once at startup so a missing model fails the process, not a request.
    pub async fn new(triton_infer_client: TritonInferenceClient, config: FaceLandmarkConfig) -> Result<Self, Error> {
        if !triton_infer_client.model_ready(&config.model_name).await? {
            return Err(Error::msg(format!("face_landmark_client - model {} is not ready", config.model_name)))
        }
        info!(model = %config.model_name, "face landmark model ready");

        Ok(FaceLandmarkClient {
            triton_infer_client,
            model_name: config.model_name,
            input_name: config.input_name,
            landmarks_output: config.landmarks_output,
            score_output: config.score_output,
            imsize: config.imsize,
            mean: config.mean,
            scale: config.scale,
            num_landmarks: config.num_landmarks,
            score_threshold: config.score_threshold,
        })
    }

    /// preprocess letterboxes the image and returns the input tensor with the
    /// resize ratio used to map predictions back.
    fn preprocess(&self, img: &Mat) -> Result<(Array4<f32>, f32), Error> {
        let (img_scaled, resize_ratio) = letterbox(img, self.imsize)?;
        let tensor = mat_to_nchw_tensor(&img_scaled, |_, v| (v as f32 - self.mean) * self.scale)?;
        Ok((tensor, resize_ratio))
    }

    pub async fn infer(&self, img: &Mat) -> Result<Option<FaceLandmarks>, Error> {
        let (input_tensor, resize_ratio) = self.preprocess(img)?;
        let request = fp32_infer_request(
            &self.model_name,
            &self.input_name,
            &input_tensor.into_dyn(),
            &[self.landmarks_output.as_str(), self.score_output.as_str()],
        );

        let response = self.triton_infer_client.model_infer(request).await?;
        let landmarks = output_as_f32(&response, &self.landmarks_output)?;
        let score = output_as_f32(&response, &self.score_output)?;

        postprocess_landmarks(
            &landmarks,
            &score,
            LandmarkDecoding {
                num_landmarks: self.num_landmarks,
                score_threshold: self.score_threshold,
                resize_ratio,
                image_size: (img.cols(), img.rows()),
            },
        )
    }
}

impl LandmarkBackend for FaceLandmarkClient {
    async fn detect(&self, img: &Mat) -> Result<Option<FaceLandmarks>, Error> {
        self.infer(img).await
    }
}

/// Parameters needed to map raw model output back onto the source image.
#[derive(Debug, Clone, Copy)]
pub struct LandmarkDecoding {
    pub num_landmarks: usize,
    pub score_threshold: f32,
    /// source to model input scale, see `letterbox`
    pub resize_ratio: f32,
    /// (width, height) of the source image
    pub image_size: (i32, i32),
}

/// postprocess_landmarks converts the raw landmark tensor into landmarks
/// normalized to the source image.
///
/// Returns `None` when the face presence score is below the threshold. The
/// landmark tensor may carry 2 (x, y) or 3 (x, y, z) values per point.
pub fn postprocess_landmarks(
    landmarks: &Array<f32, IxDyn>,
    score: &Array<f32, IxDyn>,
    decoding: LandmarkDecoding,
) -> Result<Option<FaceLandmarks>, Error> {
    let face_score = score
        .iter()
        .cloned()
        .next()
        .ok_or_else(|| Error::msg("face_landmark_client - empty face score output"))?;
    if face_score < decoding.score_threshold {
        debug!(face_score, "face presence below threshold");
        return Ok(None)
    }

    let values: Vec<f32> = landmarks.iter().cloned().collect();
    let stride = if values.len() == decoding.num_landmarks * 3 {
        3
    } else if values.len() == decoding.num_landmarks * 2 {
        2
    } else {
        return Err(Error::msg(format!(
            "face_landmark_client - landmark output has {} values, expected {} points",
            values.len(),
            decoding.num_landmarks
        )))
    };

    let (img_w, img_h) = decoding.image_size;
    if decoding.resize_ratio.is_nan() || decoding.resize_ratio <= 0.0 || img_w <= 0 || img_h <= 0 {
        return Err(Error::msg("face_landmark_client - cannot map landmarks onto an empty image"))
    }
    let x_factor = 1.0 / (decoding.resize_ratio * img_w as f32);
    let y_factor = 1.0 / (decoding.resize_ratio * img_h as f32);

    let points = values
        .chunks_exact(stride)
        .map(|c| Coordinate2D::new(c[0] * x_factor, c[1] * y_factor))
        .collect();

    Ok(Some(FaceLandmarks { points }))
}
