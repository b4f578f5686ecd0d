use std::future::Future;
use anyhow::Error;
use ndarray::Array4;
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::imgproc::resize;
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::config::config::GlassesClassifierConfig;
use crate::triton_client::client::{fp32_infer_request, output_as_f32, TritonInferenceClient};
use crate::utils::image::mat_to_nchw_tensor;
use crate::utils::utils::round_to;

const LOGITS_OUTPUT: &str = "logits";

/// Outcome of the glasses presence classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GlassesDetection {
    pub glasses_detected: bool,
    /// probability of the reported class, 3 decimals
    pub confidence: f64,
}

/// Glasses presence classifier: a long-lived, read-only model handle.
pub trait GlassesClassifier: Send + Sync {
    fn classify(&self, img: &Mat) -> impl Future<Output = Result<GlassesDetection, Error>> + Send;
}

/// Binary (no glasses, glasses) image classifier served by Triton.
#[derive(Clone, Debug)]
pub struct GlassesClassifierClient {
    triton_infer_client: TritonInferenceClient,
    pub model_name: String,
    pub input_name: String,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    pub threshold: f32,
    pub imsize: (i32, i32),
}

impl GlassesClassifierClient {
    /// new builds the client and checks that the model is being served.
    pub async fn new(triton_infer_client: TritonInferenceClient, config: GlassesClassifierConfig) -> Result<Self, Error> {
        if config.mean.len() != 3 || config.std.len() != 3 {
            return Err(Error::msg("glasses_classifier_client - mean and std need one value per channel"))
        }
        if !triton_infer_client.model_ready(&config.model_name).await? {
            return Err(Error::msg(format!("glasses_classifier_client - model {} is not ready", config.model_name)))
        }
        info!(model = %config.model_name, "glasses classifier model ready");

        Ok(GlassesClassifierClient {
            triton_infer_client,
            model_name: config.model_name,
            input_name: config.input_name,
            mean: config.mean,
            std: config.std,
            threshold: config.threshold,
            imsize: config.imsize,
        })
    }

    fn preprocess(&self, img: &Mat) -> Result<Array4<f32>, Error> {
        let mut img_resized = Mat::default();
        resize(
            img,
            &mut img_resized,
            Size::new(self.imsize.0, self.imsize.1),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        mat_to_nchw_tensor(&img_resized, |i, v| ((v as f32 / 255.0) - self.mean[i]) / self.std[i])
    }

    pub async fn infer_single(&self, img: &Mat) -> Result<GlassesDetection, Error> {
        let input_tensor = self.preprocess(img)?;
        let request = fp32_infer_request(&self.model_name, &self.input_name, &input_tensor.into_dyn(), &[LOGITS_OUTPUT]);
        let response = self.triton_infer_client.model_infer(request).await?;
        let logits = output_as_f32(&response, LOGITS_OUTPUT)?;
        let logits: Vec<f32> = logits.iter().cloned().collect();
        postprocess_logits(&logits, self.threshold)
    }
}

impl GlassesClassifier for GlassesClassifierClient {
    async fn classify(&self, img: &Mat) -> Result<GlassesDetection, Error> {
        self.infer_single(img).await
    }
}

/// postprocess_logits turns the two class logits into a detection.
///
/// Class 0 is "no glasses", class 1 is "glasses". The reported confidence is
/// the probability of whichever class won.
pub fn postprocess_logits(logits: &[f32], threshold: f32) -> Result<GlassesDetection, Error> {
    if logits.len() != 2 {
        return Err(Error::msg(format!(
            "glasses_classifier_client - expected 2 logits, got {}",
            logits.len()
        )))
    }

    // softmax, shifted by the max logit for stability
    let max_logit = logits[0].max(logits[1]) as f64;
    let exp: Vec<f64> = logits.iter().map(|&l| (l as f64 - max_logit).exp()).collect();
    let total: f64 = exp.iter().sum();
    let no_glasses_prob = exp[0] / total;
    let glasses_prob = exp[1] / total;

    let glasses_detected = glasses_prob > threshold as f64;
    let confidence = if glasses_detected { glasses_prob } else { no_glasses_prob };

    Ok(GlassesDetection {
        glasses_detected,
        confidence: round_to(confidence, 3),
    })
}
