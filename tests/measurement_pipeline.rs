use std::sync::Arc;
use anyhow::Error;
use opencv::core::{Mat, Rect, Scalar, Vector, CV_8UC3};
use opencv::imgcodecs::imencode_def;
use opencv::imgproc::{rectangle, FILLED, LINE_8};
use rs_tryon_pipeline::config::config::PipelineConfig;
use rs_tryon_pipeline::helper::landmark_helper::{indices, LandmarkBackend};
use rs_tryon_pipeline::metrology::face_shape::FaceShape;
use rs_tryon_pipeline::metrology::measurement::Measurements;
use rs_tryon_pipeline::metrology::scale::ScaleMethod;
use rs_tryon_pipeline::modules::glasses_classifier_client::{GlassesClassifier, GlassesDetection};
use rs_tryon_pipeline::utils::coordinate::{Coordinate2D, FaceLandmarks};
use rs_tryon_pipeline::{MeasurementError, TryOnPipeline};

const WIDTH: i32 = 640;
const HEIGHT: i32 = 480;

struct StaticFace(Option<FaceLandmarks>);

impl LandmarkBackend for StaticFace {
    async fn detect(&self, _img: &Mat) -> Result<Option<FaceLandmarks>, Error> {
        Ok(self.0.clone())
    }
}

struct NoGlasses;

impl GlassesClassifier for NoGlasses {
    async fn classify(&self, _img: &Mat) -> Result<GlassesDetection, Error> {
        Ok(GlassesDetection { glasses_detected: false, confidence: 0.93 })
    }
}

/// A frontal face: 200px between the jaw corners, 260px chin to forehead,
/// iris centers 100px apart and 25px irises.
fn frontal_face() -> FaceLandmarks {
    let mut px = vec![(320.0f32, 240.0f32); indices::FACE_MESH_POINTS];
    px[indices::JAW_LEFT] = (220.0, 300.0);
    px[indices::JAW_RIGHT] = (420.0, 300.0);
    px[indices::CHIN] = (320.0, 420.0);
    px[indices::FOREHEAD] = (320.0, 160.0);
    px[indices::CHIN_LEFT] = (260.0, 400.0);
    px[indices::CHIN_RIGHT] = (380.0, 400.0);
    px[indices::LEFT_IRIS_CENTER] = (370.0, 250.0);
    px[indices::RIGHT_IRIS_CENTER] = (270.0, 250.0);
    px[indices::LEFT_IRIS[0]] = (357.0, 250.0);
    px[indices::LEFT_IRIS[2]] = (382.0, 250.0);
    px[indices::RIGHT_IRIS[0]] = (257.0, 250.0);
    px[indices::RIGHT_IRIS[2]] = (282.0, 250.0);
    px[indices::NOSE_CENTER] = (320.0, 300.0);
    px[indices::NOSE_LEFT] = (308.0, 295.0);
    px[indices::NOSE_RIGHT] = (332.0, 295.0);

    let points = px
        .into_iter()
        .map(|(x, y)| Coordinate2D::new((x + 0.5) / WIDTH as f32, (y + 0.5) / HEIGHT as f32))
        .collect();
    FaceLandmarks { points }
}

fn encode_png(img: &Mat) -> Vec<u8> {
    let mut buf = Vector::<u8>::new();
    imencode_def(".png", img, &mut buf).unwrap();
    buf.to_vec()
}

fn photo(card: Option<Rect>) -> Vec<u8> {
    let mut img = Mat::new_rows_cols_with_default(HEIGHT, WIDTH, CV_8UC3, Scalar::all(255.0)).unwrap();
    if let Some(card) = card {
        rectangle(&mut img, card, Scalar::all(0.0), FILLED, LINE_8, 0).unwrap();
    }
    encode_png(&img)
}

fn pipeline(face: Option<FaceLandmarks>) -> TryOnPipeline<StaticFace, NoGlasses> {
    TryOnPipeline::new(StaticFace(face), NoGlasses, &PipelineConfig::default())
}

#[tokio::test]
async fn iris_measurement_end_to_end() {
    let pipeline = pipeline(Some(frontal_face()));
    let result = pipeline.measure_with_iris(&photo(None)).await.unwrap();

    assert_eq!(result.mm.pd(), 50.0);
    assert_eq!(result.mm.face_height(), 130.0);
    assert_eq!(result.face_shape, FaceShape::Oval);

    let json = serde_json::to_value(result).unwrap();
    assert_eq!(json["scale"]["method"], "iris");
    assert_eq!(json["scale"]["mm_per_pixel"], 0.5);
    assert_eq!(json["mm"]["face_shape_ratio"], 0.77);
    assert_eq!(json["mm"]["pd_left"], 25.0);
    assert_eq!(json["face_shape"], "oval");
}

#[tokio::test]
async fn card_measurement_end_to_end() {
    let pipeline = pipeline(Some(frontal_face()));
    let result = pipeline
        .measure_with_card(&photo(Some(Rect::new(40, 40, 160, 100))))
        .await
        .unwrap();

    assert_eq!(result.scale.method, ScaleMethod::CreditCard);
    assert!((result.scale.reference_px_measurement - 160.0).abs() <= 4.0);
    assert_eq!(result.face_shape, FaceShape::Oval);

    match result.mm {
        Measurements::CreditCard(mm) => {
            // 100px between the pupils at 85.6mm per ~160px
            assert!(mm.pd > 52.0 && mm.pd < 55.0, "pd {}", mm.pd);
            assert_eq!(mm.pd_left, mm.pd_right);
            assert_eq!(mm.nose_left, mm.pd_left);
            assert!(mm.pd_left > mm.pd / 2.0);
        }
        other => panic!("unexpected measurements {other:?}"),
    }

    let json = serde_json::to_value(result).unwrap();
    assert_eq!(json["scale"]["method"], "credit_card");
    assert!(json["mm"].get("face_shape_ratio").is_none());
}

#[tokio::test]
async fn card_measurement_without_card() {
    let pipeline = pipeline(Some(frontal_face()));
    let result = pipeline.measure_with_card(&photo(None)).await;
    assert!(matches!(result, Err(MeasurementError::InvalidScaleReference(_))));
}

#[tokio::test]
async fn no_face_is_reported() {
    let pipeline = pipeline(None);
    let iris = pipeline.measure_with_iris(&photo(None)).await;
    assert!(matches!(iris, Err(MeasurementError::NoFaceDetected)));

    let card = pipeline.measure_with_card(&photo(Some(Rect::new(40, 40, 160, 100)))).await;
    assert!(matches!(card, Err(MeasurementError::NoFaceDetected)));
}

#[tokio::test]
async fn glasses_then_frame_selection() {
    let pipeline = pipeline(Some(frontal_face()));

    let detection = pipeline.detect_glasses(&photo(None)).await.unwrap();
    assert!(!detection.glasses_detected);

    let measurement = pipeline.measure_with_iris(&photo(None)).await.unwrap();
    let selection = pipeline
        .select_frame("SKU-51", "Wayfarer", "51-18-142-41", Some(&measurement))
        .unwrap();
    assert_eq!(selection.fitting_height, 27.33);
    assert_eq!(selection.dimensions.temple, 142);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_share_one_pipeline() {
    let pipeline = Arc::new(pipeline(Some(frontal_face())));
    let iris_photo = photo(None);
    let card_photo = photo(Some(Rect::new(40, 40, 160, 100)));

    let mut handles = Vec::new();
    for i in 0..6 {
        let pipeline = Arc::clone(&pipeline);
        let bytes = if i % 2 == 0 { iris_photo.clone() } else { card_photo.clone() };
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                pipeline.measure_with_iris(&bytes).await
            } else {
                pipeline.measure_with_card(&bytes).await
            }
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap().unwrap();
        let expected = if i % 2 == 0 { ScaleMethod::Iris } else { ScaleMethod::CreditCard };
        assert_eq!(result.scale.method, expected);
        assert_eq!(result.face_shape, FaceShape::Oval);
    }
}
