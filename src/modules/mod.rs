pub mod face_landmark_client;
pub mod glasses_classifier_client;
