pub mod scale;
pub mod face_shape;
pub mod measurement;
pub mod frame;
