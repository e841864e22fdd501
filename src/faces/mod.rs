pub mod detector;
pub mod processor;

pub use detector::{FaceDetector, UltraFaceDetector};
pub use processor::FaceProcessor;
