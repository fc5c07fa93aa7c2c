pub mod cascade;
pub mod detector;
pub mod drowsiness;
pub mod error;
pub mod grouping;
pub mod integral;

pub use cascade::Cascade;
pub use detector::{CascadeDetector, DetectParams, ObjectDetector, Region};
pub use drowsiness::{annotate, DetectionResult, DrowsinessDetector, FaceReport, FaceState};
pub use error::VisionError;
pub use integral::IntegralImage;
