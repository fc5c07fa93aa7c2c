pub mod classifier;
pub mod features;
pub mod gate;
pub mod pipeline;

pub use classifier::{ArtifactClassifier, ClassifierError, EmotionClassifier};
pub use features::FeatureExtractor;
pub use gate::FrequencyGate;
pub use pipeline::{EmotionService, Outcome, PipelineError};
