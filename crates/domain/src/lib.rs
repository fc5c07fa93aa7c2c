pub mod band;
pub mod clip;
pub mod emotion;
pub mod error;
pub mod log;
pub mod settings;

pub use crate::band::FrequencyBand;
pub use crate::clip::AudioClip;
pub use crate::emotion::{
    EmotionLabel, FeatureVector, FrameStats, GateDecision, PitchEstimate, FEATURE_LEN, N_MFCC,
};
pub use crate::error::DomainError;
pub use crate::log::{read_log, CsvLog, LogRecord, LogSink, MemoryLog, RECORD_SOURCE};
pub use crate::settings::{DrowsinessSettings, EmotionSettings, Settings, MAX_CAPTURE_SECONDS};
