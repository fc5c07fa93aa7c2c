pub mod backend;
pub mod dsp;
pub mod error;
pub mod io;
pub mod pitch;
pub mod resample;
pub mod spectral;
pub mod stft;

pub use backend::{CaptureBackend, CaptureConfig, CpalBackend, NullBackend};
pub use dsp::{normalize_buffer, pad_to_min_duration, PeakLevel};
pub use error::{AudioError, CaptureError};
pub use io::{load_clip, AudioDecoder, AudioReader};
pub use pitch::YinTracker;
pub use resample::resample;
pub use stft::Stft;
