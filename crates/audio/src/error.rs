use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("resampler error: {0}")]
    Resample(String),
    #[error("fft error: {0}")]
    Fft(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device available")]
    NoInputDevice,
    #[error("input device error: {0}")]
    Device(String),
    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),
    #[error("capture length {0} s is not usable")]
    InvalidDuration(f32),
    #[error(transparent)]
    Audio(#[from] AudioError),
}
