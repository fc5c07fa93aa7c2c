use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use ringbuf::{HeapProducer, HeapRb};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use vigil_domain::AudioClip;

use crate::dsp::downmix;
use crate::error::CaptureError;
use crate::resample::resample;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    pub seconds: f32,
    /// Rate of the returned clip; device audio is resampled to it.
    pub target_rate: u32,
}

impl CaptureConfig {
    /// Capture length as a `Duration`; non-finite, negative or oversized lengths are rejected.
    pub fn duration(&self) -> Result<Duration, CaptureError> {
        if !(self.seconds >= 0.0) {
            return Err(CaptureError::InvalidDuration(self.seconds));
        }
        Duration::try_from_secs_f32(self.seconds)
            .map_err(|_| CaptureError::InvalidDuration(self.seconds))
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            seconds: 4.0,
            target_rate: 16_000,
        }
    }
}

/// Records a fixed-length mono clip from some input.
pub trait CaptureBackend: Send + Sync {
    fn record(&self, config: &CaptureConfig) -> Result<AudioClip, CaptureError>;
}

/// Captures from a cpal input device, the host default unless a name is given.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }

    fn device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        if let Some(wanted) = self.device_name.as_deref() {
            let devices = host
                .input_devices()
                .map_err(|e| CaptureError::Device(e.to_string()))?;
            for device in devices {
                if device.name().map(|n| n == wanted).unwrap_or(false) {
                    return Ok(device);
                }
            }
            warn!(device = wanted, "input device not found, using default");
        }
        host.default_input_device()
            .ok_or(CaptureError::NoInputDevice)
    }
}

impl CaptureBackend for CpalBackend {
    #[instrument(skip(self))]
    fn record(&self, config: &CaptureConfig) -> Result<AudioClip, CaptureError> {
        let duration = config.duration()?;
        let device = self.device()?;
        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::Device(e.to_string()))?;
        let device_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        info!(
            device = %device.name().unwrap_or_default(),
            device_rate,
            channels,
            "recording"
        );

        let wanted = (duration.as_secs_f32() * device_rate as f32).round() as usize * channels;
        let ring = HeapRb::<f32>::new(wanted.max(1) + device_rate as usize * channels);
        let (producer, mut consumer) = ring.split();
        let stream_config: cpal::StreamConfig = supported.config();

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, producer),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, producer),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, producer),
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, producer),
            other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
        }?;
        stream
            .play()
            .map_err(|e| CaptureError::Device(e.to_string()))?;
        std::thread::sleep(duration);
        drop(stream);

        let mut interleaved: Vec<f32> = consumer.pop_iter().collect();
        interleaved.truncate(wanted);
        debug!(captured = interleaved.len(), wanted, "capture finished");
        let mono = downmix(&interleaved, channels);
        let samples = resample(&mono, device_rate, config.target_rate)?;
        AudioClip::new(samples, config.target_rate)
            .map_err(|e| CaptureError::Device(e.to_string()))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: HeapProducer<f32>,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for sample in data {
                    // full buffer means the requested duration is already covered
                    if producer.push((*sample).to_sample::<f32>()).is_err() {
                        break;
                    }
                }
            },
            |err| warn!(%err, "input stream error"),
            None,
        )
        .map_err(|e| CaptureError::Device(e.to_string()))
}

/// Returns silence of the requested length without touching any device.
pub struct NullBackend;

impl CaptureBackend for NullBackend {
    fn record(&self, config: &CaptureConfig) -> Result<AudioClip, CaptureError> {
        debug!(?config, "null capture");
        let duration = config.duration()?;
        Ok(AudioClip::silence(config.target_rate, duration.as_secs_f32()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_backend_honours_config() {
        let config = CaptureConfig {
            seconds: 0.5,
            target_rate: 8_000,
        };
        let clip = NullBackend.record(&config).unwrap();
        assert_eq!(clip.sample_rate, 8_000);
        assert_eq!(clip.len(), 4_000);
        assert!(clip.samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn unusable_lengths_are_rejected() {
        for seconds in [f32::INFINITY, f32::NAN, -1.0, 1e30] {
            let config = CaptureConfig {
                seconds,
                target_rate: 16_000,
            };
            assert!(
                matches!(NullBackend.record(&config), Err(CaptureError::InvalidDuration(_))),
                "{seconds}"
            );
        }
    }

    #[test]
    fn default_capture_is_four_seconds_at_16k() {
        let config = CaptureConfig::default();
        assert_eq!(config.seconds, 4.0);
        assert_eq!(config.target_rate, 16_000);
    }
}
