use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::error::AudioError;

const CHUNK_SIZE: usize = 1024;
const SINC_LEN: usize = 256;

/// Converts a mono buffer between sample rates. The output length is
/// `round(len * to / from)` and the filter delay is compensated.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, AudioError> {
    if from == 0 || to == 0 {
        return Err(AudioError::InvalidParameter(
            "sample rates must be positive".to_string(),
        ));
    }
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to as f64 / from as f64;
    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    debug!(from, to, frames = samples.len(), "resampling");
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = (SINC_LEN as f64 * ratio / 2.0) as usize;
    let mut out = Vec::with_capacity(expected + delay + CHUNK_SIZE);
    let mut cursor = 0usize;
    while out.len() < expected + delay {
        let needed = resampler.input_frames_next();
        let end = (cursor + needed).min(samples.len());
        let mut chunk = samples[cursor.min(end)..end].to_vec();
        chunk.resize(needed, 0.0);
        cursor = end;
        let block = resampler
            .process(&[&chunk], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        out.extend_from_slice(&block[0]);
    }
    Ok(out.into_iter().skip(delay).take(expected).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    #[test]
    fn same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn downsampling_preserves_duration_and_pitch() {
        let input = sine(220.0, 48_000, 48_000);
        let output = resample(&input, 48_000, 16_000).unwrap();
        assert_eq!(output.len(), 16_000);
        // 220 Hz over one second crosses zero ~440 times
        let count = crossings(&output[1000..15_000]) as f32 / 14_000.0 * 16_000.0;
        assert!((count - 440.0).abs() < 10.0, "{count}");
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(resample(&[0.0], 0, 16_000).is_err());
    }
}
